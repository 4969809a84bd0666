//! # single-proportion
//!
//! Differential cluster proportion testing for single-cell data, part of the single-rust ecosystem.
//!
//! Given the cluster assignment and sample of every cell, this crate tests for each cluster
//! whether its share of cells differs between two samples (for example treatment and control)
//! and estimates how large that difference is. Significance comes from a permutation test that
//! shuffles sample labels across cells; the uncertainty of the effect comes from a percentile
//! bootstrap that resamples cells within each sample.
//!
//! ## Core Features
//!
//! - **Permutation p-values**: two-sided, smoothed `(1 + extreme) / (n + 1)` empirical p-values
//! - **Bootstrap intervals**: percentile confidence intervals with linear interpolation
//! - **Reproducible parallelism**: every iteration owns a seeded generator, so results do not
//!   depend on the number of rayon threads
//! - **Effect measures**: proportion difference or log2 fold change of proportions
//! - **Multiple comparisons**: several groups against one reference
//!
//! ## Quick Start
//!
//! Build a [`composition::CellTable`] from per-cell records, then run the pipeline through the
//! [`testing::ProportionTests`] trait.
//!
//! ```rust
//! use single_proportion::composition::{CellRecord, CellTable};
//! use single_proportion::testing::{ProportionTestConfig, ProportionTests};
//!
//! let cells = vec![
//!     CellRecord::new("T cell", "stim"),
//!     CellRecord::new("B cell", "stim"),
//!     CellRecord::new("T cell", "ctrl"),
//!     CellRecord::new("T cell", "ctrl"),
//! ];
//! let table = CellTable::from_records(&cells, &"stim", &"ctrl").unwrap();
//! let config = ProportionTestConfig::default().with_permutations(100).with_seed(42);
//! let results = table.proportion_test(&config).unwrap();
//! assert_eq!(results.len(), 2);
//! ```
//!
//! ## Module Organization
//!
//! - **[`composition`]**: Validated cell input and observed per-sample proportions
//! - **[`testing`]**: Permutation test, bootstrap intervals, result assembly and comparisons
//! - **[`error`]**: Error types

pub mod composition;
pub mod error;
pub mod testing;
