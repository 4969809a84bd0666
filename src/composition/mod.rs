//! Validated per-cell input for proportion testing.
//!
//! A [`CellTable`] is built once from `(cluster, sample)` pairs. Building it checks the
//! two-sample contract (two distinct sample labels, both non-empty, no foreign labels) and
//! encodes every cell as an index into the table's cluster list, so the resampling engines
//! never look at the raw labels again.

use crate::error::{InvalidInput, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

pub mod summary;

pub use summary::{ClusterStats, ProportionSummary, summarize};

/// Bound shared by cluster and sample labels (strings, integers, ...).
pub trait Label: Clone + Eq + Hash + Debug + Send + Sync {}

impl<T> Label for T where T: Clone + Eq + Hash + Debug + Send + Sync {}

/// One cell: the cluster it was assigned to and the sample it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord<C, S> {
    pub cluster: C,
    pub sample: S,
}

impl<C, S> CellRecord<C, S> {
    pub fn new(cluster: C, sample: S) -> Self {
        CellRecord { cluster, sample }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForeignSamples {
    Reject,
    Skip,
}

/// Cells of two samples, encoded as cluster indices.
///
/// Clusters are kept in first-seen order of the input; every per-cluster output of the
/// crate follows this order.
#[derive(Debug, Clone)]
pub struct CellTable<C> {
    clusters: Vec<C>,
    group_a: Vec<usize>,
    group_b: Vec<usize>,
}

impl<C> CellTable<C>
where
    C: Label,
{
    /// Build a table from records that all belong to `sample_a` or `sample_b`.
    pub fn from_records<S>(records: &[CellRecord<C, S>], sample_a: &S, sample_b: &S) -> Result<Self>
    where
        S: PartialEq + Debug,
    {
        Self::build(
            records.iter().map(|r| (&r.cluster, &r.sample)),
            sample_a,
            sample_b,
            ForeignSamples::Reject,
        )
    }

    /// Build a table from parallel cluster and sample columns.
    pub fn from_columns<S>(clusters: &[C], samples: &[S], sample_a: &S, sample_b: &S) -> Result<Self>
    where
        S: PartialEq + Debug,
    {
        if clusters.len() != samples.len() {
            return Err(InvalidInput::LengthMismatch {
                clusters: clusters.len(),
                samples: samples.len(),
            }
            .into());
        }

        Self::build(
            clusters.iter().zip(samples.iter()),
            sample_a,
            sample_b,
            ForeignSamples::Reject,
        )
    }

    /// Build a table for two samples out of a larger multi-sample input.
    ///
    /// Cells of other samples are dropped, but their clusters are still registered so that
    /// every pairwise table cut from the same records lists the same clusters.
    pub fn from_records_subset<S>(
        records: &[CellRecord<C, S>],
        sample_a: &S,
        sample_b: &S,
    ) -> Result<Self>
    where
        S: PartialEq + Debug,
    {
        Self::build(
            records.iter().map(|r| (&r.cluster, &r.sample)),
            sample_a,
            sample_b,
            ForeignSamples::Skip,
        )
    }

    fn build<'a, S, I>(pairs: I, sample_a: &S, sample_b: &S, foreign: ForeignSamples) -> Result<Self>
    where
        C: 'a,
        S: 'a + PartialEq + Debug,
        I: IntoIterator<Item = (&'a C, &'a S)>,
    {
        if sample_a == sample_b {
            return Err(InvalidInput::IdenticalSamples(format!("{:?}", sample_a)).into());
        }

        let mut lookup: HashMap<C, usize> = HashMap::new();
        let mut clusters = Vec::new();
        let mut group_a = Vec::new();
        let mut group_b = Vec::new();

        for (index, (cluster, sample)) in pairs.into_iter().enumerate() {
            let target = if sample == sample_a {
                Some(&mut group_a)
            } else if sample == sample_b {
                Some(&mut group_b)
            } else if foreign == ForeignSamples::Skip {
                None
            } else {
                return Err(InvalidInput::UnknownSample {
                    index,
                    label: format!("{:?}", sample),
                }
                .into());
            };

            let cluster_idx = *lookup.entry(cluster.clone()).or_insert_with(|| {
                clusters.push(cluster.clone());
                clusters.len() - 1
            });

            if let Some(group) = target {
                group.push(cluster_idx);
            }
        }

        if group_a.is_empty() {
            return Err(InvalidInput::EmptyGroup(format!("{:?}", sample_a)).into());
        }
        if group_b.is_empty() {
            return Err(InvalidInput::EmptyGroup(format!("{:?}", sample_b)).into());
        }

        Ok(CellTable {
            clusters,
            group_a,
            group_b,
        })
    }

    /// Cluster labels in first-seen order.
    pub fn clusters(&self) -> &[C] {
        &self.clusters
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Cluster index of every cell in sample A.
    pub fn group_a(&self) -> &[usize] {
        &self.group_a
    }

    /// Cluster index of every cell in sample B.
    pub fn group_b(&self) -> &[usize] {
        &self.group_b
    }

    pub fn n_cells(&self) -> usize {
        self.group_a.len() + self.group_b.len()
    }
}
