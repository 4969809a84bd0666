//! Several groups tested against one reference group.

use crate::composition::{CellRecord, CellTable, Label};
use crate::testing::utils::{resolve_seed, stream_seeds};
use crate::testing::{ClusterResult, ProportionTestConfig, proportion_test};
use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Results of one group compared against the reference.
///
/// Effects are oriented as `group` relative to `reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison<C, S> {
    pub group: S,
    pub reference: S,
    pub results: Vec<ClusterResult<C>>,
}

/// Compare every group in `others` against `reference`.
///
/// Each comparison only uses the cells of its two groups, while the cluster list comes from
/// all records so every comparison reports the same clusters. Comparisons run in parallel,
/// each with its own master seed drawn from the configured one, and are returned in the
/// order of `others`. P-values are not adjusted for the number of comparisons.
pub fn compare_to_reference<C, S>(
    records: &[CellRecord<C, S>],
    reference: &S,
    others: &[S],
    config: &ProportionTestConfig,
) -> anyhow::Result<Vec<Comparison<C, S>>>
where
    C: Label,
    S: Label,
{
    config.validate()?;
    if others.is_empty() {
        return Err(anyhow::anyhow!(
            "No groups to compare against reference {:?}",
            reference
        ));
    }

    let tables = pairwise_tables(records, reference, others)?;
    let master_seed = resolve_seed(config.random_seed);
    let seeds = stream_seeds(master_seed, others.len());
    debug!(
        n_comparisons = others.len(),
        n_cells = records.len(),
        master_seed,
        "comparing groups against reference"
    );

    others
        .par_iter()
        .zip(tables.par_iter())
        .zip(seeds.par_iter())
        .map(|((group, table), &seed)| -> anyhow::Result<Comparison<C, S>> {
            let comparison_config = config.clone().with_seed(seed);
            let results = proportion_test(table, &comparison_config)
                .with_context(|| format!("Comparing {:?} against {:?}", group, reference))?;

            info!(
                group = ?group,
                reference = ?reference,
                n_clusters = results.len(),
                "comparison finished"
            );

            Ok(Comparison {
                group: group.clone(),
                reference: reference.clone(),
                results,
            })
        })
        .collect()
}

/// Validated cells of every group paired with the reference, in the order of `others`.
fn pairwise_tables<C, S>(
    records: &[CellRecord<C, S>],
    reference: &S,
    others: &[S],
) -> anyhow::Result<Vec<CellTable<C>>>
where
    C: Label,
    S: Label,
{
    others
        .iter()
        .map(|group| {
            CellTable::from_records_subset(records, group, reference)
                .with_context(|| format!("Comparing {:?} against {:?}", group, reference))
        })
        .collect()
}
