use crate::composition::{CellTable, Label};
use crate::testing::effect::EffectMeasure;
use crate::testing::utils::{count_clusters, proportion};
use serde::{Deserialize, Serialize};

/// Cell count and proportion of one cluster within one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub count: usize,
    pub proportion: f64,
}

/// Observed per-sample composition and the observed effect per cluster.
#[derive(Debug, Clone)]
pub struct ProportionSummary<C> {
    clusters: Vec<C>,
    sample_a: Vec<ClusterStats>,
    sample_b: Vec<ClusterStats>,
    observed: Vec<f64>,
    effect: EffectMeasure,
}

impl<C> ProportionSummary<C>
where
    C: Label,
{
    pub fn clusters(&self) -> &[C] {
        &self.clusters
    }

    pub fn sample_a(&self) -> &[ClusterStats] {
        &self.sample_a
    }

    pub fn sample_b(&self) -> &[ClusterStats] {
        &self.sample_b
    }

    /// Observed effect per cluster, in cluster order.
    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    pub fn effect(&self) -> EffectMeasure {
        self.effect
    }

    /// Observed effect keyed by cluster.
    pub fn observed_differences(&self) -> Vec<(C, f64)> {
        self.clusters
            .iter()
            .cloned()
            .zip(self.observed.iter().copied())
            .collect()
    }
}

/// Count cells per cluster in each sample and compute the observed effect
/// (`prop_A - prop_B` for [`EffectMeasure::Difference`]).
///
/// A cluster missing from one sample gets a count and proportion of exactly zero there.
pub fn summarize<C>(table: &CellTable<C>, effect: EffectMeasure) -> ProportionSummary<C>
where
    C: Label,
{
    let n_clusters = table.n_clusters();
    let n_a = table.group_a().len();
    let n_b = table.group_b().len();

    let counts_a = count_clusters(table.group_a(), n_clusters);
    let counts_b = count_clusters(table.group_b(), n_clusters);

    let stats = |counts: &[usize], total: usize| -> Vec<ClusterStats> {
        counts
            .iter()
            .map(|&count| ClusterStats {
                count,
                proportion: proportion(count, total),
            })
            .collect()
    };
    let sample_a = stats(counts_a.as_slice(), n_a);
    let sample_b = stats(counts_b.as_slice(), n_b);

    let observed = sample_a
        .iter()
        .zip(sample_b.iter())
        .map(|(a, b)| effect.compute(a.proportion, b.proportion))
        .collect();

    ProportionSummary {
        clusters: table.clusters().to_vec(),
        sample_a,
        sample_b,
        observed,
        effect,
    }
}
