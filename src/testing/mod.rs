use crate::composition::{CellTable, Label, ProportionSummary};
use crate::error::{InvalidInput, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod assemble;
pub mod bootstrap;
pub mod effect;
pub mod multiple;
pub mod permutation;

pub mod utils;

use bootstrap::ConfidenceInterval;
use effect::EffectMeasure;

/// Settings for a full proportion test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProportionTestConfig {
    /// Number of label permutations for the p-values
    pub n_permutations: usize,
    /// Number of bootstrap replicates for the intervals
    pub n_bootstraps: usize,
    /// Coverage of the bootstrap interval, in (0, 1)
    pub confidence_level: f64,
    /// Master seed; a fresh one is drawn per call when unset
    pub random_seed: Option<u64>,
    pub effect: EffectMeasure,
}

impl Default for ProportionTestConfig {
    fn default() -> Self {
        ProportionTestConfig {
            n_permutations: 1000,
            n_bootstraps: 2000,
            confidence_level: 0.95,
            random_seed: None,
            effect: EffectMeasure::Difference,
        }
    }
}

impl ProportionTestConfig {
    pub fn with_permutations(mut self, n_permutations: usize) -> Self {
        self.n_permutations = n_permutations;
        self
    }

    pub fn with_bootstraps(mut self, n_bootstraps: usize) -> Self {
        self.n_bootstraps = n_bootstraps;
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_effect(mut self, effect: EffectMeasure) -> Self {
        self.effect = effect;
        self
    }

    /// Check every setting before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.n_permutations < 1 {
            return Err(InvalidInput::Iterations {
                name: "n_permutations",
                value: self.n_permutations,
            }
            .into());
        }
        if self.n_bootstraps < 1 {
            return Err(InvalidInput::Iterations {
                name: "n_bootstraps",
                value: self.n_bootstraps,
            }
            .into());
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(InvalidInput::ConfidenceLevel(self.confidence_level).into());
        }
        self.effect.validate()
    }
}

/// Final result row for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult<C> {
    pub cluster_id: C,
    /// Proportion of the cluster in sample A
    pub proportion_a: f64,
    /// Proportion of the cluster in sample B
    pub proportion_b: f64,
    /// Observed effect of A relative to B
    pub observed_diff: f64,
    /// Two-sided permutation p-value (unadjusted)
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Standard deviation of the bootstrap replicates
    pub bootstrap_se: f64,
}

impl<C> ClusterResult<C> {
    /// Check if the result is statistically significant at the given threshold
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    pub fn confidence_interval(&self) -> (f64, f64) {
        (self.ci_lower, self.ci_upper)
    }
}

/// Rows with a p-value below `alpha`, in their original order.
pub fn significant_clusters<C>(results: &[ClusterResult<C>], alpha: f64) -> Vec<&ClusterResult<C>> {
    results.iter().filter(|r| r.is_significant(alpha)).collect()
}

/// The `n` rows with the smallest p-values; ties keep their original order.
pub fn top_clusters<C>(results: &[ClusterResult<C>], n: usize) -> Vec<&ClusterResult<C>> {
    let mut ranked: Vec<&ClusterResult<C>> = results.iter().collect();
    ranked.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
    ranked.truncate(n);
    ranked
}

pub trait ProportionTests<C>
where
    C: Label,
{
    fn summarize(&self, effect: EffectMeasure) -> ProportionSummary<C>;

    fn permutation_test(
        &self,
        observed: &[(C, f64)],
        n_iterations: usize,
        seed: u64,
        effect: EffectMeasure,
    ) -> Result<Vec<(C, f64)>>;

    fn bootstrap_ci(
        &self,
        n_iterations: usize,
        confidence_level: f64,
        seed: u64,
        effect: EffectMeasure,
    ) -> Result<Vec<(C, ConfidenceInterval)>>;

    fn proportion_test(&self, config: &ProportionTestConfig) -> Result<Vec<ClusterResult<C>>>;
}

impl<C> ProportionTests<C> for CellTable<C>
where
    C: Label,
{
    fn summarize(&self, effect: EffectMeasure) -> ProportionSummary<C> {
        crate::composition::summarize(self, effect)
    }

    fn permutation_test(
        &self,
        observed: &[(C, f64)],
        n_iterations: usize,
        seed: u64,
        effect: EffectMeasure,
    ) -> Result<Vec<(C, f64)>> {
        permutation::permutation_test(self, observed, n_iterations, seed, effect)
    }

    fn bootstrap_ci(
        &self,
        n_iterations: usize,
        confidence_level: f64,
        seed: u64,
        effect: EffectMeasure,
    ) -> Result<Vec<(C, ConfidenceInterval)>> {
        bootstrap::bootstrap_ci(self, n_iterations, confidence_level, seed, effect)
    }

    fn proportion_test(&self, config: &ProportionTestConfig) -> Result<Vec<ClusterResult<C>>> {
        proportion_test(self, config)
    }
}

/// Run the whole pipeline: summary, permutation p-values, bootstrap intervals, merge.
///
/// The permutation and bootstrap engines get separate seed streams derived from the
/// master seed, so both are reproducible no matter which finishes first.
pub fn proportion_test<C>(
    table: &CellTable<C>,
    config: &ProportionTestConfig,
) -> Result<Vec<ClusterResult<C>>>
where
    C: Label,
{
    config.validate()?;

    let master_seed = utils::resolve_seed(config.random_seed);
    let seeds = utils::stream_seeds(master_seed, 2);
    let (permutation_seed, bootstrap_seed) = (seeds[0], seeds[1]);

    let summary = crate::composition::summarize(table, config.effect);
    let observed = summary.observed_differences();

    let (p_values, intervals) = rayon::join(
        || {
            permutation::permutation_test(
                table,
                &observed,
                config.n_permutations,
                permutation_seed,
                config.effect,
            )
        },
        || {
            bootstrap::bootstrap_ci(
                table,
                config.n_bootstraps,
                config.confidence_level,
                bootstrap_seed,
                config.effect,
            )
        },
    );

    let results = assemble::assemble(&summary, &p_values?, &intervals?)?;
    debug!(
        n_clusters = results.len(),
        master_seed, "proportion test finished"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(cluster: &'static str, p_value: f64) -> ClusterResult<&'static str> {
        ClusterResult {
            cluster_id: cluster,
            proportion_a: 0.5,
            proportion_b: 0.5,
            observed_diff: 0.0,
            p_value,
            ci_lower: -0.1,
            ci_upper: 0.1,
            bootstrap_se: 0.05,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ProportionTestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confidence_level, 0.95);
        assert!(config.random_seed.is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(ProportionTestConfig::default().with_permutations(0).validate().is_err());
        assert!(ProportionTestConfig::default().with_bootstraps(0).validate().is_err());
        assert!(
            ProportionTestConfig::default()
                .with_confidence_level(1.0)
                .validate()
                .is_err()
        );
        assert!(
            ProportionTestConfig::default()
                .with_effect(EffectMeasure::Log2FoldChange { pseudo_count: -0.5 })
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ProportionTestConfig =
            serde_json::from_str(r#"{"n_permutations": 250, "random_seed": 9}"#).unwrap();
        assert_eq!(config.n_permutations, 250);
        assert_eq!(config.n_bootstraps, 2000);
        assert_eq!(config.random_seed, Some(9));
        assert_eq!(config.effect, EffectMeasure::Difference);

        let config: ProportionTestConfig = serde_json::from_str(
            r#"{"effect": {"kind": "log2_fold_change", "pseudo_count": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.effect, EffectMeasure::Log2FoldChange { pseudo_count: 0.5 });
    }

    #[test]
    fn test_significance_helpers() {
        let results = vec![result("a", 0.3), result("b", 0.001), result("c", 0.04)];

        let significant = significant_clusters(&results, 0.05);
        let names: Vec<_> = significant.iter().map(|r| r.cluster_id).collect();
        assert_eq!(names, vec!["b", "c"]);

        let top = top_clusters(&results, 2);
        let names: Vec<_> = top.iter().map(|r| r.cluster_id).collect();
        assert_eq!(names, vec!["b", "c"]);

        assert_eq!(top_clusters(&results, 10).len(), 3);
        assert!(!results[0].is_significant(0.05));
    }
}
