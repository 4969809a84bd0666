use crate::composition::{Label, ProportionSummary};
use crate::error::{ProportionError, Result};
use crate::testing::ClusterResult;
use crate::testing::bootstrap::ConfidenceInterval;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Merge the observed effects, p-values and intervals into one row per cluster.
///
/// All three inputs must cover exactly the same clusters. Rows follow the summary's
/// cluster order.
pub fn assemble<C>(
    summary: &ProportionSummary<C>,
    p_values: &[(C, f64)],
    intervals: &[(C, ConfidenceInterval)],
) -> Result<Vec<ClusterResult<C>>>
where
    C: Label,
{
    let n_clusters = summary.clusters().len();
    let p_values = keyed(p_values, n_clusters, "p-values")?;
    let intervals = keyed(intervals, n_clusters, "confidence intervals")?;

    summary
        .clusters()
        .iter()
        .enumerate()
        .map(|(k, cluster)| {
            let p_value = *p_values.get(cluster).ok_or_else(|| missing(cluster, "p-value"))?;
            let interval = *intervals
                .get(cluster)
                .ok_or_else(|| missing(cluster, "confidence interval"))?;

            Ok(ClusterResult {
                cluster_id: cluster.clone(),
                proportion_a: summary.sample_a()[k].proportion,
                proportion_b: summary.sample_b()[k].proportion,
                observed_diff: summary.observed()[k],
                p_value,
                ci_lower: interval.lower,
                ci_upper: interval.upper,
                bootstrap_se: interval.std_error,
            })
        })
        .collect()
}

fn keyed<'a, C, T>(
    entries: &'a [(C, T)],
    n_clusters: usize,
    what: &str,
) -> Result<HashMap<&'a C, T>>
where
    C: Eq + Hash,
    T: Copy,
{
    let map: HashMap<&C, T> = entries.iter().map(|(c, v)| (c, *v)).collect();
    if map.len() != entries.len() {
        return Err(ProportionError::InconsistentResults(format!(
            "duplicate clusters among {}",
            what
        )));
    }
    if map.len() != n_clusters {
        return Err(ProportionError::InconsistentResults(format!(
            "{} {} for {} clusters",
            map.len(),
            what,
            n_clusters
        )));
    }
    Ok(map)
}

fn missing<C: Debug>(cluster: &C, what: &str) -> ProportionError {
    ProportionError::InconsistentResults(format!("no {} for cluster {:?}", what, cluster))
}
