//! Permutation test for per-cluster proportion differences.
//!
//! Sample labels are reassigned at random across all cells while the sample sizes stay
//! fixed. Every permutation fills one row of an iterations × clusters matrix, drawing from
//! its own generator seeded with `base_seed + iteration`, so the null distribution does not
//! depend on how rayon schedules the rows.

use crate::composition::{CellTable, Label};
use crate::error::{InvalidInput, ProportionError, Result};
use crate::testing::effect::EffectMeasure;
use crate::testing::utils::{count_clusters, count_clusters_into, iteration_rng, proportion};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use tracing::debug;

/// Two-sided permutation p-value per cluster.
///
/// `p = (1 + #{|null| >= |observed|}) / (n_iterations + 1)`
///
/// # Arguments
///
/// * `table` - Validated cells of the two samples
/// * `observed` - Observed effect per cluster, keyed like the table's clusters
/// * `n_iterations` - Number of permutations, at least 1
/// * `seed` - Base seed of the permutation stream
/// * `effect` - Statistic recomputed under each permutation
///
/// # Returns
///
/// P-values keyed by cluster, in the table's cluster order.
pub fn permutation_test<C>(
    table: &CellTable<C>,
    observed: &[(C, f64)],
    n_iterations: usize,
    seed: u64,
    effect: EffectMeasure,
) -> Result<Vec<(C, f64)>>
where
    C: Label,
{
    if n_iterations < 1 {
        return Err(InvalidInput::Iterations {
            name: "n_permutations",
            value: n_iterations,
        }
        .into());
    }
    effect.validate()?;
    let observed = align_observed(table, observed)?;

    debug!(
        n_iterations,
        n_clusters = table.n_clusters(),
        n_cells = table.n_cells(),
        "running permutation test"
    );

    let null = null_distribution(table, n_iterations, seed, effect);
    let p_values = empirical_p_values(&null, &observed);

    Ok(table.clusters().iter().cloned().zip(p_values).collect())
}

/// Effects under `n_iterations` random relabellings, one row per permutation.
pub fn null_distribution<C>(
    table: &CellTable<C>,
    n_iterations: usize,
    seed: u64,
    effect: EffectMeasure,
) -> Array2<f64>
where
    C: Label,
{
    let n_clusters = table.n_clusters();
    let n_a = table.group_a().len();
    let n_b = table.group_b().len();

    let pool: Vec<usize> = table
        .group_a()
        .iter()
        .chain(table.group_b())
        .copied()
        .collect();
    let totals = count_clusters(&pool, n_clusters);

    let mut null = Array2::<f64>::zeros((n_iterations, n_clusters));
    null.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each_init(
            || (pool.clone(), vec![0usize; n_clusters]),
            |state, (iteration, mut row)| {
                let (buffer, counts_a) = state;
                // start every permutation from the original order
                buffer.copy_from_slice(&pool);
                let mut rng = iteration_rng(seed, iteration);
                let (relabelled_a, _) = buffer.partial_shuffle(&mut rng, n_a);
                count_clusters_into(relabelled_a, counts_a);

                for (k, value) in row.iter_mut().enumerate() {
                    let prop_a = proportion(counts_a[k], n_a);
                    let prop_b = proportion(totals[k] - counts_a[k], n_b);
                    *value = effect.compute(prop_a, prop_b);
                }
            },
        );

    null
}

/// Relative slack under which a null effect still ties the observed one.
///
/// Effects are built from `count / n` proportions, so a null value equal to the observed one
/// in exact arithmetic can round a few ulps lower (`0.3 - 0.0` against `0.1 - 0.4`).
const TIE_TOLERANCE: f64 = 1e-12;

/// Smoothed two-sided p-value of each column of `null` against `observed`.
///
/// A null value counts as extreme when `|null| >= |observed| * (1 - 1e-12)`.
pub fn empirical_p_values(null: &Array2<f64>, observed: &[f64]) -> Vec<f64> {
    let n_iterations = null.nrows();
    null.axis_iter(Axis(1))
        .zip(observed.iter())
        .map(|(column, &obs)| {
            let threshold = obs.abs() * (1.0 - TIE_TOLERANCE);
            let extreme = column.iter().filter(|v| v.abs() >= threshold).count();
            (extreme + 1) as f64 / (n_iterations + 1) as f64
        })
        .collect()
}

fn align_observed<C>(table: &CellTable<C>, observed: &[(C, f64)]) -> Result<Vec<f64>>
where
    C: Label,
{
    if observed.len() != table.n_clusters() {
        return Err(ProportionError::InconsistentResults(format!(
            "{} observed values for {} clusters",
            observed.len(),
            table.n_clusters()
        )));
    }

    table
        .clusters()
        .iter()
        .zip(observed.iter())
        .map(|(cluster, (key, value))| {
            if cluster == key {
                Ok(*value)
            } else {
                Err(ProportionError::InconsistentResults(format!(
                    "observed value for {:?} where {:?} was expected",
                    key, cluster
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{CellRecord, summarize};

    fn skewed_table() -> CellTable<&'static str> {
        let mut cells = Vec::new();
        for (cluster, n_a, n_b) in [("c1", 50, 20), ("c2", 30, 30), ("c3", 20, 50)] {
            cells.extend((0..n_a).map(|_| CellRecord::new(cluster, "A")));
            cells.extend((0..n_b).map(|_| CellRecord::new(cluster, "B")));
        }
        CellTable::from_records(&cells, &"A", &"B").unwrap()
    }

    #[test]
    fn test_null_preserves_group_sizes() {
        let table = skewed_table();
        let null = null_distribution(&table, 50, 11, EffectMeasure::Difference);

        assert_eq!(null.dim(), (50, 3));
        // both relabelled samples still have proportions summing to one
        for row in null.axis_iter(Axis(0)) {
            assert!(row.sum().abs() < 1e-9);
        }
    }

    #[test]
    fn test_p_value_bounds() {
        let table = skewed_table();
        let observed = summarize(&table, EffectMeasure::Difference).observed_differences();
        let p_values = permutation_test(&table, &observed, 200, 3, EffectMeasure::Difference).unwrap();

        let min_p = 1.0 / 201.0;
        for (_, p) in &p_values {
            assert!(*p >= min_p && *p <= 1.0);
        }
        // an observed difference of zero is matched by every permutation
        assert_eq!(p_values[1].1, 1.0);
    }

    #[test]
    fn test_single_iteration() {
        let table = skewed_table();
        let observed = summarize(&table, EffectMeasure::Difference).observed_differences();
        let p_values = permutation_test(&table, &observed, 1, 3, EffectMeasure::Difference).unwrap();
        for (_, p) in &p_values {
            assert!(*p == 0.5 || *p == 1.0);
        }
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let table = skewed_table();
        let observed = summarize(&table, EffectMeasure::Difference).observed_differences();
        let err = permutation_test(&table, &observed, 0, 3, EffectMeasure::Difference).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_mismatched_observed_keys() {
        let table = skewed_table();
        let observed = vec![("c1", 0.3), ("c3", -0.3), ("c2", 0.0)];
        let err = permutation_test(&table, &observed, 10, 3, EffectMeasure::Difference).unwrap_err();
        assert!(matches!(err, ProportionError::InconsistentResults(_)));

        let err = permutation_test(&table, &observed[..2], 10, 3, EffectMeasure::Difference)
            .unwrap_err();
        assert!(matches!(err, ProportionError::InconsistentResults(_)));
    }

    #[test]
    fn test_empirical_p_values_counts_ties() {
        let null = Array2::from_shape_vec((4, 2), vec![0.1, -0.5, -0.2, 0.0, 0.2, 0.5, 0.0, 0.1])
            .unwrap();
        let p = empirical_p_values(&null, &[-0.2, 0.5]);
        // column 0: |-0.2| and |0.2| tie with the observed 0.2
        assert_eq!(p[0], 3.0 / 5.0);
        // column 1: -0.5 and 0.5
        assert_eq!(p[1], 3.0 / 5.0);
    }

    #[test]
    fn test_rounded_mirror_value_still_ties() {
        let observed: f64 = 0.1 - 0.4;
        assert!(observed.abs() > 0.3);

        let null = Array2::from_shape_vec((1, 1), vec![0.3 - 0.0]).unwrap();
        assert_eq!(empirical_p_values(&null, &[observed]), vec![1.0]);
    }

    #[test]
    fn test_ties_with_unequal_group_sizes() {
        // three cells in A, one in B; whichever cell B receives, |difference| is 2/3
        let cells = vec![
            CellRecord::new("x", "A"),
            CellRecord::new("y", "A"),
            CellRecord::new("y", "A"),
            CellRecord::new("x", "B"),
        ];
        let table = CellTable::from_records(&cells, &"A", &"B").unwrap();
        let observed = summarize(&table, EffectMeasure::Difference).observed_differences();

        let p_values = permutation_test(&table, &observed, 500, 7, EffectMeasure::Difference).unwrap();
        for (cluster, p) in &p_values {
            assert_eq!(*p, 1.0, "cluster {}", cluster);
        }
    }

    #[test]
    fn test_infinite_observed_effect() {
        let null = Array2::from_shape_vec((3, 1), vec![f64::NEG_INFINITY, 1.0, f64::INFINITY])
            .unwrap();
        let p = empirical_p_values(&null, &[f64::INFINITY]);
        assert_eq!(p[0], 3.0 / 4.0);
    }
}
