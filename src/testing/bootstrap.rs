//! Percentile bootstrap confidence intervals for per-cluster effects.

use crate::composition::{CellTable, Label};
use crate::error::{InvalidInput, Result};
use crate::testing::effect::EffectMeasure;
use crate::testing::utils::{count_clusters_into, iteration_rng, percentile_linear, proportion};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Standard deviation of the bootstrap replicates; NaN for fewer than two replicates
    /// or non-finite replicates.
    pub std_error: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Percentile bootstrap interval per cluster.
///
/// Each replicate resamples `|A|` cells of sample A and `|B|` cells of sample B with
/// replacement, independently of each other. The bounds are the `(1 - level) / 2` and
/// `1 - (1 - level) / 2` percentiles of the replicates, linearly interpolated between
/// closest ranks.
///
/// # Arguments
///
/// * `table` - Validated cells of the two samples
/// * `n_iterations` - Number of bootstrap replicates, at least 1
/// * `confidence_level` - Coverage of the interval, in (0, 1)
/// * `seed` - Base seed of the bootstrap stream
/// * `effect` - Statistic recomputed on every replicate
pub fn bootstrap_ci<C>(
    table: &CellTable<C>,
    n_iterations: usize,
    confidence_level: f64,
    seed: u64,
    effect: EffectMeasure,
) -> Result<Vec<(C, ConfidenceInterval)>>
where
    C: Label,
{
    if n_iterations < 1 {
        return Err(InvalidInput::Iterations {
            name: "n_bootstraps",
            value: n_iterations,
        }
        .into());
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(InvalidInput::ConfidenceLevel(confidence_level).into());
    }
    effect.validate()?;

    debug!(
        n_iterations,
        confidence_level,
        n_clusters = table.n_clusters(),
        "running bootstrap"
    );

    let replicates = bootstrap_distribution(table, n_iterations, seed, effect);
    let tail = (1.0 - confidence_level) / 2.0;

    let intervals: Vec<ConfidenceInterval> = (0..table.n_clusters())
        .into_par_iter()
        .map(|k| {
            let mut values = replicates.column(k).to_vec();
            values.sort_by(f64::total_cmp);
            ConfidenceInterval {
                lower: percentile_linear(&values, tail),
                upper: percentile_linear(&values, 1.0 - tail),
                std_error: values.iter().std_dev(),
            }
        })
        .collect();

    Ok(table.clusters().iter().cloned().zip(intervals).collect())
}

/// Effects of `n_iterations` bootstrap replicates, one row per replicate.
pub fn bootstrap_distribution<C>(
    table: &CellTable<C>,
    n_iterations: usize,
    seed: u64,
    effect: EffectMeasure,
) -> Array2<f64>
where
    C: Label,
{
    let n_clusters = table.n_clusters();
    let group_a = table.group_a();
    let group_b = table.group_b();

    let mut replicates = Array2::<f64>::zeros((n_iterations, n_clusters));
    replicates
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each_init(
            || {
                (
                    Vec::with_capacity(group_a.len().max(group_b.len())),
                    vec![0usize; n_clusters],
                    vec![0usize; n_clusters],
                )
            },
            |state, (iteration, mut row)| {
                let (draws, counts_a, counts_b) = state;
                let mut rng = iteration_rng(seed, iteration);

                resample(group_a, &mut rng, draws);
                count_clusters_into(draws, counts_a);
                resample(group_b, &mut rng, draws);
                count_clusters_into(draws, counts_b);

                for (k, value) in row.iter_mut().enumerate() {
                    let prop_a = proportion(counts_a[k], group_a.len());
                    let prop_b = proportion(counts_b[k], group_b.len());
                    *value = effect.compute(prop_a, prop_b);
                }
            },
        );

    replicates
}

/// Draw `cells.len()` cells with replacement into `out`.
fn resample<R>(cells: &[usize], rng: &mut R, out: &mut Vec<usize>)
where
    R: Rng,
{
    out.clear();
    out.extend((0..cells.len()).map(|_| cells[rng.random_range(0..cells.len())]));
}
