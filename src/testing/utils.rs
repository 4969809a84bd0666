use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Number of cells per cluster index.
pub fn count_clusters(cluster_indices: &[usize], n_clusters: usize) -> Vec<usize> {
    let mut counts = vec![0; n_clusters];
    count_clusters_into(cluster_indices, &mut counts);
    counts
}

/// Like [`count_clusters`], reusing `counts` as the output buffer.
pub fn count_clusters_into(cluster_indices: &[usize], counts: &mut [usize]) {
    counts.fill(0);
    for &cluster in cluster_indices {
        counts[cluster] += 1;
    }
}

#[inline]
pub fn proportion(count: usize, total: usize) -> f64 {
    count as f64 / total as f64
}

/// Use the caller's seed, or draw a fresh one when none was given.
pub(crate) fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            trace!(seed, "drew fresh master seed");
            seed
        }
    }
}

/// Expand a master seed into `n` independent base seeds.
///
/// Derivation is sequential and happens before any work is dispatched, so each stream
/// is fixed by the master seed alone regardless of execution order.
pub(crate) fn stream_seeds(master: u64, n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(master);
    let seeds: Vec<u64> = (0..n).map(|_| rng.random::<u64>()).collect();
    trace!(master, ?seeds, "derived stream seeds");
    seeds
}

/// Generator for one resampling iteration: `base_seed + iteration`.
#[inline]
pub(crate) fn iteration_rng(base_seed: u64, iteration: usize) -> StdRng {
    StdRng::seed_from_u64(base_seed.wrapping_add(iteration as u64))
}

/// Percentile of an ascending slice with linear interpolation between closest ranks
/// (`h = (n - 1) * q`, Hyndman & Fan type 7).
///
/// When one of the two neighbouring order statistics is infinite the nearer one is
/// returned instead of interpolating.
pub fn percentile_linear(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let frac = h - lower as f64;

    let (lo, hi) = (sorted[lower], sorted[upper]);
    if frac == 0.0 || lo == hi {
        lo
    } else if !lo.is_finite() || !hi.is_finite() {
        if frac < 0.5 { lo } else { hi }
    } else {
        lo + frac * (hi - lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_count_clusters() {
        assert_eq!(count_clusters(&[0, 2, 2, 1, 2], 4), vec![1, 1, 3, 0]);

        let mut buffer = vec![9, 9];
        count_clusters_into(&[1, 1], &mut buffer);
        assert_eq!(buffer, vec![0, 2]);
    }

    #[test]
    fn test_percentile_linear() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile_linear(&sorted, 0.0), 1.0);
        assert_relative_eq!(percentile_linear(&sorted, 0.5), 3.0);
        assert_relative_eq!(percentile_linear(&sorted, 1.0), 5.0);
        // h = 4 * 0.1 = 0.4
        assert_relative_eq!(percentile_linear(&sorted, 0.1), 1.4);
        // h = 4 * 0.975 = 3.9
        assert_relative_eq!(percentile_linear(&sorted, 0.975), 4.9, epsilon = 1e-12);
    }

    #[test]
    fn test_percentile_edge_cases() {
        assert!(percentile_linear(&[], 0.5).is_nan());
        assert_eq!(percentile_linear(&[7.0], 0.025), 7.0);
        assert_eq!(percentile_linear(&[7.0], 0.975), 7.0);

        let with_inf = [f64::NEG_INFINITY, 1.0, 2.0, f64::INFINITY];
        // h = 3 * 0.1 = 0.3, nearer to -inf
        assert_eq!(percentile_linear(&with_inf, 0.1), f64::NEG_INFINITY);
        // h = 3 * 0.3 = 0.9, nearer to 1.0
        assert_eq!(percentile_linear(&with_inf, 0.3), 1.0);
        assert_eq!(percentile_linear(&[f64::INFINITY, f64::INFINITY], 0.4), f64::INFINITY);
    }

    #[test]
    fn test_stream_seeds_are_reproducible() {
        let first = stream_seeds(42, 3);
        let second = stream_seeds(42, 3);
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
        assert_ne!(stream_seeds(43, 3), first);
    }

    #[test]
    fn test_resolve_seed() {
        assert_eq!(resolve_seed(Some(7)), 7);
    }
}
