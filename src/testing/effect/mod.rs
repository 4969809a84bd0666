use crate::error::{InvalidInput, Result};
use serde::{Deserialize, Serialize};

/// Statistic compared between the two samples for every cluster.
///
/// The same measure is used for the observed value, the permutation null and the
/// bootstrap replicates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectMeasure {
    /// `prop_A - prop_B`
    #[default]
    Difference,
    /// `log2((prop_A + pseudo_count) / (prop_B + pseudo_count))`
    ///
    /// With a zero pseudo count, empty clusters map to infinities: both empty is 0,
    /// empty in A is `-inf`, empty in B is `+inf`.
    Log2FoldChange { pseudo_count: f64 },
}

impl EffectMeasure {
    /// Log2 fold change without a pseudo count.
    pub fn log2_fold_change() -> Self {
        EffectMeasure::Log2FoldChange { pseudo_count: 0.0 }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            EffectMeasure::Difference => Ok(()),
            EffectMeasure::Log2FoldChange { pseudo_count } => {
                if pseudo_count.is_finite() && pseudo_count >= 0.0 {
                    Ok(())
                } else {
                    Err(InvalidInput::PseudoCount(pseudo_count).into())
                }
            }
        }
    }

    #[inline]
    pub fn compute(&self, prop_a: f64, prop_b: f64) -> f64 {
        match *self {
            EffectMeasure::Difference => prop_a - prop_b,
            EffectMeasure::Log2FoldChange { pseudo_count } => {
                log2_fold_change(prop_a + pseudo_count, prop_b + pseudo_count)
            }
        }
    }
}

fn log2_fold_change(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        0.0
    } else if a == 0.0 {
        f64::NEG_INFINITY
    } else if b == 0.0 {
        f64::INFINITY
    } else {
        (a / b).log2()
    }
}
