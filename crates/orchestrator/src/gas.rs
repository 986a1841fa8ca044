/// Gas-limit policy applied to node estimates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GasPolicy {
    /// Use the estimate unmodified
    #[default]
    Exact,
    /// Scale the estimate and cap it
    Inflated { multiplier: f64, ceiling: u64 },
}

impl GasPolicy {
    pub fn for_network(is_testnet: bool, multiplier: f64, ceiling: u64) -> Self {
        if is_testnet {
            Self::Inflated {
                multiplier,
                ceiling,
            }
        } else {
            Self::Exact
        }
    }

    pub fn apply(&self, estimate: u64) -> u64 {
        match *self {
            Self::Exact => estimate,
            Self::Inflated {
                multiplier,
                ceiling,
            } => {
                // Float-to-int casts saturate, so an absurd multiplier still lands on the ceiling.
                let scaled = (estimate as f64 * multiplier) as u64;
                scaled.min(ceiling)
            }
        }
    }
}
