use serde::Deserialize;

/// How the cap on the sum of posts across networks covered by a wildcard
/// grant is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AggregateMode {
    /// The cap is [`QuotaPolicy::aggregate_cap`] regardless of the number of
    /// networks that carry the city.
    #[default]
    Fixed,

    /// The cap is [`QuotaPolicy::per_pair_cap`] times the number of networks
    /// that carry the city, without an upper bound.
    Scaled,
}

/// Daily posting limits. Loaded from `QUOTA_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaPolicy {
    #[serde(default = "default_per_pair_cap")]
    pub per_pair_cap: u32,

    #[serde(default = "default_aggregate_cap")]
    pub aggregate_cap: u32,

    #[serde(default)]
    pub aggregate_mode: AggregateMode,
}

impl QuotaPolicy {
    pub fn aggregate_cap_for(&self, pairs: usize) -> u32 {
        match self.aggregate_mode {
            AggregateMode::Fixed => self.aggregate_cap,
            AggregateMode::Scaled => {
                let pairs = u32::try_from(pairs).unwrap_or(u32::MAX);
                self.per_pair_cap.saturating_mul(pairs)
            }
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            per_pair_cap: default_per_pair_cap(),
            aggregate_cap: default_aggregate_cap(),
            aggregate_mode: AggregateMode::default(),
        }
    }
}

fn default_per_pair_cap() -> u32 {
    3
}

fn default_aggregate_cap() -> u32 {
    9
}
