//! # Engine configuration
//!
//! Init-time knobs for a [`crate::server::Server`]: database count, memory
//! budgets, the eviction policy, and the per-collection encoding thresholds
//! that gate packed-to-general promotion.
use serde::Deserialize;
use strum_macros::{Display, EnumString};

/// Memory-pressure eviction policy, mirroring `redis.h`'s
/// `maxmemory_policy` constants.
#[derive(Deserialize, EnumString, Display, Debug, PartialEq, Eq, Copy, Clone)]
#[strum(ascii_case_insensitive, serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Sample only keys with a TTL, evict the one idle the longest.
    VolatileLru,
    /// Sample only keys with a TTL, evict the one closest to expiring.
    VolatileTtl,
    /// Sample only keys with a TTL, evict one at random.
    VolatileRandom,
    /// Sample every key, evict the one idle the longest.
    AllkeysLru,
    /// Sample every key, evict one at random.
    AllkeysRandom,
    /// Refuse to evict; `DENY_OOM` commands fail once the budget is hit.
    NoEviction,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::NoEviction
    }
}

/// Engine-wide configuration, supplied once at startup.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of numbered logical databases.
    pub dbnum: u32,
    /// Global memory budget in bytes; `0` disables the global check.
    pub max_memory: u64,
    /// Per-DB memory budget in bytes; `0` disables the per-DB check.
    pub db_max_memory: u64,
    /// Policy applied when a memory budget is exceeded.
    pub eviction_policy: EvictionPolicy,
    /// Number of random candidates sampled per eviction round.
    pub max_memory_samples: u32,
    /// Hash packed-encoding entry-count threshold.
    pub hash_max_entries: usize,
    /// Hash packed-encoding per-value byte-length threshold.
    pub hash_max_value: usize,
    /// List packed-encoding entry-count threshold.
    pub list_max_entries: usize,
    /// List packed-encoding per-value byte-length threshold.
    pub list_max_value: usize,
    /// Set packed (intset) encoding entry-count threshold.
    pub set_max_intset_entries: usize,
    /// Sorted-set packed-encoding entry-count threshold.
    pub zset_max_entries: usize,
    /// Sorted-set packed-encoding per-member byte-length threshold.
    pub zset_max_value: usize,
    /// Hard cap on the number of entries a list may hold.
    pub list_max_size: usize,
    /// Hard cap on the number of fields a hash may hold.
    pub hash_max_size: usize,
    /// Hard cap on the number of members a set may hold.
    pub set_max_size: usize,
    /// Hard cap on the number of members a sorted set may hold.
    pub zset_max_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dbnum: 16,
            max_memory: 0,
            db_max_memory: 0,
            eviction_policy: EvictionPolicy::NoEviction,
            max_memory_samples: 5,
            hash_max_entries: 128,
            hash_max_value: 64,
            list_max_entries: 128,
            list_max_value: 64,
            set_max_intset_entries: 512,
            zset_max_entries: 128,
            zset_max_value: 64,
            list_max_size: 4_294_967_295,
            hash_max_size: 4_294_967_295,
            set_max_size: 4_294_967_295,
            zset_max_size: 4_294_967_295,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.dbnum, 16);
        assert_eq!(cfg.eviction_policy, EvictionPolicy::NoEviction);
    }

    #[test]
    fn eviction_policy_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(
            EvictionPolicy::from_str("ALLKEYS-LRU").unwrap(),
            EvictionPolicy::AllkeysLru
        );
    }
}
