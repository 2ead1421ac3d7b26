//! # Server
//!
//! The top-level engine handle: the array of numbered databases, the global
//! memory budget and eviction policy, the shared LRU clock, and the dirty
//! counter persistence (out of scope here) would read.
use crate::config::EngineConfig;
use crate::db::{eviction, Clock, Database};
use crate::error::Error;
use log::debug;

/// 22-bit wrapping LRU clock: the teacher's `redis.h` uses the same width
/// at 10-second resolution.
pub const LRU_CLOCK_BITS: u32 = 22;
const LRU_CLOCK_MASK: u32 = (1 << LRU_CLOCK_BITS) - 1;
/// Resolution, in seconds, of one LRU clock tick.
pub const LRU_CLOCK_RESOLUTION_SECS: i64 = 10;

/// Top-level engine state.
pub struct Server {
    databases: Vec<Database>,
    config: EngineConfig,
    lru_clock: u32,
    /// Monotonic count of state-mutating effects.
    pub dirty: u64,
    rehashing_disabled: bool,
}

impl Server {
    /// Builds a server with `config.dbnum` empty databases.
    pub fn new(config: EngineConfig) -> Self {
        let databases = (0..config.dbnum)
            .map(|id| Database::new(id, config.db_max_memory, config.max_memory_samples))
            .collect();
        Self {
            databases,
            config,
            lru_clock: 0,
            dirty: 0,
            rehashing_disabled: false,
        }
    }

    /// The engine configuration this server was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of configured databases.
    pub fn dbnum(&self) -> usize {
        self.databases.len()
    }

    /// Borrows database `index`, or [`Error::NoSuchDatabase`] if out of
    /// range.
    pub fn database(&mut self, index: usize) -> Result<&mut Database, Error> {
        self.databases.get_mut(index).ok_or(Error::NoSuchDatabase)
    }

    /// All databases, for cron passes.
    pub fn databases_mut(&mut self) -> &mut [Database] {
        &mut self.databases
    }

    /// A [`Clock`] reading for `now` (seconds since the epoch) at the
    /// server's current LRU tick.
    pub fn clock_at(&self, now: i64) -> Clock {
        Clock { now, lru: self.lru_clock }
    }

    /// Advances the shared LRU clock by one tick (10 seconds of simulated
    /// idle-time resolution), wrapping at 22 bits.
    pub fn tick_lru_clock(&mut self) {
        self.lru_clock = (self.lru_clock + 1) & LRU_CLOCK_MASK;
    }

    /// Disables (or re-enables) incremental rehashing across every
    /// database, e.g. around a hook that mirrors "a child process exists".
    pub fn set_rehashing_disabled(&mut self, disabled: bool) {
        self.rehashing_disabled = disabled;
        for db in &mut self.databases {
            db.set_rehashing_disabled(disabled);
        }
        debug!("server: rehashing disabled = {}", disabled);
    }

    /// Whether rehashing is currently suppressed.
    pub fn rehashing_disabled(&self) -> bool {
        self.rehashing_disabled
    }

    /// Runs the global `DENY_OOM` gate: if usage summed across every
    /// database exceeds the server's unscaled memory budget, attempts
    /// eviction under the configured policy — preferring `db_index` as the
    /// command's own target, then scanning the rest of the databases for a
    /// victim — failing with [`Error::ReachMaxMemory`] only if usage is
    /// still over budget once no database can make further progress.
    pub fn enforce_deny_oom(&mut self, db_index: usize, used_memory: impl Fn(&Database) -> u64, now: i64) -> Result<(), Error> {
        if self.config.max_memory == 0 {
            return Ok(());
        }
        let clock = self.clock_at(now);
        let policy = self.config.eviction_policy;
        let max_memory = self.config.max_memory;
        let total_usage = |dbs: &[Database]| -> u64 { dbs.iter().map(&used_memory).sum() };

        while total_usage(&self.databases) > max_memory {
            let mut progressed = false;
            if let Some(db) = self.databases.get_mut(db_index) {
                progressed = eviction::run_once(db, policy, &clock);
            }
            if !progressed {
                for db in &mut self.databases {
                    if eviction::run_once(db, policy, &clock) {
                        progressed = true;
                        break;
                    }
                }
            }
            if !progressed {
                break;
            }
        }

        if total_usage(&self.databases) > max_memory {
            Err(Error::ReachMaxMemory)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_configured_number_of_databases() {
        let server = Server::new(EngineConfig { dbnum: 4, ..EngineConfig::default() });
        assert_eq!(server.dbnum(), 4);
    }

    #[test]
    fn lru_clock_wraps_at_22_bits() {
        let mut server = Server::new(EngineConfig::default());
        for _ in 0..(1 << LRU_CLOCK_BITS) {
            server.tick_lru_clock();
        }
        assert_eq!(server.clock_at(0).lru, 0);
    }

    #[test]
    fn database_out_of_range_errors() {
        let mut server = Server::new(EngineConfig { dbnum: 1, ..EngineConfig::default() });
        assert_eq!(server.database(5).unwrap_err(), Error::NoSuchDatabase);
    }

    /// A lightly-loaded db must not trip eviction just because its own
    /// share of `max_memory / dbnum` is exceeded; only true global usage
    /// (summed across every database) matters.
    #[test]
    fn deny_oom_checks_true_global_usage_not_a_per_db_share() {
        use crate::config::EvictionPolicy;
        use crate::value::Value;

        let mut server = Server::new(EngineConfig {
            dbnum: 2,
            max_memory: 10,
            eviction_policy: EvictionPolicy::AllkeysRandom,
            ..EngineConfig::default()
        });
        let clock = server.clock_at(0);
        {
            let db0 = server.database(0).unwrap();
            for n in 0..8 {
                let key = format!("k{n}");
                let version = db0.prepare_key(key.as_bytes(), false, 0).unwrap();
                db0.super_replace(key.as_bytes(), Value::string(bytes::Bytes::from(key.clone())), version, &clock);
            }
        }
        {
            let db1 = server.database(1).unwrap();
            let version = db1.prepare_key(b"only", false, 0).unwrap();
            db1.super_replace(b"only", Value::string(bytes::Bytes::from_static(b"v")), version, &clock);
        }

        // db0 alone (8) exceeds a naive max_memory/dbnum=5 share, but true
        // global usage (9) is under the unscaled budget of 10.
        server.enforce_deny_oom(0, |db| db.len() as u64, 0).unwrap();
        assert_eq!(server.database(0).unwrap().len(), 8);
        assert_eq!(server.database(1).unwrap().len(), 1);
    }
}
