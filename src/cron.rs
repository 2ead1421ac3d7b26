//! # Periodic cron
//!
//! Background maintenance run at roughly 10 Hz by the embedder: advances
//! the shared LRU clock, spends a bounded rehash budget, and sweeps active
//! expiry. Exposed as a plain synchronous function rather than a scheduled
//! task, since the event loop driving the cadence is outside this engine's
//! scope.
use crate::server::Server;
use log::trace;

/// Ticks are counted so the resize sweep only runs every tenth call,
/// matching the once-per-second cadence at a 10 Hz tick rate.
const RESIZE_SWEEP_EVERY: u64 = 10;
/// Per-tick rehash budget, in milliseconds.
const REHASH_BUDGET_MS: u64 = 1;
/// Keys considered per database, per tick, during active expiry.
const ACTIVE_EXPIRE_BUDGET: usize = 20;

/// Drives one cron tick against `server`. `now` is seconds since the epoch.
pub struct Cron {
    ticks: u64,
}

impl Cron {
    /// Creates a fresh tick counter.
    pub fn new() -> Self {
        Self { ticks: 0 }
    }

    /// Runs a single tick: advances the LRU clock, spends a rehash budget
    /// on any database mid-resize, and sweeps active expiry.
    pub fn tick(&mut self, server: &mut Server, now: i64) {
        server.tick_lru_clock();
        self.ticks = self.ticks.wrapping_add(1);

        let consider_resize = !server.rehashing_disabled() && self.ticks % RESIZE_SWEEP_EVERY == 0;
        let clock = server.clock_at(now);

        for db in server.databases_mut() {
            if consider_resize {
                db.consider_resize();
            }
            db.rehash_ms(REHASH_BUDGET_MS);
            db.active_expire_cycle(&clock, ACTIVE_EXPIRE_BUDGET);
        }
        trace!("cron: tick {} complete", self.ticks);
    }
}

impl Default for Cron {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::Clock;
    use crate::value::Value;

    #[test]
    fn tick_advances_lru_clock() {
        let mut server = Server::new(EngineConfig::default());
        let mut cron = Cron::new();
        let before = server.clock_at(0).lru;
        cron.tick(&mut server, 0);
        assert_eq!(server.clock_at(0).lru, before + 1);
    }

    #[test]
    fn tick_sweeps_expired_keys() {
        let mut server = Server::new(EngineConfig::default());
        let db = server.database(0).unwrap();
        let c = Clock { now: 0, lru: 0 };
        let v = db.prepare_key(b"a", false, 0).unwrap();
        db.super_replace(b"a", Value::string("v".into()), v, &c);
        db.set_expire(b"a", 0);

        let mut cron = Cron::new();
        cron.tick(&mut server, 100);
        assert_eq!(server.database(0).unwrap().len(), 0);
    }
}
