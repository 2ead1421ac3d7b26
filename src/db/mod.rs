//! # In-memory database
//!
//! A single numbered database: a keyspace dictionary, a sparse TTL
//! dictionary, a logical clock used for generation-based mass expiry, and
//! the per-DB counters the command engine updates as it runs.
pub mod eviction;

use crate::dict::Dictionary;
use crate::error::Error;
use crate::value::Value;
use bytes::Bytes;
use log::{debug, trace};

/// A point in time plus the shared LRU clock tick, threaded through every
/// database operation that needs either. `now` is seconds since the epoch;
/// `lru` is the 22-bit, 10-second-resolution clock from [`crate::server::Server`].
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    /// Seconds since the epoch.
    pub now: i64,
    /// Current value of the shared 22-bit LRU clock.
    pub lru: u32,
}

/// A value together with the LRU stamp sampled eviction scores against.
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// The stored value.
    pub value: Value,
    /// 22-bit wrapping LRU clock reading at last access.
    pub lru_stamp: u32,
}

/// The three outcomes `ttl` can report, replacing the original's overloaded
/// signed-integer return (`-1`/`-2`/seconds) with a proper enum.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TtlResult {
    /// Seconds remaining before expiry.
    Remaining(i64),
    /// The key exists but carries no TTL.
    NoTtl,
    /// The key does not exist.
    NotExist,
}

/// A single numbered logical database.
#[derive(Debug)]
pub struct Database {
    main: Dictionary<StoredValue>,
    expires: Dictionary<i64>,
    logical_clock: u16,
    need_remove_key: usize,
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found nothing (or found an expired key).
    pub misses: u64,
    /// Keys reclaimed by eviction.
    pub evicted: u64,
    /// Keys reclaimed by lazy or active expiry.
    pub expired: u64,
    /// Mutating operations applied.
    pub write_count: u64,
    /// Read operations applied.
    pub read_count: u64,
    /// Keys removed by `del`, expiry, or eviction.
    pub remove_count: u64,
    /// Per-DB memory budget in bytes; `0` disables the check.
    pub max_memory: u64,
    /// Random candidates sampled per eviction round.
    pub max_memory_samples: u32,
    /// This database's index within the server.
    pub id: u32,
}

impl Database {
    /// Creates an empty database.
    pub fn new(id: u32, max_memory: u64, max_memory_samples: u32) -> Self {
        Self {
            main: Dictionary::new(),
            expires: Dictionary::new(),
            logical_clock: 0,
            need_remove_key: 0,
            hits: 0,
            misses: 0,
            evicted: 0,
            expired: 0,
            write_count: 0,
            read_count: 0,
            remove_count: 0,
            max_memory,
            max_memory_samples,
            id,
        }
    }

    /// Number of live keys (lazily-expirable keys not yet reclaimed still
    /// count until the next access or cron pass touches them).
    pub fn len(&self) -> usize {
        self.main.size()
    }

    /// Whether the database holds no keys.
    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// Count of logically-expired keys known to still be materialised.
    pub fn need_remove_key(&self) -> usize {
        self.need_remove_key
    }

    /// The database's current logical clock value.
    pub fn logical_clock(&self) -> u16 {
        self.logical_clock
    }

    fn remove_key(&mut self, key: &[u8]) {
        if self.main.delete(key).is_some() {
            self.remove_count += 1;
        }
        self.expires.delete(key);
    }

    /// Checks (and if necessary reclaims) a key's two expiry mechanisms:
    /// the logical clock first, then wall-clock TTL.
    pub fn expire_if_needed(&mut self, key: &[u8], clock: &Clock) -> bool {
        let logical_clock = self.logical_clock;
        let stale_generation = self
            .main
            .find(key)
            .map(|(k, _)| k.logical_clock() > 0 && logical_clock > k.logical_clock())
            .unwrap_or(false);

        if stale_generation {
            trace!("db: key past logical clock, reclaiming");
            self.remove_key(key);
            self.need_remove_key = self.need_remove_key.saturating_sub(1);
            self.expired += 1;
            return true;
        }

        let ttl_passed = self
            .expires
            .find(key)
            .map(|(_, when)| clock.now > *when)
            .unwrap_or(false);

        if ttl_passed {
            trace!("db: key past its TTL, reclaiming");
            self.remove_key(key);
            self.expired += 1;
            return true;
        }

        false
    }

    /// Looks a key up for a read, bumping its LRU stamp and the hit/miss
    /// counters.
    pub fn lookup_read(&mut self, key: &[u8], clock: &Clock) -> Option<&Value> {
        self.read_count += 1;
        if self.expire_if_needed(key, clock) {
            self.misses += 1;
            return None;
        }
        match self.main.find_mut(key) {
            Some((_, stored)) => {
                stored.lru_stamp = clock.lru;
                self.hits += 1;
                Some(&stored.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Looks a key up for a mutation, bumping its LRU stamp.
    pub fn lookup_write(&mut self, key: &[u8], clock: &Clock) -> Option<&mut Value> {
        if self.expire_if_needed(key, clock) {
            return None;
        }
        self.main.find_mut(key).map(|(_, stored)| {
            stored.lru_stamp = clock.lru;
            &mut stored.value
        })
    }

    /// Whether `key` is present (after lazy-expiry checks).
    pub fn contains(&mut self, key: &[u8], clock: &Clock) -> bool {
        !self.expire_if_needed(key, clock) && self.main.find(key).is_some()
    }

    /// Samples a live key at random, skipping (and reclaiming) any
    /// logically- or TTL-expired key it draws.
    pub fn random_key(&mut self, clock: &Clock) -> Option<Bytes> {
        loop {
            let candidate = self.main.random_entry().map(|(k, _)| k.as_bytes().clone());
            let key = candidate?;
            if !self.expire_if_needed(&key, clock) {
                return Some(key);
            }
        }
    }

    /// Removes every key from both dictionaries, returning how many main
    /// entries were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.main.clear();
        self.expires.clear();
        self.need_remove_key = 0;
        removed
    }

    /// Implements the optimistic-concurrency protocol: given the client's
    /// `version_care`/`version_in`, returns the version that should be
    /// committed to the key once its mutation succeeds, or
    /// [`Error::VersionError`] if a conflicting version was supplied.
    pub fn prepare_key(&mut self, key: &[u8], version_care: bool, version_in: u16) -> Result<u16, Error> {
        let base = match self.main.find(key) {
            Some((stored_key, _)) => {
                let current = stored_key.version();
                if version_care && current != 0 && current != version_in {
                    return Err(Error::VersionError);
                }
                version_in
            }
            None => 0,
        };
        Ok(if version_care { base.wrapping_add(1) } else { base })
    }

    /// Upserts `value` under `key`, stamping its version with `version` and
    /// its logical-clock field with the database's current generation. This
    /// is the single path every mutating command funnels through.
    pub fn super_replace(&mut self, key: &[u8], value: Value, version: u16, clock: &Clock) {
        self.main.super_replace(
            key,
            StoredValue {
                value,
                lru_stamp: clock.lru,
            },
            version,
        );
        let generation = self.logical_clock;
        self.main.update_key(key, |k| k.set_logical_clock(generation));
        self.write_count += 1;
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let existed = self.main.delete(key).is_some();
        self.expires.delete(key);
        if existed {
            self.remove_count += 1;
        }
        existed
    }

    /// Installs a wall-clock TTL on `key`.
    pub fn set_expire(&mut self, key: &[u8], when: i64) {
        self.expires.replace(
            crate::key::EncodedKey::new(Bytes::copy_from_slice(key)),
            when,
        );
    }

    /// Reads `key`'s wall-clock TTL, if any.
    pub fn get_expire(&mut self, key: &[u8]) -> Option<i64> {
        self.expires.find(key).map(|(_, when)| *when)
    }

    /// Removes `key`'s TTL if any, returning whether one was removed.
    pub fn remove_expire(&mut self, key: &[u8]) -> bool {
        self.expires.delete(key).is_some()
    }

    /// Reports a key's remaining TTL as one of three distinct outcomes.
    pub fn ttl(&mut self, key: &[u8], clock: &Clock) -> TtlResult {
        if self.expire_if_needed(key, clock) || self.main.find(key).is_none() {
            return TtlResult::NotExist;
        }
        match self.get_expire(key) {
            Some(when) => TtlResult::Remaining((when - clock.now).max(0)),
            None => TtlResult::NoTtl,
        }
    }

    /// Applies the condensed X-expire protocol: negative is a no-op,
    /// zero persists, `0 < s <= now` is a duration, `s > now` is an
    /// absolute timestamp.
    pub fn expire_xgeneric(&mut self, key: &[u8], seconds: i64, clock: &Clock) -> bool {
        if seconds < 0 {
            return false;
        }
        if self.main.find(key).is_none() {
            return false;
        }
        if seconds == 0 {
            return self.remove_expire(key);
        }
        let when = if seconds <= clock.now {
            clock.now + seconds
        } else {
            seconds
        };
        self.set_expire(key, when);
        true
    }

    /// Applies a command's deferred TTL side-effect: `> 0` installs a TTL,
    /// `0` clears any TTL, `< 0` leaves TTL untouched.
    pub fn apply_deferred_ttl(&mut self, key: &[u8], expiretime_in: i64) {
        if expiretime_in > 0 {
            self.set_expire(key, expiretime_in);
        } else if expiretime_in == 0 {
            self.remove_expire(key);
        }
    }

    /// Advances the logical clock by one, implicitly expiring every key
    /// whose stamp is now behind it.
    pub fn advance_generation(&mut self) {
        self.logical_clock = self.logical_clock.wrapping_add(1);
        self.need_remove_key = self.main.size();
        debug!("db {}: logical clock advanced to {}", self.id, self.logical_clock);
    }

    /// Runs one bounded step of active expiry, sampling from the expires
    /// dictionary and reclaiming anything past its TTL or generation.
    pub fn active_expire_cycle(&mut self, clock: &Clock, budget: usize) {
        let keys: Vec<Bytes> = self
            .expires
            .iter()
            .take(budget)
            .map(|(k, _)| k.as_bytes().clone())
            .collect();
        for key in keys {
            self.expire_if_needed(&key, clock);
        }
        if self.need_remove_key > 0 {
            let candidates: Vec<Bytes> = self
                .main
                .iter()
                .filter(|(k, _)| k.logical_clock() > 0 && self.logical_clock > k.logical_clock())
                .take(budget)
                .map(|(k, _)| k.as_bytes().clone())
                .collect();
            for key in candidates {
                self.expire_if_needed(&key, clock);
            }
        }
    }

    /// Mutable access to the keyspace dictionary, for eviction sampling.
    pub(crate) fn main_dict(&self) -> &Dictionary<StoredValue> {
        &self.main
    }

    /// Mutable access to the expires dictionary, for eviction sampling.
    pub(crate) fn expires_dict(&self) -> &Dictionary<i64> {
        &self.expires
    }

    /// Spends up to `deadline_ms` on incremental rehashing for both
    /// dictionaries.
    pub fn rehash_ms(&mut self, deadline_ms: u64) {
        self.main.rehash_ms(deadline_ms);
        self.expires.rehash_ms(deadline_ms);
    }

    /// Suppresses (or re-enables) incremental rehashing on both
    /// dictionaries.
    pub fn set_rehashing_disabled(&mut self, disabled: bool) {
        self.main.set_rehashing_disabled(disabled);
        self.expires.set_rehashing_disabled(disabled);
    }

    /// Checks both dictionaries' fill and starts a resize if warranted,
    /// catching the shrink case between mutations.
    pub fn consider_resize(&mut self) {
        self.main.consider_resize();
        self.expires.consider_resize();
    }
}
