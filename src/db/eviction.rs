//! # Sampled eviction
//!
//! Not true LRU: under memory pressure a fixed number of random candidates
//! are drawn and scored, rather than maintaining a precise access-order
//! list. A logically-expired candidate is reclaimed on sight, before any
//! scoring happens.
use crate::config::EvictionPolicy;
use crate::db::{Clock, Database};
use bytes::Bytes;
use log::debug;

fn idle_time(db: &Database, key: &[u8], lru_now: u32) -> u32 {
    db.main_dict()
        .peek(key)
        .map(|(_, stored)| lru_now.wrapping_sub(stored.lru_stamp) & 0x3f_ffff)
        .unwrap_or(0)
}

fn sample(db: &Database, from_expires: bool, count: usize) -> Vec<Bytes> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let key = if from_expires {
            db.expires_dict().random_entry().map(|(k, _)| k.as_bytes().clone())
        } else {
            db.main_dict().random_entry().map(|(k, _)| k.as_bytes().clone())
        };
        match key {
            Some(k) => out.push(k),
            None => break,
        }
    }
    out
}

/// Runs a single eviction round against `db` under `policy`. Returns
/// whether a key was reclaimed (either because it was logically expired or
/// because it was chosen as the victim); `false` means the sampling pass
/// made no progress.
pub fn run_once(db: &mut Database, policy: EvictionPolicy, clock: &Clock) -> bool {
    if policy == EvictionPolicy::NoEviction {
        return false;
    }

    let from_expires = matches!(
        policy,
        EvictionPolicy::VolatileLru | EvictionPolicy::VolatileTtl | EvictionPolicy::VolatileRandom
    );

    let candidates = sample(db, from_expires, db.max_memory_samples.max(1) as usize);
    if candidates.is_empty() {
        return false;
    }

    for key in &candidates {
        if db.expire_if_needed(key, clock) {
            debug!("eviction: sample was already logically/TTL expired");
            return true;
        }
    }

    let victim = match policy {
        EvictionPolicy::VolatileRandom | EvictionPolicy::AllkeysRandom => candidates.into_iter().next(),
        EvictionPolicy::VolatileTtl => candidates
            .into_iter()
            .min_by_key(|k| db.get_expire(k).unwrap_or(i64::MAX)),
        EvictionPolicy::VolatileLru | EvictionPolicy::AllkeysLru => {
            let lru = clock.lru;
            candidates
                .into_iter()
                .max_by_key(|k| idle_time(db, k, lru))
        }
        EvictionPolicy::NoEviction => None,
    };

    match victim {
        Some(key) => {
            db.delete(&key);
            db.evicted += 1;
            true
        }
        None => false,
    }
}

/// Evicts from `db` until `db.max_memory` is no longer exceeded (as judged
/// by `used_memory`) or a full sampling pass makes no progress.
pub fn evict_until_under_limit(
    db: &mut Database,
    policy: EvictionPolicy,
    clock: &Clock,
    used_memory: impl Fn(&Database) -> u64,
) {
    if db.max_memory == 0 {
        return;
    }
    while used_memory(db) > db.max_memory {
        if !run_once(db, policy, clock) {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;

    fn clock(lru: u32) -> Clock {
        Clock { now: 0, lru }
    }

    #[test]
    fn no_eviction_never_evicts() {
        let mut db = Database::new(0, 1, 5);
        let v = db.prepare_key(b"a", false, 0).unwrap();
        db.super_replace(b"a", Value::string("v".into()), v, &clock(0));
        assert!(!run_once(&mut db, EvictionPolicy::NoEviction, &clock(0)));
    }

    #[test]
    fn allkeys_lru_evicts_the_oldest() {
        let mut db = Database::new(0, 1, 5);
        let v = db.prepare_key(b"old", false, 0).unwrap();
        db.super_replace(b"old", Value::string("v".into()), v, &clock(0));
        let v = db.prepare_key(b"new", false, 0).unwrap();
        db.super_replace(b"new", Value::string("v".into()), v, &clock(100));

        for _ in 0..50 {
            run_once(&mut db, EvictionPolicy::AllkeysLru, &clock(100));
            if db.len() == 1 {
                break;
            }
        }
        assert_eq!(db.len(), 1);
        assert!(db.contains(b"new", &clock(100)));
    }

    #[test]
    fn evict_until_under_limit_stops_when_satisfied() {
        let mut db = Database::new(0, 10, 5);
        for i in 0..5u8 {
            let key = [i];
            let v = db.prepare_key(&key, false, 0).unwrap();
            db.super_replace(&key, Value::string("v".into()), v, &clock(0));
        }
        evict_until_under_limit(&mut db, EvictionPolicy::AllkeysRandom, &clock(0), |_| 0);
        assert_eq!(db.evicted, 0);
    }
}
