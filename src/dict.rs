//! # Dictionary
//!
//! A separately-chained hash table keyed by [`EncodedKey`] with two internal
//! tables, so a resize can proceed incrementally instead of stalling a
//! command on a full rehash. This backs both a database's keyspace and its
//! expires table, the way `db.c`'s single `dict` type backs `redisDb.dict`
//! and `redisDb.expires` in the lineage this engine descends from.
use crate::key::EncodedKey;
use log::trace;
use rand::Rng;
use std::time::Instant;

const INITIAL_SLOTS: usize = 4;
/// Number of buckets migrated per incremental rehash step triggered by a
/// normal dictionary operation.
const REHASH_CHAINS_PER_STEP: usize = 1;

#[derive(Debug)]
struct Table<V> {
    buckets: Vec<Vec<(EncodedKey, V)>>,
    len: usize,
}

impl<V> Table<V> {
    fn with_slots(slots: usize) -> Self {
        let slots = slots.next_power_of_two().max(1);
        Self {
            buckets: (0..slots).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    fn slot_count(&self) -> usize {
        self.buckets.len()
    }

    fn slot_for(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn load_factor(&self) -> f64 {
        if self.buckets.is_empty() {
            0.0
        } else {
            self.len as f64 / self.buckets.len() as f64
        }
    }
}

fn hash_of(bytes: &[u8]) -> u64 {
    seahash::hash(bytes)
}

/// Incrementally-rehashing hash table from [`EncodedKey`] to `V`.
#[derive(Debug)]
pub struct Dictionary<V> {
    primary: Table<V>,
    secondary: Option<Table<V>>,
    rehash_cursor: usize,
    rehashing_disabled: bool,
}

impl<V> Dictionary<V> {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self {
            primary: Table::with_slots(INITIAL_SLOTS),
            secondary: None,
            rehash_cursor: 0,
            rehashing_disabled: false,
        }
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.primary.len + self.secondary.as_ref().map_or(0, |t| t.len)
    }

    /// Whether the dictionary holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Total number of buckets across both tables.
    pub fn slot_count(&self) -> usize {
        self.primary.slot_count() + self.secondary.as_ref().map_or(0, |t| t.slot_count())
    }

    /// Whether a resize is currently in progress.
    pub fn is_rehashing(&self) -> bool {
        self.secondary.is_some()
    }

    /// Disables incremental rehashing, e.g. while a background snapshotter
    /// is assumed to be reading this table's memory.
    pub fn set_rehashing_disabled(&mut self, disabled: bool) {
        self.rehashing_disabled = disabled;
    }

    /// Checks whether the table's fill warrants starting a resize right
    /// now, for callers (the cron) that want to catch the shrink case
    /// instead of waiting for the next insert to notice it.
    pub fn consider_resize(&mut self) {
        self.maybe_start_resize();
    }

    fn maybe_start_resize(&mut self) {
        if self.rehashing_disabled || self.secondary.is_some() {
            return;
        }
        let lf = self.primary.load_factor();
        let shrinkable = self.primary.len >= INITIAL_SLOTS && lf < 0.1;
        if lf > 1.0 || shrinkable {
            let target = self.primary.len.max(1) * 2;
            trace!("dict: starting resize to {} slots", target.next_power_of_two());
            self.secondary = Some(Table::with_slots(target));
            self.rehash_cursor = 0;
        }
    }

    /// Migrates up to `chains` buckets from the primary table into the
    /// secondary table. No-op when not rehashing.
    pub fn rehash_step(&mut self, chains: usize) {
        let Some(secondary) = self.secondary.as_mut() else {
            return;
        };
        let mut moved = 0;
        while moved < chains && self.rehash_cursor < self.primary.buckets.len() {
            let chain = std::mem::take(&mut self.primary.buckets[self.rehash_cursor]);
            self.primary.len -= chain.len();
            for (key, value) in chain {
                let slot = secondary.slot_for(hash_of(key.as_bytes()));
                secondary.buckets[slot].push((key, value));
                secondary.len += 1;
            }
            self.rehash_cursor += 1;
            moved += 1;
        }
        if self.rehash_cursor >= self.primary.buckets.len() {
            self.primary = self.secondary.take().unwrap();
            self.rehash_cursor = 0;
        }
    }

    /// Spends up to `deadline_ms` milliseconds migrating buckets, for use
    /// from the periodic cron.
    pub fn rehash_ms(&mut self, deadline_ms: u64) {
        if self.secondary.is_none() {
            return;
        }
        let deadline = Instant::now() + std::time::Duration::from_millis(deadline_ms);
        while self.secondary.is_some() && Instant::now() < deadline {
            self.rehash_step(REHASH_CHAINS_PER_STEP);
        }
    }

    fn active_chain(&self, hash: u64) -> &Vec<(EncodedKey, V)> {
        if let Some(secondary) = &self.secondary {
            &secondary.buckets[secondary.slot_for(hash)]
        } else {
            &self.primary.buckets[self.primary.slot_for(hash)]
        }
    }

    /// Looks a key up by raw bytes without triggering an incremental
    /// rehash step, for callers that only hold a shared reference.
    pub fn peek(&self, key: &[u8]) -> Option<(&EncodedKey, &V)> {
        let hash = hash_of(key);
        if let Some(secondary) = &self.secondary {
            let slot = secondary.slot_for(hash);
            if let Some(entry) = secondary.buckets[slot].iter().find(|(k, _)| k.borrow_bytes() == key) {
                return Some((&entry.0, &entry.1));
            }
        }
        let slot = self.primary.slot_for(hash);
        self.primary.buckets[slot]
            .iter()
            .find(|(k, _)| k.borrow_bytes() == key)
            .map(|(k, v)| (k, v))
    }

    /// Looks a key up by raw bytes.
    pub fn find(&mut self, key: &[u8]) -> Option<(&EncodedKey, &V)> {
        self.rehash_step(REHASH_CHAINS_PER_STEP);
        let hash = hash_of(key);
        if let Some(secondary) = &self.secondary {
            let slot = secondary.slot_for(hash);
            if let Some(entry) = secondary.buckets[slot].iter().find(|(k, _)| k.borrow_bytes() == key) {
                return Some((&entry.0, &entry.1));
            }
        }
        let slot = self.primary.slot_for(hash);
        self.primary.buckets[slot]
            .iter()
            .find(|(k, _)| k.borrow_bytes() == key)
            .map(|(k, v)| (k, v))
    }

    /// Looks a key up by raw bytes, returning a mutable value reference.
    pub fn find_mut(&mut self, key: &[u8]) -> Option<(&mut EncodedKey, &mut V)> {
        self.rehash_step(REHASH_CHAINS_PER_STEP);
        let hash = hash_of(key);
        if let Some(secondary) = &mut self.secondary {
            let slot = secondary.slot_for(hash);
            if let Some(entry) = secondary.buckets[slot]
                .iter_mut()
                .find(|(k, _)| k.borrow_bytes() == key)
            {
                return Some((&mut entry.0, &mut entry.1));
            }
        }
        let slot = self.primary.slot_for(hash);
        self.primary.buckets[slot]
            .iter_mut()
            .find(|(k, _)| k.borrow_bytes() == key)
            .map(|(k, v)| (k, v))
    }

    /// Inserts `value` under `key` only if `key` is absent. Returns `false`
    /// if the key already existed.
    pub fn add(&mut self, key: EncodedKey, value: V) -> bool {
        if self.find(key.as_bytes()).is_some() {
            return false;
        }
        self.insert_new(key, value);
        true
    }

    /// Upserts `value` under `key`. Returns `true` if this inserted a new
    /// entry, `false` if it replaced an existing one.
    pub fn replace(&mut self, key: EncodedKey, value: V) -> bool {
        if let Some((_, slot)) = self.find_mut(key.as_bytes()) {
            *slot = value;
            false
        } else {
            self.insert_new(key, value);
            true
        }
    }

    /// Upserts `value` under `key`, stamping the resulting stored key's
    /// version with `version`. This is the path every mutating command
    /// funnels through.
    pub fn super_replace(&mut self, key: &[u8], value: V, version: u16) {
        if let Some((stored_key, slot)) = self.find_mut(key) {
            stored_key.set_version(version);
            *slot = value;
        } else {
            let mut new_key = EncodedKey::new(bytes::Bytes::copy_from_slice(key));
            new_key.set_version(version);
            self.insert_new(new_key, value);
        }
    }

    /// Rewrites a stored key's side-data in place via `f`, without touching
    /// its value.
    pub fn update_key(&mut self, key: &[u8], f: impl FnOnce(&mut EncodedKey)) -> bool {
        if let Some((stored_key, _)) = self.find_mut(key) {
            f(stored_key);
            true
        } else {
            false
        }
    }

    fn insert_new(&mut self, key: EncodedKey, value: V) {
        self.rehash_step(REHASH_CHAINS_PER_STEP);
        let hash = hash_of(key.as_bytes());
        if let Some(secondary) = &mut self.secondary {
            let slot = secondary.slot_for(hash);
            secondary.buckets[slot].push((key, value));
            secondary.len += 1;
        } else {
            let slot = self.primary.slot_for(hash);
            self.primary.buckets[slot].push((key, value));
            self.primary.len += 1;
        }
        self.maybe_start_resize();
    }

    /// Removes a key, returning its value if present.
    pub fn delete(&mut self, key: &[u8]) -> Option<(EncodedKey, V)> {
        let hash = hash_of(key);
        if let Some(secondary) = &mut self.secondary {
            let slot = secondary.slot_for(hash);
            if let Some(pos) = secondary.buckets[slot]
                .iter()
                .position(|(k, _)| k.borrow_bytes() == key)
            {
                secondary.len -= 1;
                return Some(secondary.buckets[slot].remove(pos));
            }
        }
        let slot = self.primary.slot_for(hash);
        if let Some(pos) = self.primary.buckets[slot]
            .iter()
            .position(|(k, _)| k.borrow_bytes() == key)
        {
            self.primary.len -= 1;
            return Some(self.primary.buckets[slot].remove(pos));
        }
        None
    }

    /// Returns a uniformly-random live entry, or `None` if the dictionary is
    /// empty. Stays uniform while a resize is in progress by weighting the
    /// choice of table by its share of total entries.
    pub fn random_entry(&self) -> Option<(&EncodedKey, &V)> {
        let total = self.size();
        if total == 0 {
            return None;
        }
        let mut rng = rand::thread_rng();
        let mut idx = rng.gen_range(0..total);
        for table in [Some(&self.primary), self.secondary.as_ref()].into_iter().flatten() {
            if idx < table.len {
                for bucket in &table.buckets {
                    if idx < bucket.len() {
                        return bucket.get(idx).map(|(k, v)| (k, v));
                    }
                    idx -= bucket.len();
                }
            } else {
                idx -= table.len;
            }
        }
        None
    }

    /// Iterates over all live entries.
    pub fn iter(&self) -> impl Iterator<Item = (&EncodedKey, &V)> {
        self.primary
            .buckets
            .iter()
            .chain(self.secondary.iter().flat_map(|t| t.buckets.iter()))
            .flat_map(|bucket| bucket.iter().map(|(k, v)| (k, v)))
    }

    /// Removes every entry, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.size();
        self.primary = Table::with_slots(INITIAL_SLOTS);
        self.secondary = None;
        self.rehash_cursor = 0;
        n
    }
}

impl<V> Default for Dictionary<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodedKey {
    fn borrow_bytes(&self) -> &[u8] {
        use std::borrow::Borrow;
        Borrow::<[u8]>::borrow(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn add_find_delete() {
        let mut d: Dictionary<i32> = Dictionary::new();
        assert!(d.add(EncodedKey::new(Bytes::from_static(b"a")), 1));
        assert!(!d.add(EncodedKey::new(Bytes::from_static(b"a")), 2));
        assert_eq!(d.find(b"a").map(|(_, v)| *v), Some(1));
        assert_eq!(d.delete(b"a").map(|(_, v)| v), Some(1));
        assert!(d.find(b"a").is_none());
    }

    #[test]
    fn super_replace_stamps_version() {
        let mut d: Dictionary<i32> = Dictionary::new();
        d.super_replace(b"a", 1, 5);
        assert_eq!(d.find(b"a").map(|(k, _)| k.version()), Some(5));
        d.super_replace(b"a", 2, 6);
        assert_eq!(d.find(b"a").map(|(k, v)| (k.version(), *v)), Some((6, 2)));
    }

    #[test]
    fn resize_preserves_entries() {
        let mut d: Dictionary<i32> = Dictionary::new();
        for i in 0..500 {
            d.add(EncodedKey::new(Bytes::from(i.to_string())), i);
        }
        for _ in 0..2000 {
            d.rehash_step(1);
        }
        assert_eq!(d.size(), 500);
        for i in 0..500 {
            assert_eq!(d.find(i.to_string().as_bytes()).map(|(_, v)| *v), Some(i));
        }
    }

    #[test]
    fn random_entry_on_empty() {
        let d: Dictionary<i32> = Dictionary::new();
        assert!(d.random_entry().is_none());
    }
}
