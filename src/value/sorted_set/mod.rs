//! # Sorted set
use bytes::Bytes;
use float_ord::FloatOrd;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Outcome of a [`SortedSet::insert`].
#[derive(Debug, PartialEq)]
pub enum InsertResult {
    /// The member was new.
    Inserted,
    /// The member already existed; its score was updated.
    Updated,
}

/// Score-ordered set of members, backed by a score lookup map and a
/// `BTreeMap` kept in score order.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HashMap<Bytes, FloatOrd<f64>>,
    order: BTreeMap<(FloatOrd<f64>, Bytes), ()>,
}

impl PartialEq for SortedSet {
    fn eq(&self, other: &SortedSet) -> bool {
        self.scores == other.scores
    }
}

impl SortedSet {
    /// Creates an empty sorted set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the set holds no members.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Inserts or updates `member` with `score`.
    pub fn insert(&mut self, score: f64, member: Bytes) -> InsertResult {
        let score = FloatOrd(score);
        if let Some(old) = self.scores.insert(member.clone(), score) {
            self.order.remove(&(old, member.clone()));
            self.order.insert((score, member), ());
            InsertResult::Updated
        } else {
            self.order.insert((score, member), ());
            InsertResult::Inserted
        }
    }

    /// Adds `delta` to `member`'s score (inserting it at `delta` if absent),
    /// returning the resulting score.
    pub fn incr(&mut self, member: Bytes, delta: f64) -> f64 {
        let new_score = self
            .scores
            .get(&member)
            .map_or(delta, |FloatOrd(s)| s + delta);
        self.insert(new_score, member);
        new_score
    }

    /// Removes `member`, returning whether it was present.
    pub fn remove(&mut self, member: &Bytes) -> bool {
        if let Some(score) = self.scores.remove(member) {
            self.order.remove(&(score, member.clone()));
            true
        } else {
            false
        }
    }

    /// The score for `member`, if it's a member.
    pub fn score(&self, member: &Bytes) -> Option<f64> {
        self.scores.get(member).map(|FloatOrd(s)| *s)
    }

    /// Members in ascending score order.
    pub fn members_ascending(&self) -> Vec<(Bytes, f64)> {
        self.order
            .keys()
            .map(|(FloatOrd(s), m)| (m.clone(), *s))
            .collect()
    }

    /// `member`'s zero-based rank in ascending score order.
    pub fn rank(&self, member: &Bytes) -> Option<usize> {
        let score = *self.scores.get(member)?;
        Some(
            self.order
                .range(..(score, member.clone()))
                .count(),
        )
    }

    #[inline]
    fn score_bounds(
        min: Bound<f64>,
        max: Bound<f64>,
    ) -> (Bound<(FloatOrd<f64>, Bytes)>, Bound<(FloatOrd<f64>, Bytes)>) {
        let lo = Bytes::new();
        let hi = Bytes::copy_from_slice(&[0xffu8; 4096]);
        (
            match min {
                Bound::Included(s) => Bound::Included((FloatOrd(s), lo.clone())),
                Bound::Excluded(s) => Bound::Excluded((FloatOrd(s), hi.clone())),
                Bound::Unbounded => Bound::Unbounded,
            },
            match max {
                Bound::Included(s) => Bound::Included((FloatOrd(s), hi)),
                Bound::Excluded(s) => Bound::Excluded((FloatOrd(s), lo)),
                Bound::Unbounded => Bound::Unbounded,
            },
        )
    }

    /// Members whose score falls within `[min, max]` (subject to `Bound`
    /// inclusivity), in ascending order.
    pub fn range_by_score(&self, min: Bound<f64>, max: Bound<f64>) -> Vec<(Bytes, f64)> {
        self.order
            .range(Self::score_bounds(min, max))
            .map(|((FloatOrd(s), m), _)| (m.clone(), *s))
            .collect()
    }

    /// Count of members whose score falls within `[min, max]`.
    pub fn count_by_score(&self, min: Bound<f64>, max: Bound<f64>) -> usize {
        self.order.range(Self::score_bounds(min, max)).count()
    }

    /// Removes every member whose score falls within `[min, max]`, returning
    /// how many were removed.
    pub fn remove_by_score(&mut self, min: Bound<f64>, max: Bound<f64>) -> usize {
        let victims: Vec<(FloatOrd<f64>, Bytes)> = self
            .order
            .range(Self::score_bounds(min, max))
            .map(|(k, _)| k.clone())
            .collect();
        for (score, member) in &victims {
            self.scores.remove(member);
            self.order.remove(&(*score, member.clone()));
        }
        victims.len()
    }

    /// Removes members at ascending ranks `[start, stop]` (inclusive),
    /// returning how many were removed.
    pub fn remove_by_rank(&mut self, start: usize, stop: usize) -> usize {
        let victims: Vec<(FloatOrd<f64>, Bytes)> = self
            .order
            .keys()
            .skip(start)
            .take(stop.saturating_sub(start) + 1)
            .cloned()
            .collect();
        for (score, member) in &victims {
            self.scores.remove(member);
            self.order.remove(&(*score, member.clone()));
        }
        victims.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_then_update() {
        let mut set = SortedSet::new();
        assert_eq!(set.insert(1.0, "a".into()), InsertResult::Inserted);
        assert_eq!(set.insert(2.0, "a".into()), InsertResult::Updated);
        assert_eq!(set.score(&"a".into()), Some(2.0));
    }

    #[test]
    fn rank_is_ascending_by_score() {
        let mut set = SortedSet::new();
        set.insert(3.0, "c".into());
        set.insert(1.0, "a".into());
        set.insert(2.0, "b".into());
        assert_eq!(set.rank(&"a".into()), Some(0));
        assert_eq!(set.rank(&"b".into()), Some(1));
        assert_eq!(set.rank(&"c".into()), Some(2));
    }

    #[test]
    fn incr_adds_to_existing_score() {
        let mut set = SortedSet::new();
        set.insert(1.0, "a".into());
        assert_eq!(set.incr("a".into(), 4.5), 5.5);
    }

    #[test]
    fn remove_by_score_range() {
        let mut set = SortedSet::new();
        set.insert(1.0, "a".into());
        set.insert(2.0, "b".into());
        set.insert(3.0, "c".into());
        let removed = set.remove_by_score(Bound::Included(1.0), Bound::Included(2.0));
        assert_eq!(removed, 2);
        assert_eq!(set.len(), 1);
    }
}
