//! # Value object
//!
//! The tagged union stored behind every key: a string, list, set, hash, or
//! sorted set, each tracked with a one-way encoding promotion from a compact
//! representation to a general one. The LRU stamp sampled eviction scores
//! against lives alongside the value in [`crate::db::StoredValue`], not here.
//!
//! Small non-negative integer strings are served from a process-lifetime
//! shared pool instead of each key owning its own buffer; [`Value::refcount`]
//! reports how many live clones of a pooled object exist.
pub mod sorted_set;
pub mod typ;

use crate::config::EngineConfig;
use crate::error::Error;
use bytes::Bytes;
use sorted_set::SortedSet;
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Size of the shared pool of small non-negative integer-encoded strings
/// (`N` in spec terms; real Redis uses 10 000).
const SHARED_INT_POOL_SIZE: i64 = 10_000;

/// The process-lifetime pool of shared integer-string objects. Built once
/// and never torn down, so every pooled object's refcount is ≥ 1 forever by
/// construction: the pool itself holds a permanent handle.
fn shared_int_pool() -> &'static [Arc<Bytes>] {
    static POOL: OnceLock<Vec<Arc<Bytes>>> = OnceLock::new();
    POOL.get_or_init(|| (0..SHARED_INT_POOL_SIZE).map(|n| Arc::new(Bytes::from(n.to_string()))).collect())
}

/// A string value: either a raw byte buffer, a boxed integer, or (for small
/// non-negative integers) a clone of a shared pooled object.
#[derive(Debug, Clone)]
pub enum StrValue {
    /// Integer in `0..SHARED_INT_POOL_SIZE`, sharing the pool's allocation.
    SharedInt(Arc<Bytes>),
    /// Integer-encoded string outside the shared pool's range.
    Int(i64),
    /// Raw byte buffer.
    Raw(Bytes),
}

impl PartialEq for StrValue {
    /// Two string values are equal iff their byte content is equal,
    /// regardless of which encoding produced them.
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl StrValue {
    /// Builds a string value, promoting to the integer encoding when the
    /// bytes parse as one, mirroring `tryObjectEncoding`'s opportunistic
    /// conversion on every string write path. A small non-negative integer
    /// is served from the shared pool instead of allocating its own buffer.
    pub fn new(bytes: Bytes) -> Self {
        Self::try_int_encoding(bytes)
    }

    fn try_int_encoding(bytes: Bytes) -> Self {
        match std::str::from_utf8(&bytes).ok().and_then(|s| {
            // Reject leading zeroes / "+1" so the int encoding only ever
            // round-trips to the exact original bytes.
            if s.len() > 1 && (s.starts_with('0') || s.starts_with("-0")) {
                None
            } else {
                s.parse::<i64>().ok()
            }
        }) {
            Some(n) if (0..SHARED_INT_POOL_SIZE).contains(&n) => {
                Self::SharedInt(shared_int_pool()[n as usize].clone())
            }
            Some(n) => Self::Int(n),
            None => Self::Raw(bytes),
        }
    }

    /// The string's byte content.
    pub fn as_bytes(&self) -> Bytes {
        match self {
            Self::SharedInt(b) => (**b).clone(),
            Self::Int(n) => Bytes::from(n.to_string()),
            Self::Raw(b) => b.clone(),
        }
    }

    /// Byte length of the string's content.
    pub fn len(&self) -> usize {
        match self {
            Self::SharedInt(b) => b.len(),
            Self::Int(n) => n.to_string().len(),
            Self::Raw(b) => b.len(),
        }
    }

    /// Whether the string is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value's live reference count: for a shared integer, how many
    /// clones of the pooled object are currently alive (always ≥ 1, since
    /// the pool holds a permanent handle); `1` for anything else, which is
    /// owned outright by its container.
    pub fn refcount(&self) -> usize {
        match self {
            Self::SharedInt(b) => Arc::strong_count(b),
            Self::Int(_) | Self::Raw(_) => 1,
        }
    }

    fn encoding_name(&self) -> &'static str {
        match self {
            Self::SharedInt(_) | Self::Int(_) => "int",
            Self::Raw(b) if b.len() <= 44 => "embstr",
            Self::Raw(_) => "raw",
        }
    }
}

/// A list value: an ordered sequence of byte strings.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ListValue {
    items: VecDeque<Bytes>,
    promoted: bool,
}

impl ListValue {
    fn check_promote(&mut self, cfg: &EngineConfig) {
        if self.promoted {
            return;
        }
        if self.items.len() > cfg.list_max_entries
            || self.items.iter().any(|v| v.len() > cfg.list_max_value)
        {
            self.promoted = true;
        }
    }

    fn encoding_name(&self) -> &'static str {
        if self.promoted {
            "linkedlist"
        } else {
            "ziplist"
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Underlying item sequence.
    pub fn items(&self) -> &VecDeque<Bytes> {
        &self.items
    }

    /// Mutable access to the underlying item sequence.
    pub fn items_mut(&mut self) -> &mut VecDeque<Bytes> {
        &mut self.items
    }

    /// Re-evaluates the packed/general encoding threshold after a mutation
    /// made directly through [`Self::items_mut`] (`linsert`, `lset`,
    /// `lrem`, `ltrim`), which bypasses [`Self::push`]'s own check.
    pub fn recheck_promotion(&mut self, cfg: &EngineConfig) {
        self.check_promote(cfg);
    }

    /// Pushes `values` onto the requested end, up to `cap` total elements.
    /// Returns the number actually pushed.
    pub fn push(&mut self, front: bool, values: impl Iterator<Item = Bytes>, cap: usize, cfg: &EngineConfig) -> usize {
        let mut pushed = 0;
        for v in values {
            if self.items.len() >= cap {
                break;
            }
            if front {
                self.items.push_front(v);
            } else {
                self.items.push_back(v);
            }
            pushed += 1;
        }
        self.check_promote(cfg);
        pushed
    }
}

/// A set value: either a compact ascending integer set or a general set of
/// byte strings. Converts to the general encoding the moment a non-integer
/// member is added, or the compact entry cap is exceeded.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct SetValue {
    items: HashSet<Bytes>,
    promoted: bool,
}

impl SetValue {
    fn is_all_integers(&self) -> bool {
        self.items
            .iter()
            .all(|v| std::str::from_utf8(v).ok().and_then(|s| s.parse::<i64>().ok()).is_some())
    }

    fn check_promote(&mut self, cfg: &EngineConfig) {
        if self.promoted {
            return;
        }
        if self.items.len() > cfg.set_max_intset_entries || !self.is_all_integers() {
            self.promoted = true;
        }
    }

    fn encoding_name(&self) -> &'static str {
        if self.promoted {
            "hashtable"
        } else {
            "intset"
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `member` is present.
    pub fn contains(&self, member: &Bytes) -> bool {
        self.items.contains(member)
    }

    /// All members, in unspecified order.
    pub fn members(&self) -> &HashSet<Bytes> {
        &self.items
    }

    /// Inserts `member`, returning whether it was new.
    pub fn insert(&mut self, member: Bytes, cfg: &EngineConfig) -> bool {
        let inserted = self.items.insert(member);
        self.check_promote(cfg);
        inserted
    }

    /// Removes `member`, returning whether it was present.
    pub fn remove(&mut self, member: &Bytes) -> bool {
        self.items.remove(member)
    }
}

/// A hash value: field/value pairs.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct HashValue {
    fields: HashMap<Bytes, Bytes>,
    promoted: bool,
}

impl HashValue {
    fn check_promote(&mut self, cfg: &EngineConfig) {
        if self.promoted {
            return;
        }
        if self.fields.len() > cfg.hash_max_entries
            || self
                .fields
                .iter()
                .any(|(k, v)| k.len() > cfg.hash_max_value || v.len() > cfg.hash_max_value)
        {
            self.promoted = true;
        }
    }

    fn encoding_name(&self) -> &'static str {
        if self.promoted {
            "hashtable"
        } else {
            "listpack"
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the hash has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Underlying field map.
    pub fn fields(&self) -> &HashMap<Bytes, Bytes> {
        &self.fields
    }

    /// Sets `field` to `value`, returning the previous value if any.
    pub fn set(&mut self, field: Bytes, value: Bytes, cfg: &EngineConfig) -> Option<Bytes> {
        let prev = self.fields.insert(field, value);
        self.check_promote(cfg);
        prev
    }

    /// Removes `field`, returning its previous value if any.
    pub fn remove(&mut self, field: &Bytes) -> Option<Bytes> {
        self.fields.remove(field)
    }
}

/// A sorted-set value.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct SortedSetValue {
    set: SortedSet,
    promoted: bool,
}

impl SortedSetValue {
    fn check_promote(&mut self, cfg: &EngineConfig) {
        if self.promoted {
            return;
        }
        if self.set.len() > cfg.zset_max_entries
            || self
                .set
                .members_ascending()
                .iter()
                .any(|(m, _)| m.len() > cfg.zset_max_value)
        {
            self.promoted = true;
        }
    }

    fn encoding_name(&self) -> &'static str {
        if self.promoted {
            "skiplist"
        } else {
            "listpack"
        }
    }

    /// Access to the underlying sorted set.
    pub fn set(&self) -> &SortedSet {
        &self.set
    }

    /// Mutable access to the underlying sorted set, updating the promotion
    /// state afterwards.
    pub fn set_mut(&mut self, cfg: &EngineConfig) -> &mut SortedSet {
        self.check_promote(cfg);
        &mut self.set
    }

    /// Runs `f` against the underlying set and re-checks promotion.
    pub fn with_mut<T>(&mut self, cfg: &EngineConfig, f: impl FnOnce(&mut SortedSet) -> T) -> T {
        let r = f(&mut self.set);
        self.check_promote(cfg);
        r
    }
}

/// Tagged value stored behind a key.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    /// String.
    Str(StrValue),
    /// List.
    List(ListValue),
    /// Set.
    Set(SetValue),
    /// Hash.
    Hash(HashValue),
    /// Sorted set.
    SortedSet(SortedSetValue),
}

impl Value {
    /// Builds a string value from raw bytes.
    pub fn string(bytes: Bytes) -> Self {
        Self::Str(StrValue::new(bytes))
    }

    /// An empty list value.
    pub fn list() -> Self {
        Self::List(ListValue::default())
    }

    /// An empty set value.
    pub fn set() -> Self {
        Self::Set(SetValue::default())
    }

    /// An empty hash value.
    pub fn hash() -> Self {
        Self::Hash(HashValue::default())
    }

    /// An empty sorted-set value.
    pub fn sorted_set() -> Self {
        Self::SortedSet(SortedSetValue::default())
    }

    /// The object's live reference count, mirroring `OBJECT REFCOUNT`.
    /// Always `1` except for a shared integer string, owned by the
    /// process-wide pool rather than by any single key.
    pub fn refcount(&self) -> usize {
        match self {
            Self::Str(s) => s.refcount(),
            Self::List(_) | Self::Set(_) | Self::Hash(_) | Self::SortedSet(_) => 1,
        }
    }

    /// The encoding name reported for introspection, mirroring
    /// `OBJECT ENCODING`'s `REDIS_ENCODING_*` strings.
    pub fn encoding_name(&self) -> &'static str {
        match self {
            Self::Str(s) => s.encoding_name(),
            Self::List(l) => l.encoding_name(),
            Self::Set(s) => s.encoding_name(),
            Self::Hash(h) => h.encoding_name(),
            Self::SortedSet(z) => z.encoding_name(),
        }
    }

    /// View as a string value.
    pub fn as_str(&self) -> Result<&StrValue, Error> {
        match self {
            Self::Str(s) => Ok(s),
            _ => Err(Error::WrongType),
        }
    }

    /// View as a list value.
    pub fn as_list(&self) -> Result<&ListValue, Error> {
        match self {
            Self::List(l) => Ok(l),
            _ => Err(Error::WrongType),
        }
    }

    /// Mutable view as a list value.
    pub fn as_list_mut(&mut self) -> Result<&mut ListValue, Error> {
        match self {
            Self::List(l) => Ok(l),
            _ => Err(Error::WrongType),
        }
    }

    /// View as a set value.
    pub fn as_set(&self) -> Result<&SetValue, Error> {
        match self {
            Self::Set(s) => Ok(s),
            _ => Err(Error::WrongType),
        }
    }

    /// Mutable view as a set value.
    pub fn as_set_mut(&mut self) -> Result<&mut SetValue, Error> {
        match self {
            Self::Set(s) => Ok(s),
            _ => Err(Error::WrongType),
        }
    }

    /// View as a hash value.
    pub fn as_hash(&self) -> Result<&HashValue, Error> {
        match self {
            Self::Hash(h) => Ok(h),
            _ => Err(Error::WrongType),
        }
    }

    /// Mutable view as a hash value.
    pub fn as_hash_mut(&mut self) -> Result<&mut HashValue, Error> {
        match self {
            Self::Hash(h) => Ok(h),
            _ => Err(Error::WrongType),
        }
    }

    /// Mutable view as a sorted-set value.
    pub fn as_sorted_set_mut(&mut self) -> Result<&mut SortedSetValue, Error> {
        match self {
            Self::SortedSet(z) => Ok(z),
            _ => Err(Error::WrongType),
        }
    }

    /// View as a sorted-set value.
    pub fn as_sorted_set(&self) -> Result<&SortedSetValue, Error> {
        match self {
            Self::SortedSet(z) => Ok(z),
            _ => Err(Error::WrongType),
        }
    }
}

/// Parses `bytes` as a number, mapping failure to [`Error::NotANumber`].
pub fn bytes_to_number<T: FromStr>(bytes: &[u8]) -> Result<T, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .ok_or(Error::NotANumber)
}

/// Parses `bytes` as an integer, mapping failure to [`Error::NotAnInteger`].
pub fn bytes_to_int(bytes: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(Error::NotAnInteger)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn string_promotes_to_int_encoding() {
        let v = StrValue::new(Bytes::from_static(b"123"));
        assert_eq!(v, StrValue::Int(123));
        assert_eq!(v.as_bytes(), Bytes::from_static(b"123"));
    }

    #[test]
    fn string_with_leading_zero_stays_raw() {
        let v = StrValue::new(Bytes::from_static(b"0123"));
        assert_eq!(v, StrValue::Raw(Bytes::from_static(b"0123")));
    }

    #[test]
    fn list_promotes_once_over_entry_cap() {
        let cfg = EngineConfig {
            list_max_entries: 2,
            ..EngineConfig::default()
        };
        let mut list = ListValue::default();
        list.push(false, vec![Bytes::from_static(b"a")].into_iter(), usize::MAX, &cfg);
        assert_eq!(list.encoding_name(), "ziplist");
        list.push(
            false,
            vec![Bytes::from_static(b"b"), Bytes::from_static(b"c")].into_iter(),
            usize::MAX,
            &cfg,
        );
        assert_eq!(list.encoding_name(), "linkedlist");
        // never demotes even if shrunk back down
        list.items_mut().pop_back();
        list.check_promote(&cfg);
        assert_eq!(list.encoding_name(), "linkedlist");
    }

    #[test]
    fn set_is_intset_until_a_non_integer_member_arrives() {
        let cfg = EngineConfig::default();
        let mut set = SetValue::default();
        set.insert(Bytes::from_static(b"1"), &cfg);
        set.insert(Bytes::from_static(b"2"), &cfg);
        assert_eq!(set.encoding_name(), "intset");
        set.insert(Bytes::from_static(b"not-a-number"), &cfg);
        assert_eq!(set.encoding_name(), "hashtable");
    }

    #[test]
    fn wrong_type_access_errors() {
        let v = Value::string(Bytes::from_static(b"x"));
        assert_eq!(v.as_list().unwrap_err(), Error::WrongType);
    }

    #[test]
    fn small_integers_share_the_pooled_object() {
        let a = Value::string(Bytes::from_static(b"42"));
        let b = Value::string(Bytes::from_static(b"42"));
        assert_eq!(a, b);
        // both clones hold a live reference on top of the pool's own.
        assert!(a.refcount() >= 3);
        drop(a);
        drop(b);
        // the pool's permanent handle keeps the object alive regardless.
        assert!(Value::string(Bytes::from_static(b"42")).refcount() >= 1);
    }

    #[test]
    fn large_integer_is_not_pooled() {
        let v = Value::string(Bytes::from_static(b"1000000"));
        assert_eq!(v.refcount(), 1);
    }

    #[test]
    fn raw_string_owns_its_own_buffer() {
        let v = Value::string(Bytes::from_static(b"not a number"));
        assert_eq!(v.refcount(), 1);
    }
}
