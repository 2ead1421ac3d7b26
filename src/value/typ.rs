//! # Value type tag
use crate::value::Value;
use strum_macros::{Display, EnumString};

/// The five value kinds the keyspace can hold.
#[derive(EnumString, Display, Debug, PartialEq, Eq, Copy, Clone)]
pub enum ValueTyp {
    /// String (raw bytes or boxed integer).
    #[strum(serialize = "string", ascii_case_insensitive)]
    String,
    /// List.
    #[strum(serialize = "list", ascii_case_insensitive)]
    List,
    /// Set.
    #[strum(serialize = "set", ascii_case_insensitive)]
    Set,
    /// Hash.
    #[strum(serialize = "hash", ascii_case_insensitive)]
    Hash,
    /// Sorted set.
    #[strum(serialize = "zset", ascii_case_insensitive)]
    SortedSet,
}

impl Value {
    /// The value's type tag, as reported by the `type` command.
    pub fn typ(&self) -> ValueTyp {
        match self {
            Value::Str(_) => ValueTyp::String,
            Value::List(_) => ValueTyp::List,
            Value::Set(_) => ValueTyp::Set,
            Value::Hash(_) => ValueTyp::Hash,
            Value::SortedSet(_) => ValueTyp::SortedSet,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_display() {
        assert_eq!(ValueTyp::from_str("zset").unwrap(), ValueTyp::SortedSet);
        assert_eq!(ValueTyp::SortedSet.to_string(), "zset");
    }
}
