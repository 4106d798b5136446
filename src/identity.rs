use std::fmt;

/// The key of an item within one collection.
///
/// Integer and string identities never compare equal, so `42` and `"42"` are different items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    Int(i64),
    Str(String),
}

impl Identity {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Identity::Int(i) => Some(*i),
            Identity::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Identity::Int(_) => None,
            Identity::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Int(i) => write!(f, "{i}"),
            Identity::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Int(value)
    }
}

impl From<i32> for Identity {
    fn from(value: i32) -> Self {
        Identity::Int(value.into())
    }
}

impl From<u32> for Identity {
    fn from(value: u32) -> Self {
        Identity::Int(value.into())
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Str(value.to_owned())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Str(value)
    }
}

/// Something that can live in a collection.
pub trait Identifiable {
    fn id(&self) -> Identity;
}

/// A collection of some kind, answering point lookups without blocking.
pub trait Collected<V> {
    /// The item for `id` if it is available right now
    fn get(&self, id: &Identity) -> Option<V>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_int_and_str_are_distinct() {
        assert_ne!(Identity::from(42), Identity::from("42"));
        assert_eq!(Identity::from(42), Identity::Int(42));
        assert_eq!(Identity::from(String::from("42")), Identity::from("42"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Identity::from(7).to_string(), "7");
        assert_eq!(Identity::from("book-7").to_string(), "book-7");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Identity::from(3).as_int(), Some(3));
        assert_eq!(Identity::from(3).as_str(), None);
        assert_eq!(Identity::from("x").as_str(), Some("x"));
    }
}
