use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

const MIN_NAME: &str = "[MIN_NAME]";
const MAX_NAME: &str = "[MAX_NAME]";
const PRIORITY_NAME: &str = ".priority";

#[derive(Clone, PartialEq, Eq, Hash)]
enum KeyKind {
    Min,
    Int(i32, Arc<str>),
    Priority,
    Name(Arc<str>),
    Max,
}

/// Name of a child inside a node.
///
/// Keys order as: the minimum sentinel, the `.priority` key, integer-like keys
/// (numerically, shorter spelling first, then by spelling), every other key
/// lexicographically, then the maximum sentinel.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChildKey(KeyKind);

impl ChildKey {
    pub fn new(name: &str) -> Self {
        let kind = match name {
            MIN_NAME => KeyKind::Min,
            MAX_NAME => KeyKind::Max,
            PRIORITY_NAME => KeyKind::Priority,
            other => match parse_int_key(other) {
                Some(value) => KeyKind::Int(value, Arc::from(other)),
                None => KeyKind::Name(Arc::from(other)),
            },
        };
        Self(kind)
    }

    pub fn min() -> Self {
        Self(KeyKind::Min)
    }

    pub fn max() -> Self {
        Self(KeyKind::Max)
    }

    pub fn priority() -> Self {
        Self(KeyKind::Priority)
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            KeyKind::Min => MIN_NAME,
            KeyKind::Max => MAX_NAME,
            KeyKind::Priority => PRIORITY_NAME,
            KeyKind::Int(_, name) | KeyKind::Name(name) => name,
        }
    }

    pub fn int_value(&self) -> Option<i32> {
        match self.0 {
            KeyKind::Int(value, _) => Some(value),
            _ => None,
        }
    }

    pub fn is_priority_key(&self) -> bool {
        matches!(self.0, KeyKind::Priority)
    }

    pub fn is_min(&self) -> bool {
        matches!(self.0, KeyKind::Min)
    }

    pub fn is_max(&self) -> bool {
        matches!(self.0, KeyKind::Max)
    }

    fn rank(&self) -> u8 {
        match self.0 {
            KeyKind::Min => 0,
            KeyKind::Priority => 1,
            KeyKind::Int(..) => 2,
            KeyKind::Name(_) => 3,
            KeyKind::Max => 4,
        }
    }
}

/// Interprets `name` as a 32-bit integer: an optional `-`, digits only, at most
/// 11 characters. Leading zeros are accepted.
fn parse_int_key(name: &str) -> Option<i32> {
    if name.is_empty() || name.len() > 11 {
        return None;
    }
    let digits = name.strip_prefix('-').unwrap_or(name);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude: i64 = digits
        .bytes()
        .fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'));
    let value = if name.starts_with('-') {
        -magnitude
    } else {
        magnitude
    };
    i32::try_from(value).ok()
}

impl Ord for ChildKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (KeyKind::Int(left, left_name), KeyKind::Int(right, right_name)) => left
                .cmp(right)
                .then_with(|| left_name.len().cmp(&right_name.len()))
                .then_with(|| left_name.cmp(right_name)),
            (KeyKind::Name(left), KeyKind::Name(right)) => left.cmp(right),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ChildKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChildKey(\"{}\")", self.as_str())
    }
}

impl From<&str> for ChildKey {
    fn from(name: &str) -> Self {
        ChildKey::new(name)
    }
}

impl From<String> for ChildKey {
    fn from(name: String) -> Self {
        ChildKey::new(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut keys: Vec<ChildKey> = names.iter().map(|name| ChildKey::new(name)).collect();
        keys.sort();
        keys.iter().map(|key| key.as_str().to_string()).collect()
    }

    #[test]
    fn integer_keys_sort_numerically_before_strings() {
        assert_eq!(
            sorted(&["b", "10", "a", "-5", "2", ".priority", "007", "7"]),
            vec![".priority", "-5", "2", "7", "007", "10", "a", "b"]
        );
    }

    #[test]
    fn sentinels_bound_every_key() {
        let keys = ["", "0", "zzz", ".priority", "-2147483648"];
        for name in keys {
            let key = ChildKey::new(name);
            assert!(ChildKey::min() < key, "{name}");
            assert!(key < ChildKey::max(), "{name}");
        }
        assert_eq!(ChildKey::new("[MIN_NAME]"), ChildKey::min());
        assert!(ChildKey::new(".priority").is_priority_key());
    }

    #[test]
    fn integer_parsing_limits() {
        assert_eq!(ChildKey::new("2147483647").int_value(), Some(i32::MAX));
        assert_eq!(ChildKey::new("-2147483648").int_value(), Some(i32::MIN));
        assert_eq!(ChildKey::new("2147483648").int_value(), None);
        assert_eq!(ChildKey::new("-").int_value(), None);
        assert_eq!(ChildKey::new("1a").int_value(), None);
        assert_eq!(ChildKey::new("000000000001").int_value(), None);
        assert_eq!(ChildKey::new("00001").int_value(), Some(1));
    }

    #[test]
    fn out_of_range_numbers_sort_as_strings() {
        assert_eq!(sorted(&["99999999999", "1", "a"]), vec!["1", "99999999999", "a"]);
        assert!(ChildKey::new("99999999999") > ChildKey::new(".priority"));
    }

    #[test]
    fn equal_integers_with_same_spelling_length_stay_distinct() {
        let zero = ChildKey::new("00");
        let negative_zero = ChildKey::new("-0");
        assert_ne!(zero, negative_zero);
        assert_ne!(zero.cmp(&negative_zero), Ordering::Equal);
        assert_eq!(sorted(&["00", "-0", "0"]), vec!["0", "-0", "00"]);
        assert_eq!(ChildKey::new("000").cmp(&ChildKey::new("000")), Ordering::Equal);
    }
}
