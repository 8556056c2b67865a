use std::fmt::{Display, Error, Formatter};

use fsmkit_util::HostType;
use serde::Serialize;

/// A single alphabet symbol.
///
/// Keys are plain signed integers wide enough for every host type, comparisons
/// follow integer ordering. Condition keys allocated above the alphabet use the
/// same representation once a machine is flattened.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Key(i64);

impl Key {
    pub const fn new(value: i64) -> Key {
        Key(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn inc(self) -> Key {
        Key(self.0 + 1)
    }

    pub fn dec(self) -> Key {
        Key(self.0 - 1)
    }

    pub fn is_upper(self) -> bool {
        (b'A' as i64..=b'Z' as i64).contains(&self.0)
    }

    pub fn is_lower(self) -> bool {
        (b'a' as i64..=b'z' as i64).contains(&self.0)
    }

    pub fn to_upper(self) -> Key {
        if self.is_lower() { Key(self.0 - 32) } else { self }
    }

    pub fn to_lower(self) -> Key {
        if self.is_upper() { Key(self.0 + 32) } else { self }
    }
}

impl From<u8> for Key {
    fn from(value: u8) -> Self {
        Key(value as i64)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key(value)
    }
}

impl From<char> for Key {
    fn from(value: char) -> Self {
        Key(value as i64)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match u8::try_from(self.0) {
            Ok(ch) if ch.is_ascii_graphic() => write!(f, "'{}'", ch as char),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Alphabet bounds derived from the host type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyOps {
    pub min_key: Key,
    pub max_key: Key,
    pub host: HostType,
}

impl KeyOps {
    pub fn new(host: HostType) -> KeyOps {
        KeyOps {
            min_key: Key(host.min_val()),
            max_key: Key(host.max_val()),
            host,
        }
    }

    pub fn alph_size(&self) -> u64 {
        self.host.alph_size()
    }

    pub fn contains(&self, key: Key) -> bool {
        self.min_key <= key && key <= self.max_key
    }

    /// Number of keys in the closed range `low..=high`.
    pub fn span(&self, low: Key, high: Key) -> u64 {
        (high.0 as i128 - low.0 as i128 + 1) as u64
    }
}

impl Default for KeyOps {
    fn default() -> Self {
        KeyOps::new(HostType::UChar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_folding() {
        assert_eq!(Key::from(b'a').to_upper(), Key::from(b'A'));
        assert_eq!(Key::from(b'Q').to_lower(), Key::from(b'q'));
        assert_eq!(Key::from(b'1').to_upper(), Key::from(b'1'));
        assert!(!Key::from(b'[').is_upper());
    }

    #[test]
    fn ops_bounds() {
        let ops = KeyOps::new(HostType::Char);
        assert_eq!(ops.min_key, Key::new(-128));
        assert_eq!(ops.max_key, Key::new(127));
        assert!(ops.contains(Key::new(0)));
        assert!(!ops.contains(Key::new(200)));
        assert_eq!(ops.span(ops.min_key, ops.max_key), 256);
    }

    #[test]
    fn display() {
        assert_eq!(Key::from(b'x').to_string(), "'x'");
        assert_eq!(Key::new(-3).to_string(), "-3");
    }
}
