use std::fmt::{Display, Error, Formatter};
use std::iter::FusedIterator;

/// Integer types an alphabet can be declared with.
///
/// The alphabet of a machine is the full value range of its host type, condition
/// keys are allocated above it, up to the maximum of the next wider type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
}

impl HostType {
    pub fn name(&self) -> &'static str {
        match self {
            HostType::Char => "char",
            HostType::UChar => "unsigned char",
            HostType::Short => "short",
            HostType::UShort => "unsigned short",
            HostType::Int => "int",
            HostType::UInt => "unsigned int",
            HostType::Long => "long",
        }
    }

    pub fn from_name(name: &str) -> Option<HostType> {
        let res = match name {
            "char" | "i8" => HostType::Char,
            "unsigned char" | "uchar" | "u8" => HostType::UChar,
            "short" | "i16" => HostType::Short,
            "unsigned short" | "ushort" | "u16" => HostType::UShort,
            "int" | "i32" => HostType::Int,
            "unsigned int" | "uint" | "u32" => HostType::UInt,
            "long" | "i64" => HostType::Long,
            _ => return None,
        };
        Some(res)
    }

    pub fn min_val(&self) -> i64 {
        match self {
            HostType::Char => i8::MIN as i64,
            HostType::Short => i16::MIN as i64,
            HostType::Int => i32::MIN as i64,
            HostType::Long => i64::MIN,
            HostType::UChar | HostType::UShort | HostType::UInt => 0,
        }
    }

    pub fn max_val(&self) -> i64 {
        match self {
            HostType::Char => i8::MAX as i64,
            HostType::UChar => u8::MAX as i64,
            HostType::Short => i16::MAX as i64,
            HostType::UShort => u16::MAX as i64,
            HostType::Int => i32::MAX as i64,
            HostType::UInt => u32::MAX as i64,
            HostType::Long => i64::MAX,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        match self {
            HostType::Char | HostType::UChar => 1,
            HostType::Short | HostType::UShort => 2,
            HostType::Int | HostType::UInt => 4,
            HostType::Long => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.min_val() < 0
    }

    /// The type condition keys spill into.
    pub fn wider(&self) -> HostType {
        match self {
            HostType::Char => HostType::Short,
            HostType::UChar => HostType::UShort,
            HostType::Short => HostType::Int,
            HostType::UShort => HostType::UInt,
            HostType::Int | HostType::UInt | HostType::Long => HostType::Long,
        }
    }

    /// Largest key a condition space can be allocated up to.
    pub fn cond_key_limit(&self) -> i64 {
        self.wider().max_val()
    }

    /// Number of values of the type, saturated for `Long`.
    pub fn alph_size(&self) -> u64 {
        let span = self.max_val() as i128 - self.min_val() as i128 + 1;
        if span > u64::MAX as i128 {
            u64::MAX
        } else {
            span as u64
        }
    }

    pub fn enumerate(&self) -> KeyIter {
        KeyIter::new(self.min_val(), self.max_val())
    }
}

impl Display for HostType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(self.name())
    }
}

/// Inclusive iterator over a range of key values.
#[derive(Clone, Debug)]
pub struct KeyIter {
    next: i64,
    last: i64,
    done: bool,
}

impl KeyIter {
    pub fn new(from: i64, to: i64) -> Self {
        KeyIter {
            next: from,
            last: to,
            done: from > to,
        }
    }

    fn remaining(&self) -> usize {
        if self.done {
            0
        } else {
            (self.last as i128 - self.next as i128 + 1) as usize
        }
    }
}

impl Iterator for KeyIter {
    type Item = i64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let x = self.next;
        if x == self.last {
            self.done = true;
        } else {
            self.next += 1;
        }
        Some(x)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.remaining();
        (size, Some(size))
    }
}

impl FusedIterator for KeyIter {}

impl ExactSizeIterator for KeyIter {
    fn len(&self) -> usize {
        self.remaining()
    }
}
