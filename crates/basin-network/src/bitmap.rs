//! Fixed-length bit-vector of allocated host offsets.
//!
//! On disk a bitmap is a string of `'0'` and `'1'` characters, one per
//! offset, so existing allocation tables stay readable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use basin_common::error::{BasinError, Result};

const WORD_BITS: usize = u64::BITS as usize;

/// One bit per host offset of a subnet; a set bit is an allocated address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AllocationBitmap {
    words: Vec<u64>,
    len: usize,
}

impl AllocationBitmap {
    /// A bitmap of `len` clear bits.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Number of bits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length bitmap.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of bit `index`, `None` when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0)
    }

    /// Sets bit `index` to `value`, returning its previous value, or `None`
    /// when out of range.
    pub fn set(&mut self, index: usize, value: bool) -> Option<bool> {
        let previous = self.get(index)?;
        let word = &mut self.words[index / WORD_BITS];
        let bit = 1 << (index % WORD_BITS);
        if value {
            *word |= bit;
        } else {
            *word &= !bit;
        }
        Some(previous)
    }

    /// Lowest clear bit.
    #[must_use]
    pub fn first_clear(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(i, word)| i * WORD_BITS + word.trailing_ones() as usize)
            .filter(|index| *index < self.len)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl fmt::Display for AllocationBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in 0..self.len {
            let c = if self.get(index) == Some(true) { '1' } else { '0' };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

impl FromStr for AllocationBitmap {
    type Err = BasinError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bitmap = Self::zeroed(s.len());
        for (index, c) in s.chars().enumerate() {
            match c {
                '0' => {}
                '1' => {
                    let _ = bitmap.set(index, true);
                }
                other => {
                    return Err(BasinError::config(format!(
                        "invalid character '{other}' in allocation bitmap"
                    )));
                }
            }
        }
        Ok(bitmap)
    }
}

impl TryFrom<String> for AllocationBitmap {
    type Error = BasinError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AllocationBitmap> for String {
    fn from(value: AllocationBitmap) -> Self {
        value.to_string()
    }
}
