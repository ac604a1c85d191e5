//! Short image codes
//!
//! A code is five lowercase ASCII letters following the pattern
//! consonant, vowel, consonant, vowel, consonant. Codes are what clients
//! type into a URL, so the pattern favours pronounceable strings.

mod cursor;
mod keyspace;
mod packing;

pub use cursor::{AllocationCursor, KeyspaceError};
pub use keyspace::{enumerate_keyspace, generate_permutation, shuffle};
pub use packing::{decode, encode};

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Consonant alphabet, in enumeration order.
pub const CONSONANTS: &[u8; 20] = b"bcdfghjklmnpqrstvwxz";

/// Vowel alphabet, in enumeration order. `y` counts as a vowel.
pub const VOWELS: &[u8; 6] = b"aeiouy";

/// Number of characters in a code.
pub const CODE_LEN: usize = 5;

/// Total number of distinct codes: 20 * 6 * 20 * 6 * 20.
pub const KEYSPACE_SIZE: usize = 288_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("code must be exactly 5 characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid character {ch:?} at position {position}")]
    InvalidCharacter { position: usize, ch: char },
}

/// A validated short code such as `bakul`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "bakul")]
pub struct Code(String);

impl Code {
    /// Parse and validate a code. Matching is case-sensitive.
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        let len = s.chars().count();
        if len != CODE_LEN {
            return Err(CodeError::InvalidLength(len));
        }

        for (position, ch) in s.chars().enumerate() {
            if !ch.is_ascii() || !alphabet_for(position).contains(&(ch as u8)) {
                return Err(CodeError::InvalidCharacter { position, ch });
            }
        }

        Ok(Code(s.to_string()))
    }

    /// Cheap pattern check without allocating.
    pub fn is_valid(s: &str) -> bool {
        let bytes = s.as_bytes();
        bytes.len() == CODE_LEN
            && bytes
                .iter()
                .enumerate()
                .all(|(position, byte)| alphabet_for(position).contains(byte))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Built by the packing decoder, which only ever sees encoded codes.
    pub(crate) fn from_decoded(s: String) -> Self {
        Code(s)
    }
}

/// Alphabet allowed at a given position of a code.
pub(crate) fn alphabet_for(position: usize) -> &'static [u8] {
    if position % 2 == 0 {
        CONSONANTS
    } else {
        VOWELS
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for Code {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Code::parse(s)
    }
}

impl TryFrom<String> for Code {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Code::parse(&value)
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.0
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
