//! Condition codes gating instruction execution on the ALU's latched flags.

use serde::{Deserialize, Serialize};
use crate::isa::DecodeError;

/// A 4-bit execution predicate.
///
/// `Eq` and `Ne` have an encoding but no flag mapping; evaluating them
/// fails with [`DecodeError::UnmappedCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Condition {
    /// Always execute
    #[default]
    Always,
    /// Equal (reserved)
    Eq,
    /// Not equal (reserved)
    Ne,
    /// Overflow set
    Of,
    /// Overflow clear
    No,
    /// Zero set
    Zr,
    /// Zero clear
    Nz,
    /// Negative set
    Ng,
    /// Negative clear
    Nn,
}

impl Condition {
    /// All conditions in table order.
    pub const ALL: [Condition; 9] = [
        Condition::Always,
        Condition::Eq,
        Condition::Ne,
        Condition::Of,
        Condition::No,
        Condition::Zr,
        Condition::Nz,
        Condition::Ng,
        Condition::Nn,
    ];

    /// The 4-bit encoding.
    pub const fn code(self) -> u8 {
        match self {
            Condition::Always => 0,
            Condition::Eq => 1,
            Condition::Ne => 2,
            Condition::Of => 3,
            Condition::No => 4,
            Condition::Zr => 5,
            Condition::Nz => 6,
            Condition::Ng => 7,
            Condition::Nn => 8,
        }
    }

    /// Look up a condition by its 4-bit encoding.
    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(DecodeError::UnknownCondition(code))
    }

    /// Two-letter mnemonic suffix; empty for `Always`.
    pub const fn suffix(self) -> &'static str {
        match self {
            Condition::Always => "",
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Of => "OF",
            Condition::No => "NO",
            Condition::Zr => "ZR",
            Condition::Nz => "NZ",
            Condition::Ng => "NG",
            Condition::Nn => "NN",
        }
    }

    /// Parse an (uppercase) two-letter suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|c| *c != Condition::Always)
            .find(|c| c.suffix() == suffix)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Always => f.write_str("ALWAYS"),
            other => f.write_str(other.suffix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for c in Condition::ALL {
            assert_eq!(Condition::from_code(c.code()).unwrap(), c);
        }
    }

    #[test]
    fn test_unknown_condition() {
        for code in 9..16 {
            assert!(matches!(
                Condition::from_code(code),
                Err(DecodeError::UnknownCondition(c)) if c == code
            ));
        }
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Condition::from_suffix("ZR"), Some(Condition::Zr));
        assert_eq!(Condition::from_suffix("NN"), Some(Condition::Nn));
        assert_eq!(Condition::from_suffix(""), None);
        assert_eq!(Condition::from_suffix("XX"), None);
        let count = Condition::ALL.iter().filter(|c| !c.suffix().is_empty()).count();
        assert_eq!(count, 8);
    }
}
