//! Identifier normalization
//!
//! Raw user input ("+1 (555) 123-4567") is reduced to its decimal digits so that
//! every lookup for the same target uses the same key.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minimum number of digits a normalized identifier must contain
pub const MIN_DIGITS: usize = 10;

/// A normalized lookup identifier: ASCII decimal digits only, at least
/// [`MIN_DIGITS`] long
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Strip every non-digit character and check the remaining length
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] when fewer than [`MIN_DIGITS`]
    /// digits remain.
    ///
    /// # Example
    ///
    /// ```
    /// use avatar_resolver::Identifier;
    ///
    /// let id = Identifier::normalize("+1 (555) 123-4567").unwrap();
    /// assert_eq!(id.as_str(), "15551234567");
    /// assert!(Identifier::normalize("12-34").is_err());
    /// ```
    pub fn normalize(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        if digits.len() < MIN_DIGITS {
            return Err(Error::InvalidIdentifier {
                digits: digits.len(),
                minimum: MIN_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    /// Get the digits as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
