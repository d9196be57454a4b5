//! # Sequential Codes
//!
//! Human-facing display codes for catalog entries.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scope         Prefix   Padding   First code   First numeric id        │
//! │  ───────────   ──────   ───────   ──────────   ────────────────        │
//! │  Product       P-       none      P-10001      10000                   │
//! │  OtopProduct   SP-      4         SP-0001      10000                   │
//! │                                                                         │
//! │  next = max(parsed suffix over the scope) + 1                          │
//! │  unparseable suffix ──► counts as 1                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module only does the arithmetic. Serializing concurrent creations
//! is the job of the unit of work that inserts the row (the codes are
//! `UNIQUE`, a collision is retried).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// First numeric id handed out in an empty catalog table.
pub const FIRST_PRODUCT_ID: i64 = 10000;

/// Numbering scope of a catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SequenceScope {
    Product,
    OtopProduct,
}

impl SequenceScope {
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceScope::Product => "P-",
            SequenceScope::OtopProduct => "SP-",
        }
    }

    /// Zero-padding width of the numeric part.
    pub fn width(&self) -> usize {
        match self {
            SequenceScope::Product => 0,
            SequenceScope::OtopProduct => 4,
        }
    }

    /// Number used when the scope has no rows yet.
    pub fn seed(&self) -> u64 {
        match self {
            SequenceScope::Product => 10001,
            SequenceScope::OtopProduct => 1,
        }
    }

    /// Renders a code for `n`.
    ///
    /// ```rust
    /// use otop_core::sequence::SequenceScope;
    ///
    /// assert_eq!(SequenceScope::OtopProduct.format(7), "SP-0007");
    /// assert_eq!(SequenceScope::Product.format(10001), "P-10001");
    /// ```
    pub fn format(&self, n: u64) -> String {
        format!("{}{:0width$}", self.prefix(), n, width = self.width())
    }

    /// Parses the numeric suffix of a stored code.
    ///
    /// The suffix is whatever follows the last `-`. Codes whose suffix is
    /// empty or not all digits parse as 1.
    pub fn parse(&self, code: &str) -> u64 {
        let suffix = code
            .strip_prefix(self.prefix())
            .or_else(|| code.rsplit_once('-').map(|(_, s)| s))
            .unwrap_or(code)
            .trim();

        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return 1;
        }
        suffix.parse().unwrap_or(1)
    }

    /// Computes the next code from every code currently stored in the scope.
    pub fn next_code<'a, I>(&self, existing: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let next = existing
            .into_iter()
            .map(|code| self.parse(code))
            .max()
            .map(|max| max + 1)
            .unwrap_or_else(|| self.seed());
        self.format(next)
    }
}

/// Next numeric id: `MAX(id) + 1`, or [`FIRST_PRODUCT_ID`] for an empty table.
pub fn next_product_id(max_id: Option<i64>) -> i64 {
    match max_id {
        Some(max) if max >= FIRST_PRODUCT_ID => max + 1,
        _ => FIRST_PRODUCT_ID,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
