//! Listing-side types: cursor positions, stubs, and parsed pages.

use serde::{Deserialize, Serialize};

/// Position in an opaque-cursor pagination sequence.
///
/// The token is whatever the listing source embeds in its "next"
/// control; nothing here interprets it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Continuation token; `None` on the first page
    pub token: Option<String>,
    /// Zero-based page index
    pub index: usize,
}

impl Cursor {
    /// The initial position: no token, page zero.
    pub fn start() -> Self {
        Self {
            token: None,
            index: 0,
        }
    }

    /// The position after this page, continuing at `token`.
    pub fn advance(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            index: self.index + 1,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

/// A profile discovered on a listing page, pending its detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStub {
    /// Stable identity key; duplicates collapse on this
    pub profile_id: String,
    /// Display name as listed
    pub name: String,
    /// Absolute URL of the detail page
    pub detail_url: String,
}

impl ProfileStub {
    pub fn new(
        profile_id: impl Into<String>,
        name: impl Into<String>,
        detail_url: impl Into<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            name: name.into(),
            detail_url: detail_url.into(),
        }
    }
}

/// One parsed listing page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Profiles found on the page, listing order preserved
    pub stubs: Vec<ProfileStub>,
    /// Continuation token for the next page, if the source advertised one
    pub next_token: Option<String>,
    /// Zero-based index of this page within the walk
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_starts_without_token() {
        let cursor = Cursor::start();
        assert_eq!(cursor.token, None);
        assert_eq!(cursor.index, 0);
    }

    #[test]
    fn cursor_advance_increments_index() {
        let cursor = Cursor::start().advance("abc").advance("def");
        assert_eq!(cursor.token.as_deref(), Some("def"));
        assert_eq!(cursor.index, 2);
    }
}
