use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::view_model::SessionView;

/// Which listing of a user is crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Favorites,
    Gallery,
    Scraps,
}

impl ListingType {
    pub const ALL: [ListingType; 3] = [
        ListingType::Favorites,
        ListingType::Gallery,
        ListingType::Scraps,
    ];

    /// Path segment used by the site for this listing.
    pub fn path_segment(self) -> &'static str {
        match self {
            ListingType::Favorites => "favorites",
            ListingType::Gallery => "gallery",
            ListingType::Scraps => "scraps",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseListingError(pub String);

impl fmt::Display for ParseListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown listing type '{}' (expected favorites, gallery or scraps)",
            self.0
        )
    }
}

impl std::error::Error for ParseListingError {}

impl FromStr for ListingType {
    type Err = ParseListingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ListingType::ALL
            .into_iter()
            .find(|listing| listing.path_segment().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseListingError(wanted.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No download has been requested yet.
    #[default]
    Idle,
    Initializing,
    Scanning,
    Running,
    Cancelling,
    Cancelled,
    InvalidUser,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Initializing
                | SessionState::Scanning
                | SessionState::Running
                | SessionState::Cancelling
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Cancelled
                | SessionState::InvalidUser
                | SessionState::Completed
                | SessionState::Failed
        )
    }
}

/// A `current / total` counter as shown on a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSession {
    pub listing: ListingType,
    pub user: String,
    pub state: SessionState,
    pub pages: Progress,
    pub submissions: Progress,
    pub failure: Option<String>,
}

impl DownloadSession {
    pub(crate) fn new(user: String, listing: ListingType) -> Self {
        Self {
            listing,
            user,
            state: SessionState::Initializing,
            pages: Progress::default(),
            submissions: Progress::default(),
            failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    session: Option<DownloadSession>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&DownloadSession> {
        self.session.as_ref()
    }

    pub fn session_state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|session| session.state)
            .unwrap_or_default()
    }

    pub fn view(&self) -> SessionView {
        SessionView::from_state(self.session.as_ref(), self.dirty)
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn begin_session(&mut self, user: String, listing: ListingType) {
        self.session = Some(DownloadSession::new(user, listing));
        self.dirty = true;
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut DownloadSession> {
        self.dirty = true;
        self.session.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::ListingType;

    #[test]
    fn listing_parses_case_insensitively() {
        assert_eq!("Favorites".parse(), Ok(ListingType::Favorites));
        assert_eq!(" scraps ".parse(), Ok(ListingType::Scraps));
        assert!("journals".parse::<ListingType>().is_err());
    }

    #[test]
    fn listing_display_matches_site_path() {
        assert_eq!(ListingType::Gallery.to_string(), "gallery");
    }
}
