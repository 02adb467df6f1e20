use std::fmt;

use bytes::Bytes;
use futures_util::stream::BoxStream;

/// One `<a>` element of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href` attribute, trimmed; empty when absent.
    pub href: String,
    /// Raw `class` attribute, trimmed; empty when absent.
    pub class: String,
    /// Visible text with whitespace collapsed.
    pub text: String,
}

/// A fetched and parsed HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL after redirects; relative links resolve against it.
    pub url: String,
    pub anchors: Vec<Anchor>,
    /// Visible text of the document, used for sentinel phrases.
    pub text: String,
}

impl Page {
    pub fn contains_text(&self, phrase: &str) -> bool {
        self.text.contains(phrase)
    }
}

/// Body of a downloaded asset.
pub enum AssetBody {
    /// A textual resource, already decoded.
    Text(String),
    /// Any other resource, delivered as a chunk stream.
    Binary(BoxStream<'static, Result<Bytes, FetchError>>),
}

impl fmt::Debug for AssetBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            AssetBody::Binary(_) => f.write_str("Binary(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "cancelled")
    }

    /// Failures that another attempt cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::InvalidUrl | FailureKind::Cancelled | FailureKind::HttpStatus(404)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Decode,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
