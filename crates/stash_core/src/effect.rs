use crate::ListingType;

/// Side effects requested by [`crate::update`]; executed by the application shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartDownload { user: String, listing: ListingType },
    CancelDownload,
}
