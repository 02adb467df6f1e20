#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to download a listing of the given user.
    DownloadRequested {
        user: String,
        listing: crate::ListingType,
    },
    /// The shell started the engine for the pending request.
    ScanStarted,
    /// Progress reported by the download coordinator.
    Progress(crate::ProgressEvent),
    /// User pressed Stop (or Ctrl-C).
    CancelRequested,
    /// Fallback for placeholder wiring.
    NoOp,
}
