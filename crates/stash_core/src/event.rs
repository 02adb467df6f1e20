/// Progress reported by a download session, in emission order:
/// `PagesDiscovered`, then per page `SubProgressReset`, `SubmissionsOnPage`,
/// any number of `SubmissionAdvanced` and `PageAdvanced`, then exactly one
/// terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    PagesDiscovered(usize),
    PageAdvanced(usize),
    SubmissionsOnPage(usize),
    SubmissionAdvanced(usize),
    SubProgressReset,
    Done,
    Cancelled,
    InvalidUser,
    /// The session was aborted by a fatal error (listing scan exhausted its retries).
    Failed(String),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Done
                | ProgressEvent::Cancelled
                | ProgressEvent::InvalidUser
                | ProgressEvent::Failed(_)
        )
    }
}
