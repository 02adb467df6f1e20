use crate::{DownloadSession, ListingType, Progress, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub state: SessionState,
    pub user: Option<String>,
    pub listing: Option<ListingType>,
    pub pages: Progress,
    pub submissions: Progress,
    pub page_label: String,
    pub submission_label: String,
    pub failure: Option<String>,
    pub dirty: bool,
}

impl SessionView {
    pub(crate) fn from_state(session: Option<&DownloadSession>, dirty: bool) -> Self {
        let Some(session) = session else {
            return Self {
                page_label: page_label(Progress::default()),
                submission_label: submission_label(Progress::default()),
                dirty,
                ..Self::default()
            };
        };

        let (page_label, submission_label) = match session.state {
            SessionState::Idle
            | SessionState::Running
            | SessionState::Completed
            | SessionState::InvalidUser => (
                page_label(session.pages),
                submission_label(session.submissions),
            ),
            SessionState::Initializing | SessionState::Scanning => {
                ("Initializing...".to_string(), "Initializing...".to_string())
            }
            SessionState::Cancelling | SessionState::Cancelled => {
                ("Stopped".to_string(), "Stopped".to_string())
            }
            SessionState::Failed => ("Failed".to_string(), "Failed".to_string()),
        };

        Self {
            state: session.state,
            user: Some(session.user.clone()),
            listing: Some(session.listing),
            pages: session.pages,
            submissions: session.submissions,
            page_label,
            submission_label,
            failure: session.failure.clone(),
            dirty,
        }
    }
}

fn page_label(progress: Progress) -> String {
    format!("Page {}/{}", progress.current, progress.total)
}

fn submission_label(progress: Progress) -> String {
    format!("Submission {}/{}", progress.current, progress.total)
}
