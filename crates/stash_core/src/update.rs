use crate::{AppState, Effect, Msg, Progress, ProgressEvent, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::DownloadRequested { user, listing } => {
            let user = user.trim();
            // One session at a time; an empty user is not a request.
            if user.is_empty() || state.session_state().is_active() {
                return (state, Vec::new());
            }
            state.begin_session(user.to_string(), listing);
            vec![Effect::StartDownload {
                user: user.to_string(),
                listing,
            }]
        }
        Msg::ScanStarted => {
            if state.session_state() == SessionState::Initializing {
                if let Some(session) = state.session_mut() {
                    session.state = SessionState::Scanning;
                }
            }
            Vec::new()
        }
        Msg::CancelRequested => match state.session_state() {
            SessionState::Initializing | SessionState::Scanning | SessionState::Running => {
                if let Some(session) = state.session_mut() {
                    session.state = SessionState::Cancelling;
                }
                vec![Effect::CancelDownload]
            }
            _ => Vec::new(),
        },
        Msg::Progress(event) => {
            apply_progress(&mut state, event);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn apply_progress(state: &mut AppState, event: ProgressEvent) {
    let current = state.session_state();
    if !current.is_active() {
        return;
    }
    // Once stopping, only the terminal event matters.
    if current == SessionState::Cancelling && !event.is_terminal() {
        return;
    }
    let Some(session) = state.session_mut() else {
        return;
    };

    match event {
        ProgressEvent::PagesDiscovered(total) => {
            session.state = SessionState::Running;
            session.pages = Progress::new(0, total);
        }
        ProgressEvent::PageAdvanced(index) => {
            session.pages.current = index.min(session.pages.total);
        }
        ProgressEvent::SubmissionsOnPage(total) => {
            session.submissions = Progress::new(0, total);
        }
        ProgressEvent::SubmissionAdvanced(completed) => {
            let capped = completed.min(session.submissions.total);
            session.submissions.current = session.submissions.current.max(capped);
        }
        ProgressEvent::SubProgressReset => {
            session.submissions = Progress::default();
        }
        ProgressEvent::Done => {
            session.state = SessionState::Completed;
            session.pages.current = session.pages.total;
            session.submissions.current = session.submissions.total;
        }
        ProgressEvent::Cancelled => session.state = SessionState::Cancelled,
        ProgressEvent::InvalidUser => {
            session.state = SessionState::InvalidUser;
            session.pages = Progress::default();
            session.submissions = Progress::default();
        }
        ProgressEvent::Failed(reason) => {
            session.state = SessionState::Failed;
            session.failure = Some(reason);
        }
    }
}
