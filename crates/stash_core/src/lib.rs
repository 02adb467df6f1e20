//! Artstash core: pure download-session state machine and view-model helpers.
mod effect;
mod event;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use event::ProgressEvent;
pub use msg::Msg;
pub use state::{AppState, DownloadSession, ListingType, ParseListingError, Progress, SessionState};
pub use update::update;
pub use view_model::SessionView;
