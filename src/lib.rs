pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod ui;
pub mod utils;

pub use config::CallConfig;
pub use error::CallError;
pub use events::SessionEvent;
pub use peer::{CallStatus, Collaborators, Role, SessionSnapshot};
pub use session::CallSession;
