pub mod connection;
pub mod coordinator;
pub mod role;
mod share;
pub mod state;

pub use coordinator::Collaborators;
pub use role::{resolve, Registration, RoleDecision, RolePhase};
pub use state::{CallStatus, Role, SessionSnapshot};
