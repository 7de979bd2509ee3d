pub mod auth;
pub mod challenges;
pub mod convert;
pub mod error;
pub mod friends;
pub mod matchmaking;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod profiles;
pub mod realtime;
pub mod router;
pub mod sessions;
pub mod state;
pub mod strangers;

pub use router::router;
pub use state::{AppState, AppStateInner};
