pub mod auth;
pub mod sync;

pub use auth::AuthCommands;
pub use sync::SyncCommands;
