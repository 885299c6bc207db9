pub mod error;
pub mod lobby;
pub mod registry;

// Re-export the main types for easy access
pub use error::LobbyError;
pub use lobby::MemberHandle;
pub use registry::LobbyRegistry;
