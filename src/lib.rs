pub mod config;
pub mod core;
pub mod diag;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use crate::config::ServerConfig;
pub use crate::core::groceries::item::{GroceryItem, Measurement, MutationAction, MutationRecord};
pub use crate::core::groceries::store::GroceryListStore;
pub use crate::core::session::engine::VoiceSession;
pub use crate::diag::DiagLogger;
pub use crate::state::AppState;
