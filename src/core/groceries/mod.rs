//! Grocery list domain: item types, mutation reconciliation, the list
//! store, the confirmation queue, and the text-based extraction fallback.

pub mod confirm;
pub mod extraction;
pub mod item;
pub mod prompts;
pub mod reconcile;
pub mod store;

pub use confirm::{ConfirmTiming, ConfirmationQueue};
pub use extraction::GroceryExtractor;
pub use item::{GroceryItem, Measurement, MutationAction, MutationRecord};
pub use reconcile::reconcile_mutations;
pub use store::GroceryListStore;
