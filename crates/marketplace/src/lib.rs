#![warn(clippy::unwrap_used)]

pub mod accounting;
pub mod impression;
pub mod selection;
pub mod store;

pub use accounting::BudgetAccountant;
pub use impression::ImpressionTracker;
pub use selection::{SelectionOrchestrator, SelectionOutcome, SelectionRequest};
pub use store::InMemoryStore;
