pub mod state;
pub mod scheduler;
pub mod startup;

pub use state::{AppState, Stores};
pub use scheduler::Scheduler;
