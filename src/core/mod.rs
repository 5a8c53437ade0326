//! Refresh engine: request accounting, shared stores and the coordinator

pub mod balance;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod format;
pub mod log;
pub mod observer;
pub mod source;
pub mod tracker;

// Re-export main types for cleaner imports
pub use balance::BalanceStore;
pub use bus::RefreshBus;
pub use coordinator::{CoordinatorConfig, CoordinatorHandle, Phase, RefreshCoordinator, RefreshState};
pub use source::{ApiEnvelope, FetchError, Transaction, WalletSource};
pub use tracker::{RequestTracker, TrackerStats};
