//! Sheet Lifecycle Manager
//!
//! Holds uploaded character sheets, applies calculation recipes to them one
//! edit at a time, and persists every accepted edit through a [`SheetStorage`].

pub mod config;
pub mod error;
pub mod manager;
pub mod sheet;
pub mod storage;

pub use config::StorageConfig;
pub use error::SheetError;
pub use manager::SheetManager;
pub use sheet::SheetSummary;
pub use storage::{FsSheetStorage, MemorySheetStorage, SheetStorage};
