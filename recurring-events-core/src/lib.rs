//! Recurring Events Core Library
//!
//! This library expands recurring event templates into dated instances and
//! synchronizes them with a remote event store without creating duplicates.

pub mod config;
pub mod error;
pub mod expand;
pub mod gateway;
pub mod materialize;
pub mod sync;
pub mod types;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        config::*, expand::*, gateway::offline::OfflineGateway, gateway::wordpress::WordPressGateway, gateway::*, materialize::*,
        sync::*, types::*,
    };
}
