pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use models::listing::{ChildEntry, ListingPage};
pub use models::media_file::{MediaFileRecord, MediaKind};
pub use models::progress::{IndexingProgress, IndexingStatus};
pub use services::registry_service::{Registry, RegistryEvent, RegistrySummary};
pub use services::traversal_service::{traverse, ListChildren, TraversalOptions, TraversalSummary};
pub use state::AppState;
