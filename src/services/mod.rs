pub mod auth_service;
pub mod drive_service;
pub mod indexing_service;
pub mod registry_service;
pub mod search_service;
pub mod traversal_service;
