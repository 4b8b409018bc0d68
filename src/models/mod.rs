pub mod listing;
pub mod media_file;
pub mod progress;
