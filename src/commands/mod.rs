pub mod indexing_commands;
pub mod registry_commands;
