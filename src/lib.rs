pub mod api_connection;
pub mod cli;
pub mod commands;
pub mod config;
pub mod export;
pub mod generation;
pub mod json_recovery;
pub mod rating;
