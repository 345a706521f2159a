pub mod config;
pub mod endpoints;
pub mod types;
pub mod validate;
