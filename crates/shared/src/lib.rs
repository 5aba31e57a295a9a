pub mod config;
mod config_env;
pub mod content;
pub mod encounter;
pub mod llm;
pub mod models;
pub mod repos;
