//! Configuration, shared models and secret retrieval

pub mod config;
pub mod models;
pub mod secrets;
