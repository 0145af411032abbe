// src/services/mod.rs

pub mod api_server;

pub use api_server::ApiServer;
