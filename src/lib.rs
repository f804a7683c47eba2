// src/lib.rs

pub mod cache;
pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_router;
