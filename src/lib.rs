pub mod analytics;
pub mod anomalies;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod grid;
pub mod ingest;
pub mod output;
pub mod parser;
pub mod source;
pub mod store;
pub mod trajectory;
