pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod scoring;
pub mod speed_limits;
pub mod telemetry;
