pub mod api;
pub mod artifact;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod explore;
pub mod ingest;
pub mod kpi;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod predict;
pub mod train;
