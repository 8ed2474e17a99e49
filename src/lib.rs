pub mod api;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod region;
pub mod sanitize;
pub mod scheduler;
pub mod source;
pub mod worker;
