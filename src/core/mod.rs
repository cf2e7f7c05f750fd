pub mod backup;
pub mod checkpoint;
pub mod config;
pub mod conflict;
pub mod dedup;
pub mod identity;
pub mod ingest;
pub mod log;
pub mod runner;
pub mod status;
pub mod sync;
