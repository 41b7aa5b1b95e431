pub mod aggregate;
pub mod audit;
pub mod classify;
pub mod config;
pub mod cumulative;
pub mod filter;
pub mod ingest;
pub mod paths;
pub mod render;
pub mod session;
pub mod util;
pub mod warn;
