// Library root: re-exports all modules so integration tests and the binary
// can reach the dashboard's public API.

pub mod app;
pub mod config;
pub mod db;
pub mod filters;
pub mod report;
pub mod session;
