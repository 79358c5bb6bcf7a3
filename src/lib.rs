// Library exports for Threadline
// This allows integration tests and external code to use Threadline modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;
pub mod thread;
