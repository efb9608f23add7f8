pub mod cli;
pub mod config;
pub mod error;
pub mod gocd;
pub mod handlers;
pub mod manifest;
pub mod reconcile;
pub mod spec;
