pub mod api;
pub mod certificate;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod payments;
