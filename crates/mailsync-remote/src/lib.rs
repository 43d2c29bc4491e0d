//! Mail platform admin API client
//!
//! Implements the `RemoteMailStore` contract over the platform's HTTP admin
//! API.

pub mod client;
pub mod config;

pub use client::RemoteMailClient;
pub use config::RemoteMailConfig;
