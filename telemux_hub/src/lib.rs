//! Library surface for telemux_hub so integration tests can drive the hub directly.

pub mod adapters;
pub mod config;
pub mod demo;
pub mod error;
pub mod event;
pub mod hub;
pub mod logbus;
pub mod poller;
pub mod reconciler;
pub mod ring;
pub mod routes;
pub mod state;
pub mod store;
pub mod tls;
pub mod types;
pub mod viewer;
pub mod ws;

pub use error::HubError;
pub use hub::{Hub, HubConfig, ViewerHandle};
