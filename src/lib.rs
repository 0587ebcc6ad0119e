// Shared infrastructure
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Decision core (pure)
pub mod digest;
pub mod preferences;

// Delivery
pub mod connection_manager;
pub mod notification;
pub mod tasks;

// Server surfaces
pub mod api;
pub mod server;
pub mod triggers;
pub mod websocket;

// Client side
pub mod client;
pub mod realtime;
