//! HTTP and WebSocket routes

pub mod health;
pub mod state;
pub mod ws;
