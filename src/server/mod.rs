//! Server core functionality
//!
//! This module contains the listener, the accept loop, and the server
//! lifecycle for the chat relay.

pub mod core;

pub use self::core::Server;
