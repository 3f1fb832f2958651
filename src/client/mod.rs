//! Client management system
//!
//! Session identity, the shared registry, and the per-connection lifecycle.

pub mod handler;
pub mod registry;
pub mod session;

pub use handler::handle_connection;
pub use registry::{ClientRegistry, SharedRegistry};
pub use session::{ClientSession, SessionId};
