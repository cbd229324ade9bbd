//! Dispatch front end.
//!
//! # Data Flow
//! ```text
//! GatewayConfig
//!     → topology.rs (compile routes + rewrite engine, atomic publish)
//!     → server.rs (axum catch-all handler consuming the topology)
//! ```
//!
//! # Design Decisions
//! - Route selection is the URL template matcher; a request that matches no
//!   registered route is a 404, never an internal error
//! - Each request pins one topology generation for its whole lifetime

pub mod server;
pub mod topology;

pub use server::GatewayServer;
pub use topology::{Route, Topology, TopologyHandle};
