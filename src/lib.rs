//! URL Rewriting API Gateway Library
//!
//! An API gateway that fronts a cluster of backend HTTP services. Inbound
//! request URLs are matched against registered URL templates to pick a route,
//! rewritten through declarative rule chains to the backend address, and
//! dispatched; response redirect targets are rewritten back to the externally
//! visible gateway address.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                    GATEWAY                        │
//!                    │                                                   │
//!   Client Request   │  ┌─────────┐   ┌─────────────┐   ┌────────────┐  │
//!   ─────────────────┼─▶│ gateway │──▶│ urltemplate │──▶│  rewrite   │  │
//!                    │  │ server  │   │   matcher   │   │   engine   │  │
//!                    │  └─────────┘   └─────────────┘   └─────┬──────┘  │
//!                    │                                        │          │
//!                    │                                        ▼          │
//!   Client Response  │  ┌─────────┐   ┌─────────────┐   ┌────────────┐  │
//!   ◀────────────────┼──│location │◀──│ urltemplate │◀──│  backend   │◀─┼── Backend
//!                    │  │ rewrite │   │  expander   │   │ dispatch   │  │   Service
//!                    │  └─────────┘   └─────────────┘   └────────────┘  │
//!                    │                                                   │
//!                    │  ┌─────────────────────────────────────────────┐ │
//!                    │  │            Cross-Cutting Concerns            │ │
//!                    │  │   config · topology swap · observability     │ │
//!                    │  └─────────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────────┘
//! ```

// Core engine
pub mod rewrite;
pub mod urltemplate;

// Gateway surface
pub mod config;
pub mod gateway;

// Cross-cutting concerns
pub mod observability;

pub use config::schema::GatewayConfig;
pub use gateway::server::GatewayServer;
pub use gateway::topology::{Topology, TopologyHandle};
pub use rewrite::{Direction, RewriteEngine};
pub use urltemplate::{Expander, Matcher, Parser, Template};
