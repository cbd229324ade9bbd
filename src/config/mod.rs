//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! topology file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → gateway::topology (compiled into matchers + rewrite engine)
//!
//! On redeploy:
//!     load + validate + compile a new topology
//!     → atomic swap of Arc<Topology>
//!     → in-flight requests finish on the old generation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full redeploy
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::RouteConfig;
