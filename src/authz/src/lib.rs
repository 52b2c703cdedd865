//! # Topicgate Authorization Engine
//!
//! Credential cache and access-decision engine for message-broker
//! access-control checks. Decides, per client, whether a connect, publish,
//! or subscribe request is allowed, denied, or deferred pending
//! verification, from identity-provider claims (a role and a topic
//! pattern) and a per-role bitmask of permitted operations.
//!
//! ## Features
//!
//! - **Three-valued decisions**: allow / deny / defer, returned as data
//! - **Concurrent credential cache** with claim-expiry eviction
//! - **Async verification** decoupled from the decision path
//! - **Role bitmask table** built once from configuration
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use topicgate_authz::{
//!     Access, AuthzEngine, CredentialRecord, Decision, EngineConfig, RoleAccessTable,
//!     StaticGateway,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roles = RoleAccessTable::build(vec![("viewer".to_string(), 1)], None)?;
//!     let engine = AuthzEngine::new(EngineConfig::default(), roles, Arc::new(StaticGateway::new()));
//!
//!     // Unknown users defer until verification populates the cache.
//!     assert_eq!(
//!         engine.authorize("alice", Some("sensors/room1"), Access::Read).await,
//!         Decision::Defer
//!     );
//!
//!     engine.cache().upsert(CredentialRecord {
//!         username: "alice".to_string(),
//!         allowed_topic: "sensors/".to_string(),
//!         role: "viewer".to_string(),
//!         expires_at: None,
//!     });
//!
//!     assert_eq!(
//!         engine.authorize("alice", Some("sensors/room1"), Access::Read).await,
//!         Decision::Allow
//!     );
//!     assert_eq!(
//!         engine.authorize("alice", Some("sensors/room1"), Access::Write).await,
//!         Decision::Deny
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod roles;
pub mod types;
pub mod verifier;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheStats, CredentialCache, CredentialRecord};
pub use claims::VerifiedClaims;
pub use config::AuthzConfig;
pub use engine::{AuthzEngine, EngineConfig, EngineMetrics, MetricsCollector};
pub use error::{AuthzError, Result};
pub use gateway::{
    HttpGateway, HttpGatewayConfig, StaticGateway, VerificationGateway, VerificationPurpose,
    VerificationRequest,
};
pub use roles::{RoleAccessTable, UNKNOWN_ROLE_MASK};
pub use types::{Access, Decision};
pub use verifier::VerificationCoordinator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
