//! Access-decision engine
//!
//! Reconciles a requested topic/operation against the cached credential
//! record and the role table:
//!
//! ```text
//! request → CredentialCache ── miss ──────────────→ DEFER (verification pending)
//!              │ hit
//!              ▼
//!           RoleAccessTable ── mask <= 0 ─────────→ DENY (+ evict)
//!              │
//!              ▼
//!           topic reconciliation → role check ────→ ALLOW | DENY (+ evict) | DEFER
//! ```
//!
//! Decisions are data: the engine returns one of the three decision values
//! and never raises on the decision path. Cache misses schedule nothing by
//! themselves; verification runs only when [`AuthzEngine::authenticate`]
//! is called for the user.

pub mod metrics;

pub use metrics::{EngineMetrics, MetricsCollector};

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::cache::{CacheConfig, CredentialCache};
use crate::gateway::{VerificationGateway, VerificationPurpose};
use crate::roles::RoleAccessTable;
use crate::types::{Access, Decision};
use crate::verifier::VerificationCoordinator;

/// Topic pattern granting access to any topic
const ANY_TOPIC: &str = "#";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Credential cache policy
    pub cache: CacheConfig,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            enable_metrics: true,
        }
    }
}

/// Main decision engine: owns the credential cache, consults the role
/// table, and schedules verification through the coordinator.
pub struct AuthzEngine {
    cache: Arc<CredentialCache>,

    roles: Arc<RoleAccessTable>,

    verifier: VerificationCoordinator,

    metrics: Option<Arc<MetricsCollector>>,
}

impl AuthzEngine {
    /// Creates an engine over a built role table and a verification
    /// gateway.
    ///
    /// The cache starts empty; every user is re-verified on first access
    /// after startup.
    pub fn new(
        config: EngineConfig,
        roles: RoleAccessTable,
        gateway: Arc<dyn VerificationGateway>,
    ) -> Self {
        let cache = Arc::new(CredentialCache::new(config.cache.clone()));
        let verifier = VerificationCoordinator::new(gateway, Arc::clone(&cache));
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            roles = roles.len(),
            enforce_expiry = config.cache.enforce_expiry,
            metrics = config.enable_metrics,
            "AuthzEngine initialized"
        );

        Self {
            cache,
            roles: Arc::new(roles),
            verifier,
            metrics,
        }
    }

    /// Login-time entry point: always defers.
    ///
    /// The call's only effect is scheduling verification so a later check
    /// finds the cache populated; no decision is made from credentials
    /// directly.
    pub async fn authenticate(&self, username: &str, credential: &str) -> Decision {
        debug!(username, "authenticate: scheduling verification");
        self.verifier
            .schedule(username, credential, VerificationPurpose::Login);

        self.finalize(Decision::Defer, username, Instant::now()).await
    }

    /// ACL check for `(username, topic, access)`.
    ///
    /// A denial evicts the user's cached record, forcing re-verification
    /// on the next request; a deferral leaves the cache untouched.
    pub async fn authorize(&self, username: &str, topic: Option<&str>, access: Access) -> Decision {
        let start = Instant::now();
        debug!(username, ?topic, access = access.code(), "acl check");

        let Some(record) = self.cache.lookup(username) else {
            debug!(username, "no cached record, deferring");
            return self.finalize(Decision::Defer, username, start).await;
        };

        let mask = self.roles.mask_for(&record.role);
        let decision = if mask <= 0 {
            info!(username, role = %record.role, mask, "access denied, role grants nothing");
            Decision::Deny
        } else if record.allowed_topic == ANY_TOPIC {
            role_check(access, mask)
        } else if let Some(topic) = topic {
            if topic.starts_with(record.allowed_topic.as_str()) {
                role_check(access, mask)
            } else {
                info!(username, topic, allowed = %record.allowed_topic, "access denied, topic not allowed");
                Decision::Deny
            }
        } else {
            info!(username, "access deferred, topic not specified");
            Decision::Defer
        };

        // Fail closed: a denial invalidates the cached trust for the user.
        if decision == Decision::Deny {
            self.cache.remove(username);
        }

        self.finalize(decision, username, start).await
    }

    /// ACL check without a topic, for non-topic-scoped validation.
    pub async fn check_without_topic(&self, username: &str, access: Access) -> Decision {
        self.authorize(username, None, access).await
    }

    /// Elevated-privilege check.
    ///
    /// The identity provider offers no elevated verification; the check
    /// denies without consulting the gateway or the cache.
    pub async fn check_superuser(&self, username: &str) -> Decision {
        debug!(username, "superuser check: not supported by provider");
        self.finalize(Decision::Deny, username, Instant::now()).await
    }

    /// Credential cache handle, shared with the verification coordinator
    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Role table in effect
    pub fn roles(&self) -> &RoleAccessTable {
        &self.roles
    }

    /// Current metrics snapshot, when collection is enabled
    pub async fn metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Metrics in Prometheus text format, when collection is enabled
    pub async fn export_prometheus(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }

    /// Drops all cached credentials; used at teardown
    pub fn shutdown(&self) {
        self.cache.clear();
        info!("credential cache cleared");
    }

    async fn finalize(&self, decision: Decision, username: &str, start: Instant) -> Decision {
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(decision).await;
            metrics.record_latency(start.elapsed()).await;
        }
        debug!(username, %decision, "decision");
        decision
    }
}

/// Role-based tie-break for a requested operation against a mask.
///
/// Read is a magnitude test, write and read/write are bitwise tests, and
/// the superuser code always passes; every other code is denied.
fn role_check(access: Access, mask: i64) -> Decision {
    let decision = match access {
        Access::Read if mask >= 1 => Decision::Allow,
        Access::Write if mask & 2 != 0 => Decision::Allow,
        Access::ReadWrite if mask & 3 != 0 => Decision::Allow,
        Access::Superuser => Decision::Allow,
        _ => Decision::Deny,
    };

    debug!(
        access = access.code(),
        mask,
        granted = decision.is_allow(),
        "role check"
    );
    decision
}
