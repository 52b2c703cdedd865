//! Verification scheduling
//!
//! Decouples decision latency from identity-provider latency: the engine
//! defers, the coordinator runs the exchange as its own task and applies
//! the outcome to the cache when it completes. The cache is touched only
//! at the end of an attempt, never across the exchange itself. Results for
//! a username land in completion order; there is no cancellation, and a
//! result nobody is waiting for simply updates the cache and is dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CredentialCache, CredentialRecord};
use crate::gateway::{VerificationGateway, VerificationPurpose, VerificationRequest};

/// Schedules verification attempts and applies their results to the cache.
pub struct VerificationCoordinator {
    gateway: Arc<dyn VerificationGateway>,
    cache: Arc<CredentialCache>,
}

impl VerificationCoordinator {
    pub fn new(gateway: Arc<dyn VerificationGateway>, cache: Arc<CredentialCache>) -> Self {
        Self { gateway, cache }
    }

    /// Spawns one verification attempt.
    ///
    /// On success the claims are upserted; on failure any stale record for
    /// the username is dropped, leaving the user absent. The handle is
    /// returned for callers that want to await completion; the engine
    /// itself never does.
    pub fn schedule(
        &self,
        username: &str,
        credential: &str,
        purpose: VerificationPurpose,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let cache = Arc::clone(&self.cache);
        let request = VerificationRequest {
            username: username.to_string(),
            credential: credential.to_string(),
            purpose,
        };

        tokio::spawn(async move {
            match gateway.verify(&request).await {
                Ok(claims) => {
                    debug!(
                        username = %request.username,
                        role = %claims.role,
                        topic = %claims.allowed_topic,
                        "verification succeeded"
                    );
                    cache.upsert(CredentialRecord {
                        username: request.username.clone(),
                        allowed_topic: claims.allowed_topic,
                        role: claims.role,
                        expires_at: claims.expires_at,
                    });
                }
                Err(err) => {
                    warn!(username = %request.username, error = %err, "verification failed");
                    cache.remove(&request.username);
                }
            }
        })
    }
}
