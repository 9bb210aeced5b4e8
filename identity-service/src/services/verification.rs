//! One-time codes bound to an email address or phone number.

use crate::utils::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const DEFAULT_CODE_TTL_MINUTES: i64 = 10;
pub const RESEND_INTERVAL_SECONDS: i64 = 60;

/// Why a code was not accepted. The text reads as a suffix of the field
/// label, so `"Email"` + rejection gives `"Email code has expired"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationRejection {
    #[error(" code is empty")]
    Empty,
    #[error(" code has not been sent")]
    NotSent,
    #[error(" code has expired")]
    Expired,
    #[error(" code has already been used")]
    Used,
    #[error(" code is wrong")]
    Wrong,
    #[error(" code was sent too recently")]
    SentTooRecently,
}

#[async_trait]
pub trait VerificationGate: Send + Sync {
    async fn check(&self, target: &str, code: &str) -> Result<(), VerificationRejection>;
    /// Issue a fresh code for `target`, replacing any earlier one.
    async fn issue(&self, target: &str) -> Result<String, VerificationRejection>;
    /// Consume the target's code so it cannot be replayed.
    async fn disable(&self, target: &str);
}

struct IssuedCode {
    digest: [u8; 32],
    issued_at: DateTime<Utc>,
    used: bool,
}

/// In-memory gate keeping one active code per target. Only digests are held.
pub struct CodeRegistry {
    codes: DashMap<String, IssuedCode>,
    ttl: Duration,
    resend_interval: Duration,
    clock: Arc<dyn Clock>,
}

fn digest(code: &str) -> [u8; 32] {
    Sha256::digest(code.as_bytes()).into()
}

impl CodeRegistry {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: DashMap::new(),
            ttl,
            resend_interval: Duration::seconds(RESEND_INTERVAL_SECONDS),
            clock,
        }
    }

    /// Issue a fresh six-digit code for `target`, replacing any earlier one.
    /// Handing the code to a delivery channel is the caller's job.
    pub fn issue(&self, target: &str) -> Result<String, VerificationRejection> {
        let now = self.clock.now();
        if let Some(existing) = self.codes.get(target) {
            if !existing.used && now - existing.issued_at < self.resend_interval {
                return Err(VerificationRejection::SentTooRecently);
            }
        }

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.codes.insert(
            target.to_string(),
            IssuedCode {
                digest: digest(&code),
                issued_at: now,
                used: false,
            },
        );
        tracing::debug!(target_len = target.len(), "Verification code issued");
        Ok(code)
    }
}

#[async_trait]
impl VerificationGate for CodeRegistry {
    async fn check(&self, target: &str, code: &str) -> Result<(), VerificationRejection> {
        let entry = self
            .codes
            .get(target)
            .ok_or(VerificationRejection::NotSent)?;

        if code.is_empty() {
            return Err(VerificationRejection::Empty);
        }
        if entry.used {
            return Err(VerificationRejection::Used);
        }
        if self.clock.now() - entry.issued_at > self.ttl {
            return Err(VerificationRejection::Expired);
        }
        if !bool::from(entry.digest[..].ct_eq(&digest(code)[..])) {
            return Err(VerificationRejection::Wrong);
        }
        Ok(())
    }

    async fn issue(&self, target: &str) -> Result<String, VerificationRejection> {
        CodeRegistry::issue(self, target)
    }

    async fn disable(&self, target: &str) {
        if let Some(mut entry) = self.codes.get_mut(target) {
            entry.used = true;
        }
    }
}
