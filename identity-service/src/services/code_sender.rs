//! Issuing verification codes to an email address or phone number, behind a
//! human check.

use crate::dtos::SendCodeRequest;
use crate::services::human_check::HumanCheckService;
use crate::services::signup::phone_target;
use crate::services::verification::{VerificationGate, VerificationRejection};
use crate::services::ServiceError;
use crate::utils::{is_valid_email, is_valid_phone};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

pub const HUMAN_CHECK_FAILED: &str = "Turing test failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChannel {
    Email,
    Phone,
}

impl CodeChannel {
    pub fn label(&self) -> &'static str {
        match self {
            CodeChannel::Email => "Email",
            CodeChannel::Phone => "Phone",
        }
    }
}

/// Hands an issued code to the user. `target` is the email address, or
/// the phone number with its `+prefix`.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(
        &self,
        channel: CodeChannel,
        target: &str,
        code: &str,
    ) -> Result<(), anyhow::Error>;
}

/// Drops the code. Deployments without a mail or SMS channel use this.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelivery;

#[async_trait]
impl CodeDelivery for NoopDelivery {
    async fn deliver(
        &self,
        channel: CodeChannel,
        _target: &str,
        _code: &str,
    ) -> Result<(), anyhow::Error> {
        tracing::debug!(channel = channel.label(), "No delivery channel configured, code dropped");
        Ok(())
    }
}

#[derive(Clone)]
pub struct CodeSender {
    gate: Arc<dyn VerificationGate>,
    human_check: HumanCheckService,
    delivery: Arc<dyn CodeDelivery>,
}

impl CodeSender {
    pub fn new(
        gate: Arc<dyn VerificationGate>,
        human_check: HumanCheckService,
        delivery: Arc<dyn CodeDelivery>,
    ) -> Self {
        Self {
            gate,
            human_check,
            delivery,
        }
    }

    /// Check the human check, then issue and deliver a code for the target.
    #[instrument(skip(self, req), fields(channel = %req.dest_type))]
    pub async fn send(&self, req: &SendCodeRequest) -> Result<(), ServiceError> {
        if req.dest.is_empty() {
            return Err(ServiceError::rejected("Missing parameter: dest"));
        }

        if !self
            .human_check
            .verify(&req.check_type, &req.check_id, &req.check_key)
        {
            tracing::warn!("Human check failed for verification code request");
            return Err(ServiceError::rejected(HUMAN_CHECK_FAILED));
        }

        let (channel, target) = match req.dest_type.as_str() {
            "email" => {
                if !is_valid_email(&req.dest) {
                    return Err(ServiceError::rejected("Email is invalid"));
                }
                (CodeChannel::Email, req.dest.clone())
            }
            "phone" => {
                if !is_valid_phone(&req.dest) {
                    return Err(ServiceError::rejected("Phone number is invalid"));
                }
                (CodeChannel::Phone, phone_target(&req.country_code, &req.dest))
            }
            other => {
                return Err(ServiceError::rejected(format!("Unknown type: {}", other)));
            }
        };

        let code = self
            .gate
            .issue(&target)
            .await
            .map_err(|rejection: VerificationRejection| {
                ServiceError::rejected(format!("{}{}", channel.label(), rejection))
            })?;

        self.delivery
            .deliver(channel, &target, &code)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to deliver verification code: {}", e))?;

        tracing::info!(channel = channel.label(), "Verification code sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::human_check::{Captcha, CaptchaGenerator, HumanCheckProvider};
    use crate::services::verification::CodeRegistry;
    use crate::utils::{Clock, ManualClock};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    /// Challenge `"c1"` whose answer is `"42"`, single use.
    #[derive(Default)]
    struct OneChallenge {
        spent: Mutex<bool>,
    }

    impl CaptchaGenerator for OneChallenge {
        fn generate(&self) -> Captcha {
            Captcha {
                id: "c1".to_string(),
                image: String::new(),
            }
        }

        fn verify(&self, id: &str, answer: &str) -> bool {
            let mut spent = self.spent.lock().unwrap();
            let ok = !*spent && id == "c1" && answer == "42";
            *spent = true;
            ok
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(CodeChannel, String, String)>>,
    }

    #[async_trait]
    impl CodeDelivery for Outbox {
        async fn deliver(
            &self,
            channel: CodeChannel,
            target: &str,
            code: &str,
        ) -> Result<(), anyhow::Error> {
            self.sent
                .lock()
                .unwrap()
                .push((channel, target.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        gate: Arc<CodeRegistry>,
        outbox: Arc<Outbox>,
        sender: CodeSender,
    }

    fn fixture(provider: Option<HumanCheckProvider>) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        ));
        let gate = Arc::new(CodeRegistry::new(Duration::minutes(10), clock));
        let outbox = Arc::new(Outbox::default());
        let human_check = HumanCheckService::new(provider, Arc::new(OneChallenge::default()));
        let sender = CodeSender::new(gate.clone(), human_check, outbox.clone());
        Fixture {
            gate,
            outbox,
            sender,
        }
    }

    fn email_request(check_key: &str) -> SendCodeRequest {
        SendCodeRequest {
            dest: "alice@example.com".to_string(),
            dest_type: "email".to_string(),
            check_type: "captcha".to_string(),
            check_id: "c1".to_string(),
            check_key: check_key.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivered_code_passes_the_gate() {
        let fx = fixture(None);

        fx.sender.send(&email_request("42")).await.unwrap();

        let sent = fx.outbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        let (channel, target, code) = &sent[0];
        assert_eq!(*channel, CodeChannel::Email);
        assert_eq!(target, "alice@example.com");
        assert!(fx.gate.check(target, code).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_captcha_answer_issues_nothing() {
        let fx = fixture(None);

        let err = fx.sender.send(&email_request("41")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ref r) if r.msg == HUMAN_CHECK_FAILED));
        assert!(fx.outbox.sent.lock().unwrap().is_empty());
        assert_eq!(
            fx.gate.check("alice@example.com", "000000").await,
            Err(VerificationRejection::NotSent)
        );
    }

    #[tokio::test]
    async fn phone_codes_bind_to_the_prefixed_number() {
        let fx = fixture(None);
        let req = SendCodeRequest {
            dest: "13800138000".to_string(),
            dest_type: "phone".to_string(),
            country_code: "86".to_string(),
            ..email_request("42")
        };

        fx.sender.send(&req).await.unwrap();

        let sent = fx.outbox.sent.lock().unwrap().clone();
        assert_eq!(sent[0].0, CodeChannel::Phone);
        assert_eq!(sent[0].1, "+8613800138000");
    }

    #[tokio::test]
    async fn resend_within_interval_is_rejected() {
        let fx = fixture(Some(HumanCheckProvider {
            provider_type: "aliyun".to_string(),
            app_key: None,
            scene: None,
        }));
        let req = SendCodeRequest {
            check_type: "aliyun".to_string(),
            check_key: "provider-token".to_string(),
            ..email_request("")
        };

        fx.sender.send(&req).await.unwrap();
        let err = fx.sender.send(&req).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::Rejected(ref r) if r.msg == "Email code was sent too recently")
        );
    }

    #[tokio::test]
    async fn malformed_destinations_are_rejected() {
        let cases = [
            ("", "email", "Missing parameter: dest"),
            ("not-an-email", "email", "Email is invalid"),
            ("12ab", "phone", "Phone number is invalid"),
            ("alice@example.com", "fax", "Unknown type: fax"),
        ];
        for (dest, dest_type, expected) in cases {
            // The challenge is single use, so each case gets its own.
            let fx = fixture(None);
            let req = SendCodeRequest {
                dest: dest.to_string(),
                dest_type: dest_type.to_string(),
                ..email_request("42")
            };
            let err = fx.sender.send(&req).await.unwrap_err();
            assert!(
                matches!(err, ServiceError::Rejected(ref r) if r.msg == expected),
                "{} / {}: {:?}",
                dest,
                dest_type,
                err
            );
            assert!(fx.outbox.sent.lock().unwrap().is_empty());
        }
    }
}
