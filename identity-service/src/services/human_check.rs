use crate::dtos::human_check::{HumanCheck, LOCAL_CAPTCHA_TYPE};
use crate::utils::Clock;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::fmt::Write;
use std::sync::Arc;

const CAPTCHA_DIGITS: usize = 5;
const CAPTCHA_WIDTH: u32 = 150;
const CAPTCHA_HEIGHT: u32 = 50;

/// Third-party human verification configured as the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanCheckProvider {
    pub provider_type: String,
    pub app_key: Option<String>,
    pub scene: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    pub id: String,
    /// `data:image/svg+xml;base64,...`
    pub image: String,
}

pub trait CaptchaGenerator: Send + Sync {
    fn generate(&self) -> Captcha;
    /// Single use: the challenge is gone after the first attempt.
    fn verify(&self, id: &str, answer: &str) -> bool;
}

/// Local numeric challenge rendered as SVG.
pub struct SvgCaptcha {
    answers: DashMap<String, (String, DateTime<Utc>)>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SvgCaptcha {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            answers: DashMap::new(),
            ttl,
            clock,
        }
    }

    fn render(answer: &str) -> String {
        let mut rng = rand::thread_rng();
        let mut svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="#f4f4f4"/>"##,
            w = CAPTCHA_WIDTH,
            h = CAPTCHA_HEIGHT
        );

        for _ in 0..4 {
            let _ = write!(
                svg,
                r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#9aa" stroke-width="1"/>"##,
                rng.gen_range(0..CAPTCHA_WIDTH),
                rng.gen_range(0..CAPTCHA_HEIGHT),
                rng.gen_range(0..CAPTCHA_WIDTH),
                rng.gen_range(0..CAPTCHA_HEIGHT)
            );
        }

        let step = CAPTCHA_WIDTH / (CAPTCHA_DIGITS as u32 + 1);
        for (i, digit) in answer.chars().enumerate() {
            let x = step * (i as u32 + 1) - 8 + rng.gen_range(0..6);
            let y = CAPTCHA_HEIGHT / 2 + 10 + rng.gen_range(0..6);
            let angle: i32 = rng.gen_range(-20..=20);
            let _ = write!(
                svg,
                r##"<text x="{x}" y="{y}" font-family="monospace" font-size="28" fill="#333" transform="rotate({angle} {x} {y})">{digit}</text>"##
            );
        }
        svg.push_str("</svg>");

        format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
    }
}

impl CaptchaGenerator for SvgCaptcha {
    fn generate(&self) -> Captcha {
        let now = self.clock.now();
        self.answers.retain(|_, (_, issued)| now - *issued <= self.ttl);

        let mut rng = rand::thread_rng();
        let answer: String = (0..CAPTCHA_DIGITS)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        let id = uuid::Uuid::new_v4().simple().to_string();
        let image = Self::render(&answer);

        self.answers.insert(id.clone(), (answer, now));
        Captcha { id, image }
    }

    fn verify(&self, id: &str, answer: &str) -> bool {
        let Some((_, (expected, issued))) = self.answers.remove(id) else {
            return false;
        };
        self.clock.now() - issued <= self.ttl && expected == answer
    }
}

#[derive(Clone)]
pub struct HumanCheckService {
    provider: Option<HumanCheckProvider>,
    captcha: Arc<dyn CaptchaGenerator>,
}

impl HumanCheckService {
    pub fn new(provider: Option<HumanCheckProvider>, captcha: Arc<dyn CaptchaGenerator>) -> Self {
        Self { provider, captcha }
    }

    /// The configured provider if there is one, otherwise a fresh local captcha.
    pub fn get_human_check(&self) -> HumanCheck {
        match &self.provider {
            Some(provider) => HumanCheck {
                check_type: provider.provider_type.clone(),
                app_key: provider.app_key.clone(),
                scene: provider.scene.clone(),
                captcha_id: None,
                captcha_image: None,
            },
            None => {
                let captcha = self.captcha.generate();
                HumanCheck {
                    check_type: LOCAL_CAPTCHA_TYPE.to_string(),
                    app_key: None,
                    scene: None,
                    captcha_id: Some(captcha.id),
                    captcha_image: Some(captcha.image),
                }
            }
        }
    }

    pub fn verify_captcha(&self, id: &str, answer: &str) -> bool {
        self.captcha.verify(id, answer)
    }

    /// Accept only the check type this service hands out. Provider tokens are
    /// verified by the provider, so here they only have to be present.
    pub fn verify(&self, check_type: &str, check_id: &str, check_key: &str) -> bool {
        match &self.provider {
            Some(provider) => check_type == provider.provider_type && !check_key.is_empty(),
            None => check_type == LOCAL_CAPTCHA_TYPE && self.verify_captcha(check_id, check_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use chrono::TimeZone;

    fn captcha() -> (Arc<SvgCaptcha>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        ));
        let captcha = Arc::new(SvgCaptcha::new(Duration::minutes(5), clock.clone()));
        (captcha, clock)
    }

    fn answer_of(captcha: &SvgCaptcha, id: &str) -> String {
        captcha.answers.get(id).map(|e| e.0.clone()).unwrap()
    }

    #[test]
    fn falls_back_to_local_captcha() {
        let (generator, _) = captcha();
        let service = HumanCheckService::new(None, generator);

        let check = service.get_human_check();
        assert_eq!(check.check_type, "captcha");
        assert!(check.captcha_id.is_some());
        assert!(check
            .captcha_image
            .unwrap()
            .starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn configured_provider_is_named_without_challenge() {
        let (generator, _) = captcha();
        let provider = HumanCheckProvider {
            provider_type: "aliyun".to_string(),
            app_key: Some("key".to_string()),
            scene: None,
        };
        let service = HumanCheckService::new(Some(provider), generator);

        let check = service.get_human_check();
        assert_eq!(check.check_type, "aliyun");
        assert_eq!(check.app_key.as_deref(), Some("key"));
        assert!(check.captcha_id.is_none() && check.captcha_image.is_none());
    }

    #[test]
    fn captcha_answers_are_single_use() {
        let (generator, _) = captcha();
        let challenge = generator.generate();
        let answer = answer_of(&generator, &challenge.id);
        assert_eq!(answer.len(), 5);

        assert!(generator.verify(&challenge.id, &answer));
        assert!(!generator.verify(&challenge.id, &answer));
    }

    #[test]
    fn verify_accepts_only_the_advertised_check() {
        let (generator, _) = captcha();
        let local = HumanCheckService::new(None, generator.clone());
        let challenge = local.get_human_check();
        let id = challenge.captcha_id.unwrap();
        let answer = answer_of(&generator, &id);

        assert!(!local.verify("aliyun", &id, &answer));
        assert!(local.verify(LOCAL_CAPTCHA_TYPE, &id, &answer));
        assert!(!local.verify(LOCAL_CAPTCHA_TYPE, &id, &answer));

        let provider = HumanCheckProvider {
            provider_type: "aliyun".to_string(),
            app_key: None,
            scene: None,
        };
        let remote = HumanCheckService::new(Some(provider), generator);
        assert!(remote.verify("aliyun", "", "token"));
        assert!(!remote.verify("aliyun", "", ""));
        assert!(!remote.verify(LOCAL_CAPTCHA_TYPE, "", "token"));
    }

    #[test]
    fn stale_captcha_fails() {
        let (generator, clock) = captcha();
        let challenge = generator.generate();
        let answer = answer_of(&generator, &challenge.id);

        clock.advance(Duration::minutes(6));
        assert!(!generator.verify(&challenge.id, &answer));
    }
}
