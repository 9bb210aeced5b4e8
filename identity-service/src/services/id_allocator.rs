use crate::models::{Application, SignupField, SignupRule};
use crate::services::store::RecordStore;
use crate::services::ServiceError;
use std::sync::Arc;

const MAX_INCREMENTAL_ATTEMPTS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    Random,
    Incremental,
}

impl IdStrategy {
    /// Strategy selected by the application's `ID` signup item.
    pub fn for_application(application: &Application) -> Self {
        match application.signup_item(SignupField::Id).rule {
            SignupRule::Incremental => IdStrategy::Incremental,
            _ => IdStrategy::Random,
        }
    }
}

pub trait IdGenerator: Send + Sync {
    fn generate_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[derive(Clone)]
pub struct IdAllocator {
    store: Arc<dyn RecordStore>,
    generator: Arc<dyn IdGenerator>,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn RecordStore>, generator: Arc<dyn IdGenerator>) -> Self {
        Self { store, generator }
    }

    pub async fn next_id(
        &self,
        strategy: IdStrategy,
        organization: &str,
    ) -> Result<String, ServiceError> {
        match strategy {
            IdStrategy::Random => Ok(self.generator.generate_id()),
            IdStrategy::Incremental => self.next_incremental(organization).await,
        }
    }

    async fn next_incremental(&self, organization: &str) -> Result<String, ServiceError> {
        // No prior user, or a last id that is not a number, starts the sequence at 1.
        let start = self
            .store
            .get_last_user(organization)
            .await?
            .and_then(|user| user.id.parse::<u64>().ok())
            .map_or(1, |last| last.saturating_add(1));

        // Ids are global, so a value held in another organization is skipped.
        for candidate in (start..).take(MAX_INCREMENTAL_ATTEMPTS as usize) {
            let id = candidate.to_string();
            if self.store.get_user_by_id(&id).await?.is_none() {
                return Ok(id);
            }
            tracing::debug!(id = %id, organization = %organization, "Incremental id taken, probing next");
        }

        Err(ServiceError::Internal(anyhow::anyhow!(
            "no free incremental id after {} attempts in organization {}",
            MAX_INCREMENTAL_ATTEMPTS,
            organization
        )))
    }
}
