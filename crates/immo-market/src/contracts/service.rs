use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    ContractDraftRequest, ContractId, ContractRecord, ContractStatus, ContractUpdate, DraftError,
};
use super::generator::{GenerationError, TextGenerator};
use super::repository::{ContractRepository, RepositoryError};

static CONTRACT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_contract_id() -> ContractId {
    let id = CONTRACT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ContractId(format!("ctr-{id:06}"))
}

/// Drafts contracts through a text generator and stores them.
pub struct ContractService<R> {
    repository: Arc<R>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl<R> ContractService<R>
where
    R: ContractRepository + 'static,
{
    pub fn new(repository: Arc<R>, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            repository,
            generator,
        }
    }

    pub async fn generate(
        &self,
        request: ContractDraftRequest,
        now: DateTime<Utc>,
    ) -> Result<ContractRecord, ContractServiceError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(ContractServiceError::GeneratorNotConfigured)?;

        let draft = request.resolve(now.date_naive())?;
        let text = generator.generate(&request.prompt()).await?;
        let summary = request.summary_html(&draft);

        let record = self.repository.insert(ContractRecord {
            id: next_contract_id(),
            contract_type: draft.contract_type,
            client_id: draft.client_id,
            property_id: draft.property_id,
            agency_id: draft.agency_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            value: draft.value,
            status: ContractStatus::Draft,
            terms: format!("{summary}\n{text}"),
            documents: Vec::new(),
            created_at: now,
        })?;

        tracing::info!(
            contract_id = %record.id,
            contract_type = %record.contract_type,
            terms_len = record.terms.len(),
            "contract draft stored"
        );
        Ok(record)
    }

    pub fn update(&self, update: ContractUpdate) -> Result<ContractRecord, ContractServiceError> {
        if update.is_empty() {
            return self
                .repository
                .fetch(&update.id)?
                .ok_or(ContractServiceError::NotFound(update.id));
        }

        match self.repository.apply(&update) {
            Ok(record) => {
                tracing::info!(contract_id = %record.id, status = record.status.as_str(), "contract updated");
                Ok(record)
            }
            Err(RepositoryError::NotFound) => Err(ContractServiceError::NotFound(update.id)),
            Err(other) => Err(other.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContractServiceError {
    #[error("GROQ_API_KEY is not configured")]
    GeneratorNotConfigured,
    #[error(transparent)]
    InvalidDraft(#[from] DraftError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("contract '{0}' not found")]
    NotFound(ContractId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
