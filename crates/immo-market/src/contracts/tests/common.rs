use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::contracts::domain::{ContractDraftRequest, ContractId, ContractRecord, ContractUpdate};
use crate::contracts::generator::{GenerationError, TextGenerator};
use crate::contracts::repository::{ContractRepository, RepositoryError};
use crate::contracts::service::ContractService;

#[derive(Default)]
pub(super) struct MemoryContracts {
    records: Mutex<HashMap<ContractId, ContractRecord>>,
}

impl MemoryContracts {
    pub(super) fn stored(&self) -> Vec<ContractRecord> {
        self.records
            .lock()
            .expect("contracts mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl ContractRepository for MemoryContracts {
    fn insert(&self, record: ContractRecord) -> Result<ContractRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("contracts mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("contracts mutex poisoned")
            .get(id)
            .cloned())
    }

    fn apply(&self, update: &ContractUpdate) -> Result<ContractRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("contracts mutex poisoned");
        let record = guard.get_mut(&update.id).ok_or(RepositoryError::NotFound)?;
        if let Some(terms) = &update.terms {
            record.terms = terms.clone();
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        Ok(record.clone())
    }
}

pub(super) struct UnavailableContracts;

impl ContractRepository for UnavailableContracts {
    fn insert(&self, _record: ContractRecord) -> Result<ContractRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("contracts table offline".to_string()))
    }

    fn fetch(&self, _id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("contracts table offline".to_string()))
    }

    fn apply(&self, _update: &ContractUpdate) -> Result<ContractRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("contracts table offline".to_string()))
    }
}

/// Returns canned text and remembers prompts.
#[derive(Default)]
pub(super) struct ScriptedGenerator {
    pub(super) prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("generator mutex poisoned")
            .push(prompt.to_string());
        Ok("<p>Article 1 : Objet du bail.</p>".to_string())
    }
}

pub(super) struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Api {
            status: 429,
            body: "rate limited".to_string(),
        })
    }
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn draft_body() -> Value {
    json!({
        "type": "bail",
        "jurisdiction": "Sénégal",
        "agency_id": "agency-1",
        "parties": {
            "client_id": "client-4",
            "client": { "nom": "Diop", "prenom": "Moussa" },
            "agence": { "nom": "Teranga Immo" }
        },
        "details": {
            "property_id": "prop-11",
            "monthly_rent": 250000,
            "start_date": "2025-04-01",
            "date_fin": "2026-03-31"
        }
    })
}

pub(super) fn draft_request() -> ContractDraftRequest {
    serde_json::from_value(draft_body()).expect("draft parses")
}

pub(super) fn build_service(
    generator: Option<Arc<dyn TextGenerator>>,
) -> (Arc<ContractService<MemoryContracts>>, Arc<MemoryContracts>) {
    let repository = Arc::new(MemoryContracts::default());
    let service = Arc::new(ContractService::new(repository.clone(), generator));
    (service, repository)
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("json body")
}
