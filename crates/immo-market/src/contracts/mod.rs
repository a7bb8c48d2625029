//! Contract drafting through an LLM and post-generation edits.

pub mod domain;
pub mod generator;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ContractDraftRequest, ContractId, ContractRecord, ContractStatus, ContractUpdate, DraftError,
    DEFAULT_CONTRACT_TYPE,
};
pub use generator::{GenerationError, GroqClient, TextGenerator};
pub use repository::ContractRepository;
pub use router::{contract_router, GENERATE_PATH, UPDATE_PATH};
pub use service::{ContractService, ContractServiceError};
