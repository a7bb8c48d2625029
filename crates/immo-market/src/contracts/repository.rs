use super::domain::{ContractId, ContractRecord, ContractUpdate};
pub use crate::subscriptions::repository::RepositoryError;

/// Storage for generated contracts.
pub trait ContractRepository: Send + Sync {
    fn insert(&self, record: ContractRecord) -> Result<ContractRecord, RepositoryError>;
    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError>;
    /// Applies the present fields of `update`; `NotFound` when the id is unknown.
    fn apply(&self, update: &ContractUpdate) -> Result<ContractRecord, RepositoryError>;
}
