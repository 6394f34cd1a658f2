use async_trait::async_trait;

use crate::errors::Result;
use crate::upsert::UpsertStore;

use super::{FeeCandidate, FeeUpdate, PersonFilter, PersonRecord};

#[async_trait]
pub trait PersonRepositoryTrait: UpsertStore<PersonRecord> {
    fn find_by_email(&self, email: &str) -> Result<Option<PersonRecord>>;

    fn list(&self, filter: &PersonFilter) -> Result<Vec<PersonRecord>>;

    /// People that carry a tracking-system user id and can therefore have fees.
    fn fee_candidates(&self) -> Result<Vec<FeeCandidate>>;

    /// Applies one batch of fee balances in a single transaction.
    async fn apply_fee_updates(&self, updates: Vec<FeeUpdate>) -> Result<usize>;
}
