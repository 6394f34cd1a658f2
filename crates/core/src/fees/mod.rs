//! Outstanding-fee refresh.
//!
//! Runs after people are committed. Every person carrying a tracking-system
//! user id gets one balance lookup; lookups run on a bounded pool and the
//! resulting balances are written back in batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COMMIT_BATCH_SIZE, DEFAULT_FEE_WORKERS};
use crate::errors::Result;
use crate::people::{FeeCandidate, FeeUpdate, PersonRepositoryTrait};
use crate::resources::MemoryGuard;
use crate::upstream::{AssetServiceProvider, FeeBalance};

/// Fee phase counters surfaced in the run result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCounters {
    pub candidates: usize,
    pub fetched: usize,
    pub updated: usize,
    pub failed: usize,
    /// Lookups answered with "no fee endpoint exists".
    pub no_endpoint: usize,
}

/// Normalizes a balance answer to currency precision.
pub fn fee_update(email: &str, balance: &FeeBalance, synced_at: &str) -> FeeUpdate {
    let mut total = balance.total_balance.unwrap_or(Decimal::ZERO).round_dp(2);
    total.rescale(2);
    FeeUpdate {
        email: email.to_string(),
        has_outstanding_fees: total > Decimal::ZERO,
        total_fee_balance: total,
        fee_last_synced_at: synced_at.to_string(),
    }
}

pub struct FeePhase {
    provider: Arc<dyn AssetServiceProvider>,
    person_repository: Arc<dyn PersonRepositoryTrait>,
    guard: Arc<MemoryGuard>,
    workers: usize,
    batch_size: usize,
}

enum Lookup {
    Balance(FeeBalance),
    Skipped,
}

impl FeePhase {
    pub fn new(
        provider: Arc<dyn AssetServiceProvider>,
        person_repository: Arc<dyn PersonRepositoryTrait>,
        guard: Arc<MemoryGuard>,
    ) -> Self {
        Self {
            provider,
            person_repository,
            guard,
            workers: DEFAULT_FEE_WORKERS,
            batch_size: DEFAULT_COMMIT_BATCH_SIZE,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fetches and stores balances for every fee candidate.
    ///
    /// A failed lookup is counted and skipped. A failed write aborts the phase;
    /// `counters` then reflects the batches already written.
    pub async fn run(&self, counters: &mut FeeCounters) -> Result<()> {
        let candidates = self.person_repository.fee_candidates()?;
        counters.candidates = candidates.len();
        if candidates.is_empty() {
            return Ok(());
        }
        info!(
            "[Fees] fetching balances for {} people with {} workers",
            candidates.len(),
            self.workers
        );

        let synced_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let endpoint_missing = AtomicBool::new(false);
        let mut pending: Vec<FeeUpdate> = Vec::with_capacity(self.batch_size);

        let mut lookups = stream::iter(candidates)
            .map(|candidate| self.lookup(candidate, &endpoint_missing))
            .buffer_unordered(self.workers);

        while let Some((candidate, outcome)) = lookups.next().await {
            match outcome {
                Ok(Lookup::Skipped) => counters.no_endpoint += 1,
                Ok(Lookup::Balance(balance)) if !balance.endpoint_found => {
                    if !endpoint_missing.swap(true, Ordering::Relaxed) {
                        warn!("[Fees] tracking system exposes no fee endpoint, skipping fee refresh");
                    }
                    counters.no_endpoint += 1;
                }
                Ok(Lookup::Balance(balance)) => {
                    counters.fetched += 1;
                    pending.push(fee_update(&candidate.email, &balance, &synced_at));
                    if pending.len() >= self.batch_size {
                        let batch = std::mem::take(&mut pending);
                        counters.updated += self.person_repository.apply_fee_updates(batch).await?;
                    }
                }
                Err(err) => {
                    counters.failed += 1;
                    warn!(
                        "[Fees] lookup for {} ({}) failed: {}",
                        candidate.email, candidate.tracking_user_id, err
                    );
                }
            }
        }

        if !pending.is_empty() {
            counters.updated += self.person_repository.apply_fee_updates(pending).await?;
        }
        debug!("[Fees] done: {:?}", counters);
        Ok(())
    }

    async fn lookup(
        &self,
        candidate: FeeCandidate,
        endpoint_missing: &AtomicBool,
    ) -> (FeeCandidate, Result<Lookup>) {
        if endpoint_missing.load(Ordering::Relaxed) {
            return (candidate, Ok(Lookup::Skipped));
        }
        self.guard.wait_for_headroom().await;
        let outcome = self
            .provider
            .get_user_fees(&candidate.tracking_user_id)
            .await
            .map(Lookup::Balance);
        (candidate, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAssetService, InMemoryPeople};
    use crate::people::PersonRecord;
    use crate::resources::MemoryGuardConfig;
    use rust_decimal_macros::dec;

    fn person(email: &str, tracking_id: Option<&str>) -> PersonRecord {
        PersonRecord {
            email: email.to_string(),
            tracking_user_id: tracking_id.map(str::to_string),
            ..Default::default()
        }
    }

    fn phase(provider: Arc<FakeAssetService>, people: Arc<InMemoryPeople>) -> FeePhase {
        FeePhase::new(
            provider,
            people,
            Arc::new(MemoryGuard::new(
                MemoryGuardConfig::default(),
                crate::test_support::idle_memory(),
            )),
        )
        .with_batch_size(2)
    }

    #[test]
    fn balance_is_kept_at_two_places() {
        let update = fee_update(
            "a@x.org",
            &FeeBalance {
                total_balance: Some(dec!(42.5)),
                fees: Vec::new(),
                endpoint_found: true,
            },
            "2026-03-01T00:00:00Z",
        );
        assert_eq!(update.total_fee_balance, dec!(42.50));
        assert_eq!(update.total_fee_balance.to_string(), "42.50");
        assert!(update.has_outstanding_fees);

        let zero = fee_update("b@x.org", &FeeBalance { endpoint_found: true, ..Default::default() }, "t");
        assert!(!zero.has_outstanding_fees);
    }

    #[tokio::test]
    async fn fetches_balances_for_tracking_people_only() {
        let provider = Arc::new(FakeAssetService::default());
        provider.set_fee("u-1", dec!(42.50));
        provider.set_fee("u-2", dec!(0));
        provider.fail_fee("u-3");
        let people = Arc::new(InMemoryPeople::with_rows(vec![
            person("a@x.org", Some("u-1")),
            person("b@x.org", Some("u-2")),
            person("c@x.org", Some("u-3")),
            person("d@x.org", None),
        ]));

        let mut counters = FeeCounters::default();
        phase(provider, people.clone()).run(&mut counters).await.expect("fee phase");

        assert_eq!(counters.candidates, 3);
        assert_eq!(counters.fetched, 2);
        assert_eq!(counters.updated, 2);
        assert_eq!(counters.failed, 1);
        let a = people.get("a@x.org").expect("a");
        assert_eq!(a.total_fee_balance, dec!(42.50));
        assert!(a.has_outstanding_fees);
        assert!(a.fee_last_synced_at.is_some());
        assert!(!people.get("b@x.org").expect("b").has_outstanding_fees);
    }

    #[tokio::test]
    async fn missing_endpoint_leaves_people_untouched() {
        let provider = Arc::new(FakeAssetService::default());
        provider.disable_fee_endpoint();
        let people = Arc::new(InMemoryPeople::with_rows(vec![
            person("a@x.org", Some("u-1")),
            person("b@x.org", Some("u-2")),
        ]));

        let mut counters = FeeCounters::default();
        phase(provider, people.clone()).run(&mut counters).await.expect("fee phase");

        assert_eq!(counters.no_endpoint, 2);
        assert_eq!(counters.updated, 0);
        assert!(people.get("a@x.org").expect("a").fee_last_synced_at.is_none());
    }
}
