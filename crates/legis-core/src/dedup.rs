use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::models::{CanonicalLegalFact, CompositeIdentity, UpsertOutcome};
use crate::traits::FactStore;

/// Deduplication over a [`FactStore`].
///
/// Lookups degrade to "assume new": a failed existence check never drops a
/// document, the upsert then decides.
#[derive(Debug, Clone)]
pub struct DedupService<S: FactStore> {
    store: S,
}

impl<S: FactStore> DedupService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn exists(&self, identity: &CompositeIdentity) -> bool {
        match self.store.exists(identity).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%identity, error = %e, "Existence check failed, assuming new");
                false
            }
        }
    }

    /// Candidates whose identity is not stored yet, in input order.
    pub async fn filter_new(&self, candidates: Vec<CanonicalLegalFact>) -> Vec<CanonicalLegalFact> {
        if candidates.is_empty() {
            return candidates;
        }
        let identities: Vec<CompositeIdentity> =
            candidates.iter().map(|f| f.identity.clone()).collect();

        match self.store.existing_identities(&identities).await {
            Ok(existing) => {
                let existing: HashSet<CompositeIdentity> = existing.into_iter().collect();
                candidates
                    .into_iter()
                    .filter(|f| !existing.contains(&f.identity))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(
                    candidates = candidates.len(),
                    error = %e,
                    "Batch existence check failed, assuming all new"
                );
                candidates
            }
        }
    }

    /// Stored facts for `identities`, keyed by identity. A failed lookup
    /// yields an empty map.
    pub async fn stored(
        &self,
        identities: &[CompositeIdentity],
    ) -> HashMap<CompositeIdentity, CanonicalLegalFact> {
        if identities.is_empty() {
            return HashMap::new();
        }
        match self.store.get_by_identities(identities).await {
            Ok(facts) => facts.into_iter().map(|f| (f.identity.clone(), f)).collect(),
            Err(e) => {
                tracing::warn!(
                    identities = identities.len(),
                    error = %e,
                    "Stored fact lookup failed"
                );
                HashMap::new()
            }
        }
    }

    pub async fn upsert(&self, fact: &CanonicalLegalFact) -> Result<UpsertOutcome, AppError> {
        let outcome = self.store.upsert(fact).await?;
        tracing::debug!(identity = %fact.identity, ?outcome, "Upserted fact");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IngestionMethod, RawLegalFact};
    use crate::normalize::normalize;
    use crate::store::MemoryStore;
    use crate::testutil::MockStore;

    fn fact(id: &str) -> CanonicalLegalFact {
        let mut raw = RawLegalFact::new("gov-mz", id);
        raw.date = Some("2024-01-15".into());
        normalize(IngestionMethod::Feed, &raw)
    }

    #[tokio::test]
    async fn test_filter_new_keeps_order_and_drops_stored() {
        let dedup = DedupService::new(MemoryStore::new());
        dedup.upsert(&fact("b")).await.unwrap();

        let fresh = dedup
            .filter_new(vec![fact("a"), fact("b"), fact("c")])
            .await;

        let ids: Vec<_> = fresh.iter().map(|f| f.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(dedup.exists(&fact("b").identity).await);
    }

    #[tokio::test]
    async fn test_lookup_failure_assumes_new() {
        let dedup = DedupService::new(MockStore::failing());

        assert!(!dedup.exists(&fact("a").identity).await);
        let fresh = dedup.filter_new(vec![fact("a"), fact("b")]).await;
        assert_eq!(fresh.len(), 2);
        assert!(dedup.upsert(&fact("a")).await.is_err());
        assert!(dedup.stored(&[fact("a").identity]).await.is_empty());
    }

    #[tokio::test]
    async fn test_stored_returns_known_facts() {
        let dedup = DedupService::new(MemoryStore::new());
        let known = fact("b");
        dedup.upsert(&known).await.unwrap();

        let stored = dedup
            .stored(&[fact("a").identity, known.identity.clone()])
            .await;

        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get(&known.identity), Some(&known));
    }
}
