//! In-process [`FactStore`], used by the CLI when no database is configured
//! and by tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{CanonicalLegalFact, CompositeIdentity, UpsertOutcome};
use crate::traits::FactStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    facts: Arc<Mutex<HashMap<CompositeIdentity, CanonicalLegalFact>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|facts| facts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CompositeIdentity, CanonicalLegalFact>>, AppError> {
        self.facts
            .lock()
            .map_err(|_| AppError::Generic("memory store lock poisoned".into()))
    }
}

fn newest_first(facts: &mut [CanonicalLegalFact]) {
    facts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.identity.cmp(&b.identity)));
}

impl FactStore for MemoryStore {
    async fn upsert(&self, fact: &CanonicalLegalFact) -> Result<UpsertOutcome, AppError> {
        let mut facts = self.lock()?;
        match facts.get_mut(&fact.identity) {
            None => {
                facts.insert(fact.identity.clone(), fact.clone());
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored) if stored.same_mutable_fields(fact) => Ok(UpsertOutcome::Unchanged),
            Some(stored) => {
                stored.title = fact.title.clone();
                stored.summary = fact.summary.clone();
                stored.status = fact.status;
                stored.rationale = fact.rationale.clone();
                stored.updated_at = fact.updated_at;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    async fn exists(&self, identity: &CompositeIdentity) -> Result<bool, AppError> {
        Ok(self.lock()?.contains_key(identity))
    }

    async fn existing_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CompositeIdentity>, AppError> {
        let facts = self.lock()?;
        Ok(identities
            .iter()
            .filter(|id| facts.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn query_by_date_range(&self, from: NaiveDate) -> Result<Vec<CanonicalLegalFact>, AppError> {
        let mut found: Vec<CanonicalLegalFact> = self
            .lock()?
            .values()
            .filter(|f| f.date >= from)
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn get_by_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        let facts = self.lock()?;
        let mut found: Vec<CanonicalLegalFact> = identities
            .iter()
            .filter_map(|id| facts.get(id).cloned())
            .collect();
        newest_first(&mut found);
        found.dedup_by(|a, b| a.identity == b.identity);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IngestionMethod, LegalStatus, RawLegalFact};
    use crate::normalize::normalize_at;
    use chrono::{TimeZone, Utc};

    fn fact(id: &str, title: &str, date: &str, hour: u32) -> CanonicalLegalFact {
        let mut raw = RawLegalFact::new("sejm", format!("eli-sejm-{id}"));
        raw.title = Some(title.into());
        raw.date = Some(date.into());
        normalize_at(
            IngestionMethod::StructuredApi,
            &raw,
            Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_later_title_wins() {
        let store = MemoryStore::new();
        let first = fact("DU/2024/1", "Projekt", "2024-01-01", 8);
        let second = fact("DU/2024/1", "Ustawa", "2024-01-01", 9);
        assert_eq!(first.identity, second.identity);

        assert_eq!(store.upsert(&first).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&second).await.unwrap(), UpsertOutcome::Updated);

        let stored = store.get_by_identities(&[first.identity.clone()]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Ustawa");
        assert_eq!(stored[0].created_at, first.created_at);
        assert_eq!(stored[0].updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_repeated_identical_upsert_is_unchanged() {
        let store = MemoryStore::new();
        let f = fact("DU/2024/2", "Ustawa", "2024-01-02", 8);
        store.upsert(&f).await.unwrap();

        let mut again = f.clone();
        again.updated_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        assert_eq!(store.upsert(&again).await.unwrap(), UpsertOutcome::Unchanged);

        let stored = store.get_by_identities(&[f.identity.clone()]).await.unwrap();
        assert_eq!(stored[0].updated_at, f.updated_at);
    }

    #[tokio::test]
    async fn test_update_touches_only_mutable_fields() {
        let store = MemoryStore::new();
        let original = fact("DU/2024/3", "A", "2024-01-03", 8);
        store.upsert(&original).await.unwrap();

        let mut changed = original.clone();
        changed.title = "B".into();
        changed.status = LegalStatus::Repealed;
        changed.category = "other".into();
        changed.source_url = Some("https://elsewhere".into());
        store.upsert(&changed).await.unwrap();

        let stored = &store.get_by_identities(&[original.identity.clone()]).await.unwrap()[0];
        assert_eq!(stored.title, "B");
        assert_eq!(stored.status, LegalStatus::Repealed);
        assert_eq!(stored.category, original.category);
        assert_eq!(stored.source_url, original.source_url);
    }

    #[tokio::test]
    async fn test_query_by_date_range_newest_first() {
        let store = MemoryStore::new();
        for (id, date) in [("a", "2024-01-01"), ("b", "2024-03-01"), ("c", "2024-02-01")] {
            store.upsert(&fact(id, id, date, 8)).await.unwrap();
        }

        let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let dates: Vec<_> = store
            .query_by_date_range(from)
            .await
            .unwrap()
            .iter()
            .map(|f| f.date.to_string())
            .collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-02-01"]);
    }

    #[tokio::test]
    async fn test_existing_identities_subset() {
        let store = MemoryStore::new();
        let stored = fact("x", "x", "2024-01-01", 8);
        let missing = fact("y", "y", "2024-01-01", 8);
        store.upsert(&stored).await.unwrap();

        let found = store
            .existing_identities(&[stored.identity.clone(), missing.identity.clone()])
            .await
            .unwrap();
        assert_eq!(found, vec![stored.identity.clone()]);
        assert!(store.exists(&stored.identity).await.unwrap());
        assert!(!store.exists(&missing.identity).await.unwrap());
    }
}
