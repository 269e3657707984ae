use chrono::{Days, NaiveDate, Utc};

use crate::error::AppError;
use crate::models::{CanonicalLegalFact, CompositeIdentity, IngestionMethod};
use crate::traits::FactStore;

/// Window used when the caller gives none.
pub const DEFAULT_RANGE_DAYS: u32 = 30;

/// Optional filters for [`QueryService::get_facts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactQuery {
    pub range_days: Option<u32>,
    pub ingestion_method: Option<IngestionMethod>,
    pub source_id: Option<String>,
}

/// Read side of the catalog.
#[derive(Debug, Clone)]
pub struct QueryService<S: FactStore> {
    store: S,
}

impl<S: FactStore> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Facts dated within the last `range_days` (default 30), newest first.
    pub async fn get_facts(&self, query: &FactQuery) -> Result<Vec<CanonicalLegalFact>, AppError> {
        self.get_facts_at(query, Utc::now().date_naive()).await
    }

    pub async fn get_facts_at(
        &self,
        query: &FactQuery,
        today: NaiveDate,
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        let days = query.range_days.unwrap_or(DEFAULT_RANGE_DAYS);
        let from = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);

        let mut facts = self.store.query_by_date_range(from).await?;
        facts.retain(|f| {
            query.ingestion_method.is_none_or(|m| f.ingestion_method == m)
                && query.source_id.as_deref().is_none_or(|s| f.source_id == s)
        });
        Ok(facts)
    }

    pub async fn get_facts_by_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        if identities.is_empty() {
            return Ok(Vec::new());
        }
        self.store.get_by_identities(identities).await
    }
}
