use chrono::{DateTime, NaiveDate, Utc};
use legis_core::error::AppError;
use legis_core::models::{CanonicalLegalFact, CompositeIdentity, UpsertOutcome};
use sqlx::{PgPool, Pool, Postgres};

const FACT_COLUMNS: &str = "identity, source_id, document_id, ingestion_method, uri, title, \
     summary, date, impact, category, status, rationale, source_url, created_at, updated_at";

/// Repository for canonical legal facts in PostgreSQL.
#[derive(Clone)]
pub struct FactRepository {
    pool: Pool<Postgres>,
}

impl FactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the fact, or update the mutable fields of the stored one.
    ///
    /// A single statement: the conflict branch only writes when title, summary,
    /// status or rationale differ, so a repeated identical upsert touches
    /// nothing (not even `updated_at`).
    pub async fn upsert(&self, fact: &CanonicalLegalFact) -> Result<UpsertOutcome, AppError> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"
            INSERT INTO legal_facts (identity, source_id, document_id, ingestion_method, uri,
                title, summary, date, impact, category, status, rationale, source_url,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (identity) DO UPDATE SET
                title = EXCLUDED.title,
                summary = EXCLUDED.summary,
                status = EXCLUDED.status,
                rationale = EXCLUDED.rationale,
                updated_at = EXCLUDED.updated_at
            WHERE (legal_facts.title, legal_facts.summary, legal_facts.status, legal_facts.rationale)
                IS DISTINCT FROM (EXCLUDED.title, EXCLUDED.summary, EXCLUDED.status, EXCLUDED.rationale)
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(fact.identity.as_str())
        .bind(&fact.source_id)
        .bind(&fact.document_id)
        .bind(fact.ingestion_method.as_str())
        .bind(&fact.uri)
        .bind(&fact.title)
        .bind(&fact.summary)
        .bind(fact.date)
        .bind(fact.impact.as_str())
        .bind(&fact.category)
        .bind(fact.status.as_str())
        .bind(&fact.rationale)
        .bind(&fact.source_url)
        .bind(fact.created_at)
        .bind(fact.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(match row {
            Some((true,)) => UpsertOutcome::Inserted,
            Some((false,)) => UpsertOutcome::Updated,
            None => UpsertOutcome::Unchanged,
        })
    }

    pub async fn exists(&self, identity: &CompositeIdentity) -> Result<bool, AppError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM legal_facts WHERE identity = $1)")
                .bind(identity.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }

    /// The subset of `identities` already stored.
    pub async fn existing_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CompositeIdentity>, AppError> {
        if identities.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = identities.iter().map(|i| i.as_str().to_string()).collect();
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT identity FROM legal_facts WHERE identity = ANY($1)")
                .bind(keys)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|(identity,)| parse_identity(&identity))
            .collect()
    }

    /// Facts dated on or after `from`, newest first.
    pub async fn query_by_date_range(
        &self,
        from: NaiveDate,
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        let rows = sqlx::query_as::<_, FactRow>(&format!(
            "SELECT {FACT_COLUMNS} FROM legal_facts WHERE date >= $1 ORDER BY date DESC, identity"
        ))
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn get_by_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        if identities.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = identities.iter().map(|i| i.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, FactRow>(&format!(
            "SELECT {FACT_COLUMNS} FROM legal_facts WHERE identity = ANY($1) ORDER BY date DESC, identity"
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn parse_identity(raw: &str) -> Result<CompositeIdentity, AppError> {
    CompositeIdentity::parse(raw)
        .ok_or_else(|| AppError::DatabaseError(format!("Malformed stored identity '{raw}'")))
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct FactRow {
    identity: String,
    source_id: String,
    document_id: String,
    ingestion_method: String,
    uri: Option<String>,
    title: String,
    summary: String,
    date: NaiveDate,
    impact: String,
    category: String,
    status: String,
    rationale: String,
    source_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FactRow> for CanonicalLegalFact {
    type Error = AppError;

    fn try_from(row: FactRow) -> Result<Self, Self::Error> {
        Ok(CanonicalLegalFact {
            identity: parse_identity(&row.identity)?,
            source_id: row.source_id,
            document_id: row.document_id,
            ingestion_method: row.ingestion_method.parse().map_err(AppError::DatabaseError)?,
            uri: row.uri,
            title: row.title,
            summary: row.summary,
            date: row.date,
            impact: row.impact.parse().map_err(AppError::DatabaseError)?,
            category: row.category,
            status: row.status.parse().map_err(AppError::DatabaseError)?,
            rationale: row.rationale,
            source_url: row.source_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// -- Trait implementation --

impl legis_core::traits::FactStore for FactRepository {
    async fn upsert(&self, fact: &CanonicalLegalFact) -> Result<UpsertOutcome, AppError> {
        FactRepository::upsert(self, fact).await
    }

    async fn exists(&self, identity: &CompositeIdentity) -> Result<bool, AppError> {
        FactRepository::exists(self, identity).await
    }

    async fn existing_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CompositeIdentity>, AppError> {
        FactRepository::existing_identities(self, identities).await
    }

    async fn query_by_date_range(
        &self,
        from: NaiveDate,
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        FactRepository::query_by_date_range(self, from).await
    }

    async fn get_by_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        FactRepository::get_by_identities(self, identities).await
    }
}
