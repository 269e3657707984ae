use chrono::{NaiveDate, TimeZone, Utc};
use legis_core::dedup::DedupService;
use legis_core::models::{
    CanonicalLegalFact, CompositeIdentity, Impact, IngestionMethod, LegalStatus, RawLegalFact,
    UpsertOutcome,
};
use legis_core::normalize::normalize_at;
use legis_core::query::{FactQuery, QueryService};

use crate::common::setup_test_repo;

fn fact(source: &str, id: &str, title: &str, date: &str, hour: u32) -> CanonicalLegalFact {
    let mut raw = RawLegalFact::new(source, id);
    raw.title = Some(title.into());
    raw.date = Some(date.into());
    raw.category = Some("ustawa".into());
    raw.impact = Some(Impact::High);
    raw.url = Some("https://api.sejm.gov.pl/eli/acts/DU/2024/1".into());
    normalize_at(
        IngestionMethod::StructuredApi,
        &raw,
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn upsert_inserts_then_updates_mutable_fields() {
    let (repo, _container) = setup_test_repo().await;
    let first = fact("sejm", "eli-sejm-DU/2024/1", "Projekt", "2024-01-01", 8);
    let second = fact("sejm", "eli-sejm-DU/2024/1", "Ustawa", "2024-01-01", 9);

    assert_eq!(repo.upsert(&first).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(repo.upsert(&second).await.unwrap(), UpsertOutcome::Updated);

    let stored = repo
        .get_by_identities(&[first.identity.clone()])
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Ustawa");
    assert_eq!(stored[0].impact, Impact::High);
    assert_eq!(stored[0].ingestion_method, IngestionMethod::StructuredApi);
    assert_eq!(stored[0].created_at, first.created_at);
    assert_eq!(stored[0].updated_at, second.updated_at);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn repeated_identical_upsert_is_unchanged() {
    let (repo, _container) = setup_test_repo().await;
    let original = fact("sejm", "eli-sejm-DU/2024/2", "Ustawa", "2024-01-02", 8);
    repo.upsert(&original).await.unwrap();

    let mut again = original.clone();
    again.updated_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
    assert_eq!(repo.upsert(&again).await.unwrap(), UpsertOutcome::Unchanged);

    let stored = repo
        .get_by_identities(&[original.identity.clone()])
        .await
        .unwrap();
    assert_eq!(stored[0].updated_at, original.updated_at);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn update_leaves_immutable_fields() {
    let (repo, _container) = setup_test_repo().await;
    let original = fact("sejm", "eli-sejm-DU/2024/3", "A", "2024-01-03", 8);
    repo.upsert(&original).await.unwrap();

    let mut changed = original.clone();
    changed.status = LegalStatus::Repealed;
    changed.category = "other".into();
    changed.source_url = None;
    assert_eq!(repo.upsert(&changed).await.unwrap(), UpsertOutcome::Updated);

    let stored = &repo
        .get_by_identities(&[original.identity.clone()])
        .await
        .unwrap()[0];
    assert_eq!(stored.status, LegalStatus::Repealed);
    assert_eq!(stored.category, original.category);
    assert_eq!(stored.source_url, original.source_url);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn existence_checks() {
    let (repo, _container) = setup_test_repo().await;
    let stored = fact("sejm", "eli-sejm-DU/2024/4", "A", "2024-01-04", 8);
    let missing = fact("sejm", "eli-sejm-DU/2024/5", "B", "2024-01-05", 8);
    repo.upsert(&stored).await.unwrap();

    assert!(repo.exists(&stored.identity).await.unwrap());
    assert!(!repo.exists(&missing.identity).await.unwrap());

    let found = repo
        .existing_identities(&[stored.identity.clone(), missing.identity.clone()])
        .await
        .unwrap();
    assert_eq!(found, vec![stored.identity.clone()]);
    assert!(repo.existing_identities(&[]).await.unwrap().is_empty());

    let dedup = DedupService::new(repo.clone());
    let fresh = dedup.filter_new(vec![stored.clone(), missing.clone()]).await;
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].identity, missing.identity);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn query_by_date_range_newest_first() {
    let (repo, _container) = setup_test_repo().await;
    for (id, date) in [("a", "2024-01-01"), ("b", "2024-03-01"), ("c", "2024-02-01")] {
        repo.upsert(&fact("sejm", &format!("eli-sejm-{id}"), id, date, 8))
            .await
            .unwrap();
    }

    let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let dates: Vec<String> = repo
        .query_by_date_range(from)
        .await
        .unwrap()
        .iter()
        .map(|f| f.date.to_string())
        .collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-02-01"]);

    let service = QueryService::new(repo);
    let query = FactQuery {
        range_days: Some(60),
        source_id: Some("sejm".into()),
        ..FactQuery::default()
    };
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    let facts = service.get_facts_at(&query, today).await.unwrap();
    assert_eq!(facts.len(), 2);
    assert_eq!(
        facts[0].identity,
        CompositeIdentity::parse("sejm:b:2024-03-01").unwrap()
    );
}
