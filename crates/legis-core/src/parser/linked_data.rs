//! Linked-data JSON (ELI API / JSON-LD) records → [`RawLegalFact`].

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::classify::classify_impact;
use crate::error::AppError;
use crate::identity::qualify;
use crate::models::{IngestionMethod, RawLegalFact};
use crate::util::{SUMMARY_MAX_CHARS, clean_text, parse_date_lenient, sanitize_id, truncate_chars};

/// Container fields that hold a list of records.
const GRAPH_FIELDS: &[&str] = &["@graph", "items", "results", "data"];

const ID_FIELDS: &[&str] = &["@id", "id", "ELI", "eli", "identifier", "address"];
const URI_FIELDS: &[&str] = &["@id", "ELI", "eli"];
const TITLE_FIELDS: &[&str] = &["title", "short_title", "shortTitle"];
const DATE_FIELDS: &[&str] = &[
    "date_publication",
    "datePublication",
    "promulgation",
    "date_document",
    "dateDocument",
    "date",
    "announcementDate",
];
const TYPE_FIELDS: &[&str] = &["type_document", "typeDocument", "type"];
const SUBJECT_FIELDS: &[&str] = &["subject", "keywords"];
const PUBLISHER_FIELDS: &[&str] = &["publisher"];
const STATUS_FIELDS: &[&str] = &["in_force", "inForce", "status"];
const DESCRIPTION_FIELDS: &[&str] = &["description", "abstract"];
const NUMBER_FIELDS: &[&str] = &["number", "pos", "id_local"];
const BODY_FIELDS: &[&str] = &["passed_by", "releasedBy"];
const URL_FIELDS: &[&str] = &["url", "link", "href", "textHTML"];

/// Split a payload into its records: a graph-array field, a bare array, or a
/// single record object.
pub fn records(value: &Value) -> Result<Vec<&Value>, AppError> {
    match value {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(map) => {
            for field in GRAPH_FIELDS {
                if let Some(Value::Array(items)) = map.get(*field) {
                    return Ok(items.iter().collect());
                }
            }
            Ok(vec![value])
        }
        other => Err(AppError::FormatError(format!(
            "expected a JSON object or array, got {}",
            json_kind(other)
        ))),
    }
}

/// Map one record. `today` stands in for a missing or unreadable date.
pub fn parse_record(
    record: &Value,
    source_id: &str,
    today: NaiveDate,
) -> Result<RawLegalFact, AppError> {
    let map = record.as_object().ok_or_else(|| {
        AppError::FormatError(format!("record is a JSON {}, not an object", json_kind(record)))
    })?;

    let native_id = first_text(map, ID_FIELDS)
        .ok_or_else(|| AppError::FormatError("record has no identifier".into()))?;
    let local_id = sanitize_id(&native_id);
    if !local_id.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::FormatError(format!(
            "identifier {native_id:?} has no usable characters"
        )));
    }

    let document_type = first_text(map, TYPE_FIELDS);
    let date = first_text(map, DATE_FIELDS)
        .as_deref()
        .and_then(parse_date_lenient)
        .unwrap_or(today);

    let text = first_text(map, DESCRIPTION_FIELDS)
        .and_then(|d| clean_text(&d))
        .or_else(|| metadata_line(map));

    let uri = first_text(map, URI_FIELDS);
    let url = first_text(map, URL_FIELDS)
        .or_else(|| uri.clone().filter(|u| u.starts_with("http")));

    Ok(RawLegalFact {
        source_id: source_id.to_string(),
        id: qualify(IngestionMethod::StructuredApi, source_id, &local_id),
        title: first_text(map, TITLE_FIELDS).and_then(|t| clean_text(&t)),
        description: text.as_deref().map(|t| truncate_chars(t, SUMMARY_MAX_CHARS)),
        date: Some(date.format("%Y-%m-%d").to_string()),
        impact: Some(classify_impact(document_type.as_deref().unwrap_or_default())),
        category: document_type,
        status: first_text(map, STATUS_FIELDS),
        rationale: text,
        uri,
        url,
    })
}

/// Parse every record, skipping malformed ones with a warning.
pub fn parse_value(value: &Value, source_id: &str, today: NaiveDate) -> Result<Vec<RawLegalFact>, AppError> {
    let mut facts = Vec::new();
    for (index, record) in records(value)?.into_iter().enumerate() {
        match parse_record(record, source_id, today) {
            Ok(fact) => facts.push(fact),
            Err(e) => {
                tracing::warn!(source = %source_id, record = index, error = %e, "Skipping malformed record");
            }
        }
    }
    Ok(facts)
}

/// Secondary metadata folded into one line, used when a record has no description.
fn metadata_line(map: &Map<String, Value>) -> Option<String> {
    let parts: Vec<String> = [
        ("Number", NUMBER_FIELDS),
        ("Publisher", PUBLISHER_FIELDS),
        ("Enacted by", BODY_FIELDS),
        ("Subjects", SUBJECT_FIELDS),
    ]
    .into_iter()
    .filter_map(|(label, fields)| first_text(map, fields).map(|v| format!("{label}: {v}")))
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// First non-blank textual value among `fields`.
fn first_text(map: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| map.get(*f))
        .find_map(text_of)
}

/// Text of a JSON-LD value: plain scalars, `{"@value"}` / `{"@id"}` wrappers,
/// or arrays (Polish-tagged value preferred for language maps, otherwise all
/// values joined).
fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => {
            return map
                .get("@value")
                .or_else(|| map.get("@id"))
                .or_else(|| map.get("name"))
                .and_then(text_of);
        }
        Value::Array(items) => {
            let polish = items.iter().find(|v| {
                v.get("@language").and_then(Value::as_str) == Some("pl")
            });
            if let Some(v) = polish {
                return text_of(v);
            }
            let tagged = items.iter().any(|v| v.get("@language").is_some());
            if tagged {
                return items.iter().find_map(text_of);
            }
            items.iter().filter_map(text_of).collect::<Vec<_>>().join(", ")
        }
        Value::Null => String::new(),
    };
    if text.is_empty() { None } else { Some(text) }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_graph_array_record() {
        let payload = json!({"@graph": [{
            "@id": "/eli/akt/2024/1",
            "title": "Test Act",
            "type_document": "ustawa",
            "date_publication": "2024-01-01"
        }]});

        let facts = parse_value(&payload, "sejm", today()).unwrap();

        assert_eq!(facts.len(), 1);
        let fact = &facts[0];
        assert_eq!(fact.id, "eli-sejm-eli/akt/2024/1");
        assert_eq!(fact.title.as_deref(), Some("Test Act"));
        assert_eq!(fact.impact, Some(Impact::High));
        assert_eq!(fact.category.as_deref(), Some("ustawa"));
        assert_eq!(fact.date.as_deref(), Some("2024-01-01"));
        assert_eq!(fact.uri.as_deref(), Some("/eli/akt/2024/1"));
    }

    #[test]
    fn test_sejm_items_shape() {
        let payload = json!({
            "totalCount": 2,
            "items": [
                {
                    "ELI": "DU/2024/17",
                    "address": "WDU20240000017",
                    "title": "Rozporządzenie  Ministra\nZdrowia",
                    "type": "Rozporządzenie",
                    "promulgation": "2024-01-05",
                    "status": "obowiązujący",
                    "keywords": ["ochrona zdrowia", "apteki"],
                    "releasedBy": ["MIN. ZDROWIA"],
                    "pos": 17
                },
                {
                    "ELI": "DU/2024/18",
                    "title": "Obwieszczenie",
                    "type": "Obwieszczenie",
                    "promulgation": "05.01.2024"
                }
            ]
        });

        let facts = parse_value(&payload, "sejm", today()).unwrap();

        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].id, "eli-sejm-DU/2024/17");
        assert_eq!(facts[0].title.as_deref(), Some("Rozporządzenie Ministra Zdrowia"));
        assert_eq!(facts[0].impact, Some(Impact::Medium));
        assert_eq!(facts[0].status.as_deref(), Some("obowiązujący"));
        let rationale = facts[0].rationale.as_deref().unwrap();
        assert!(rationale.contains("Number: 17"));
        assert!(rationale.contains("Enacted by: MIN. ZDROWIA"));
        assert!(rationale.contains("Subjects: ochrona zdrowia, apteki"));
        assert_eq!(facts[1].impact, Some(Impact::Low));
        assert_eq!(facts[1].date.as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn test_single_record_and_bare_array() {
        let single = json!({"id": "MP/2024/3", "title": "Uchwała"});
        assert_eq!(parse_value(&single, "mp", today()).unwrap().len(), 1);

        let array = json!([{"id": "a"}, {"id": "b"}, {"id": "c"}]);
        let ids: Vec<_> = parse_value(&array, "isap", today())
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["eli-isap-a", "eli-isap-b", "eli-isap-c"]);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let payload = json!({"items": [
            {"ELI": "DU/2024/1", "title": "Dobry"},
            {"title": "Bez identyfikatora"},
            "not a record",
            {"ELI": "???"}
        ]});

        let facts = parse_value(&payload, "sejm", today()).unwrap();

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].title.as_deref(), Some("Dobry"));
    }

    #[test]
    fn test_unreadable_date_falls_back_to_today() {
        let payload = json!({"id": "x", "date": "wkrótce"});
        let facts = parse_value(&payload, "isap", today()).unwrap();
        assert_eq!(facts[0].date.as_deref(), Some("2024-06-01"));
    }

    #[test]
    fn test_description_truncated_rationale_kept() {
        let long = "a".repeat(800);
        let payload = json!({"id": "x", "description": long});
        let facts = parse_value(&payload, "isap", today()).unwrap();
        assert_eq!(facts[0].description.as_deref().unwrap().chars().count(), SUMMARY_MAX_CHARS);
        assert_eq!(facts[0].rationale.as_deref().unwrap().len(), 800);
    }

    #[test]
    fn test_language_tagged_values_prefer_polish() {
        let payload = json!({
            "@id": "https://eli.gov.pl/eli/DU/2024/9",
            "title": [
                {"@value": "Act on things", "@language": "en"},
                {"@value": "Ustawa o rzeczach", "@language": "pl"}
            ]
        });
        let facts = parse_value(&payload, "du", today()).unwrap();
        assert_eq!(facts[0].title.as_deref(), Some("Ustawa o rzeczach"));
        assert_eq!(facts[0].id, "eli-du-eli/DU/2024/9");
        assert_eq!(facts[0].url.as_deref(), Some("https://eli.gov.pl/eli/DU/2024/9"));
    }

    #[test]
    fn test_scalar_payload_is_an_error() {
        assert!(parse_value(&json!("nope"), "sejm", today()).is_err());
    }
}
