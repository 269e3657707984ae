//! Multi-format parsing: every [`RawPayload`] shape becomes raw legal facts.
//!
//! Graph formats (RDF/XML, Turtle) are loaded into a [`graph::Graph`] and
//! their legal resources converted to linked-data records, so all structured
//! sources share one field mapping.

pub mod feed;
pub mod graph;
pub mod linked_data;
pub mod rdf_xml;
pub mod turtle;

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::error::AppError;
use crate::models::{RawLegalFact, RawPayload};

/// Parse with today's date as the fallback for unreadable dates.
pub fn parse(payload: &RawPayload, source_id: &str) -> Vec<RawLegalFact> {
    parse_at(payload, source_id, Utc::now().date_naive())
}

/// Parse a payload. Never fails: a payload that cannot be read at all is
/// logged and yields no facts. Facts keep source document order.
pub fn parse_at(payload: &RawPayload, source_id: &str, today: NaiveDate) -> Vec<RawLegalFact> {
    match try_parse(payload, source_id, today) {
        Ok(facts) => {
            tracing::debug!(source = %source_id, format = payload.kind(), count = facts.len(), "Parsed payload");
            facts
        }
        Err(e) => {
            tracing::warn!(
                source = %source_id,
                format = payload.kind(),
                fault = %e.fault_class(),
                error = %e,
                "Discarding unreadable payload"
            );
            Vec::new()
        }
    }
}

fn try_parse(payload: &RawPayload, source_id: &str, today: NaiveDate) -> Result<Vec<RawLegalFact>, AppError> {
    match payload {
        RawPayload::LinkedData(value) => linked_data::parse_value(value, source_id, today),
        RawPayload::RdfXml(text) => {
            let graph = rdf_xml::parse_rdf_xml(text)?;
            from_graph(&graph, source_id, today)
        }
        RawPayload::Turtle(text) => {
            let graph = turtle::parse_turtle(text)?;
            from_graph(&graph, source_id, today)
        }
        RawPayload::Feed(text) => feed::parse_feed(text, source_id),
    }
}

fn from_graph(graph: &graph::Graph, source_id: &str, today: NaiveDate) -> Result<Vec<RawLegalFact>, AppError> {
    let records = graph.legal_records();
    if records.is_empty() {
        tracing::warn!(source = %source_id, triples = graph.len(), "Graph has no legal resources");
    }
    linked_data::parse_value(&Value::Array(records), source_id, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_linked_data_scenario() {
        let payload = RawPayload::from_body(
            r#"{"@graph":[{"@id":"/eli/akt/2024/1","title":"Test Act","type_document":"ustawa","date_publication":"2024-01-01"}]}"#,
        );

        let facts = parse_at(&payload, "sejm", today());

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].title.as_deref(), Some("Test Act"));
        assert_eq!(facts[0].impact, Some(Impact::High));
        assert_eq!(facts[0].category.as_deref(), Some("ustawa"));
        assert_eq!(facts[0].date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_one_good_one_malformed() {
        let payload = RawPayload::from_body(r#"[{"id":"DU/2024/1","title":"A"}, 42]"#);
        let facts = parse_at(&payload, "isap", today());
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_rdf_xml_goes_through_linked_data_mapping() {
        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                         xmlns:eli="http://data.europa.eu/eli/ontology#">
            <eli:LegalResource rdf:about="https://dziennikustaw.gov.pl/eli/DU/2024/3">
              <eli:title>Ustawa budżetowa</eli:title>
              <eli:type_document rdf:resource="http://ex/resource-type/ustawa"/>
              <eli:date_publication>2024-01-29</eli:date_publication>
            </eli:LegalResource>
          </rdf:RDF>"#;
        let payload = RawPayload::from_body(xml);
        assert_eq!(payload.kind(), "rdf-xml");

        let facts = parse_at(&payload, "du", today());

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].id, "eli-du-eli/DU/2024/3");
        assert_eq!(facts[0].impact, Some(Impact::High));
        assert_eq!(facts[0].date.as_deref(), Some("2024-01-29"));
    }

    #[test]
    fn test_turtle_goes_through_linked_data_mapping() {
        let ttl = "@prefix eli: <http://data.europa.eu/eli/ontology#> .\n\
                   <https://monitorpolski.gov.pl/eli/MP/2024/8> a eli:LegalResource ;\n\
                   eli:title \"Obwieszczenie\" ; eli:date_document \"2024-03-04\" .";
        let payload = RawPayload::from_body(ttl);
        assert_eq!(payload.kind(), "turtle");

        let facts = parse_at(&payload, "mp", today());

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].id, "eli-mp-eli/MP/2024/8");
        assert_eq!(facts[0].title.as_deref(), Some("Obwieszczenie"));
    }

    #[test]
    fn test_unreadable_payloads_yield_nothing() {
        assert!(parse_at(&RawPayload::Turtle("this is not turtle".into()), "mp", today()).is_empty());
        assert!(parse_at(&RawPayload::RdfXml("<a><b></a>".into()), "du", today()).is_empty());
        assert!(parse_at(&RawPayload::LinkedData(Value::Bool(true)), "sejm", today()).is_empty());
        assert!(parse_at(&RawPayload::Feed("<rss><item>".into()), "nfz", today()).is_empty());
    }
}
