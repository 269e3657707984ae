//! In-memory typed triple store shared by the RDF/XML and Turtle readers.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const ELI_NS: &str = "http://data.europa.eu/eli/ontology#";
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Record field → candidate property local names, most specific first.
const RECORD_FIELDS: &[(&str, &[&str])] = &[
    ("title", &["title", "title_short", "alternative"]),
    ("date_publication", &["date_publication", "date_document", "issued", "date", "created"]),
    ("type_document", &["type_document"]),
    ("subject", &["is_about", "subject"]),
    ("publisher", &["publisher"]),
    ("in_force", &["in_force"]),
    ("description", &["description", "abstract"]),
    ("number", &["number", "id_local"]),
    ("passed_by", &["passed_by"]),
];

/// A node or value in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        lang: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// Lexical value: the IRI, blank label, or literal text.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(v) | Term::Blank(v) => v,
            Term::Literal { value, .. } => value,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    pub fn lang(&self) -> Option<&str> {
        match self {
            Term::Literal { lang, .. } => lang.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

/// Triple store indexed by subject and predicate.
#[derive(Debug, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    seen: HashSet<Triple>,
    by_subject: HashMap<Term, Vec<usize>>,
    by_predicate: HashMap<String, Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subject: Term, predicate: impl Into<String>, object: Term) {
        let predicate = predicate.into();
        let triple = Triple {
            subject,
            predicate,
            object,
        };
        if !self.seen.insert(triple.clone()) {
            return;
        }
        let idx = self.triples.len();
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .push(idx);
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .push(idx);
        self.triples.push(triple);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// All triples matching the pattern; `None` is a wildcard. Insertion order is kept.
    pub fn matching<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&str>,
        object: Option<&Term>,
    ) -> Vec<&'a Triple> {
        let candidates: Box<dyn Iterator<Item = &'a Triple> + 'a> = match (subject, predicate) {
            (Some(s), _) => Box::new(
                self.by_subject
                    .get(s)
                    .into_iter()
                    .flatten()
                    .map(|&i| &self.triples[i]),
            ),
            (None, Some(p)) => Box::new(
                self.by_predicate
                    .get(p)
                    .into_iter()
                    .flatten()
                    .map(|&i| &self.triples[i]),
            ),
            (None, None) => Box::new(self.triples.iter()),
        };

        candidates
            .filter(|t| predicate.is_none_or(|p| t.predicate == p))
            .filter(|t| object.is_none_or(|o| &t.object == o))
            .collect()
    }

    /// Subjects typed as `class_iri`, in first-seen order.
    pub fn subjects_of_type(&self, class_iri: &str) -> Vec<&Term> {
        let class = Term::iri(class_iri);
        let mut seen = HashSet::new();
        self.matching(None, Some(RDF_TYPE), Some(&class))
            .into_iter()
            .map(|t| &t.subject)
            .filter(|subject| seen.insert(*subject))
            .collect()
    }

    /// Objects of the first predicate that has any value for `subject`,
    /// trying each candidate predicate IRI in order.
    pub fn objects<'a>(&'a self, subject: &Term, predicates: &[String]) -> Vec<&'a Term> {
        for p in predicates {
            let found: Vec<&Term> = self
                .matching(Some(subject), Some(p), None)
                .into_iter()
                .map(|t| &t.object)
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Ontology-qualified or generic lookup of a property by local name:
    /// `eli:<name>`, then `dcterms:<name>`, then `dc:<name>`, then any
    /// predicate whose IRI ends in `#<name>` or `/<name>`.
    pub fn lookup<'a>(&'a self, subject: &Term, local_names: &[&str]) -> Vec<&'a Term> {
        for name in local_names {
            let qualified = [
                format!("{ELI_NS}{name}"),
                format!("{DCTERMS_NS}{name}"),
                format!("{DC_NS}{name}"),
            ];
            let found = self.objects(subject, &qualified);
            if !found.is_empty() {
                return found;
            }

            let hash_suffix = format!("#{name}");
            let slash_suffix = format!("/{name}");
            let generic: Vec<&Term> = self
                .matching(Some(subject), None, None)
                .into_iter()
                .filter(|t| t.predicate.ends_with(&hash_suffix) || t.predicate.ends_with(&slash_suffix))
                .map(|t| &t.object)
                .collect();
            if !generic.is_empty() {
                return generic;
            }
        }
        Vec::new()
    }

    /// One linked-data record per legal resource. Expressions realizing a
    /// resource fill in fields the resource lacks and are not emitted on
    /// their own; unattached expressions become records themselves.
    pub fn legal_records(&self) -> Vec<Value> {
        let resources = self.subjects_of_type(&format!("{ELI_NS}LegalResource"));
        let expressions = self.subjects_of_type(&format!("{ELI_NS}LegalExpression"));
        let resource_set: HashSet<&Term> = resources.iter().copied().collect();
        let expression_set: HashSet<&Term> = expressions.iter().copied().collect();
        let realizes = format!("{ELI_NS}realizes");
        let mut absorbed: HashSet<&Term> = HashSet::new();
        let mut records = Vec::new();

        for resource in &resources {
            let mut linked: Vec<&Term> = self
                .lookup(resource, &["is_realized_by"])
                .into_iter()
                .filter(|t| expression_set.contains(t))
                .collect();
            for t in self.matching(None, Some(&realizes), Some(*resource)) {
                if expression_set.contains(&t.subject) {
                    linked.push(&t.subject);
                }
            }
            records.push(self.record(resource, &linked));
            absorbed.extend(linked);
        }

        for expression in expressions {
            if !absorbed.contains(expression) && !resource_set.contains(expression) {
                records.push(self.record(expression, &[]));
            }
        }
        records
    }

    fn record(&self, subject: &Term, fallbacks: &[&Term]) -> Value {
        let mut map = Map::new();
        match subject {
            Term::Iri(iri) => {
                map.insert("@id".into(), Value::String(iri.clone()));
            }
            _ => {
                if let Some(id) = self.lookup_text(subject, &["id_local", "identifier"]) {
                    map.insert("id".into(), Value::String(id));
                }
            }
        }

        for (field, names) in RECORD_FIELDS {
            let value = std::iter::once(subject)
                .chain(fallbacks.iter().copied())
                .find_map(|s| self.display_values(s, names));
            if let Some(value) = value {
                map.insert((*field).into(), Value::String(value));
            }
        }
        Value::Object(map)
    }

    /// Human-readable value(s) of a property: the preferred literal, IRI local
    /// names, or a blank node's own title; several values joined by `, `.
    fn display_values(&self, subject: &Term, names: &[&str]) -> Option<String> {
        let values = self.lookup(subject, names);
        if values.iter().all(|t| t.is_literal()) {
            return self.lookup_text(subject, names);
        }
        let shown: Vec<String> = values
            .into_iter()
            .filter_map(|t| match t {
                Term::Iri(iri) => Some(local_name(iri).to_string()),
                Term::Blank(_) => self.lookup_text(t, &["title", "name", "label", "prefLabel"]),
                Term::Literal { value, .. } => Some(value.clone()),
            })
            .filter(|v| !v.is_empty())
            .collect();
        if shown.is_empty() {
            None
        } else {
            Some(shown.join(", "))
        }
    }

    /// Preferred literal for a property: Polish, then untagged, then anything.
    pub fn lookup_text(&self, subject: &Term, local_names: &[&str]) -> Option<String> {
        let values = self.lookup(subject, local_names);
        values
            .iter()
            .find(|t| t.lang() == Some("pl"))
            .or_else(|| values.iter().find(|t| t.lang().is_none()))
            .or_else(|| values.first())
            .map(|t| t.value().to_string())
    }
}

/// Last path or fragment segment of an IRI.
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().unwrap_or(iri)
}
