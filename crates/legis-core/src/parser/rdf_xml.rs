//! RDF/XML reader producing a [`Graph`].
//!
//! Covers the striped syntax ELI publishers emit: `rdf:Description` and typed
//! node elements, `rdf:about` / `rdf:ID` / `rdf:nodeID`, property attributes,
//! `rdf:resource`, `rdf:datatype`, `xml:lang`, `xml:base`, nested node
//! elements and `rdf:parseType="Resource"`.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use url::Url;

use super::graph::{Graph, RDF_NS, RDF_TYPE, Term};
use crate::error::AppError;

struct PropertyFrame {
    subject: Term,
    predicate: String,
    datatype: Option<String>,
    lang: Option<String>,
    text: String,
    object: Option<Term>,
    /// `rdf:parseType="Resource"`: children are properties of `object`.
    nested: bool,
}

/// What an opening element means, given the enclosing frame.
enum Parent {
    Top,
    Subject(Term),
    Value,
}

enum Frame {
    Container,
    Node(Term),
    Property(PropertyFrame),
}

/// Element attributes split into RDF syntax attributes and property attributes.
#[derive(Default)]
struct Attributes {
    about: Option<String>,
    id: Option<String>,
    node_id: Option<String>,
    resource: Option<String>,
    datatype: Option<String>,
    parse_type: Option<String>,
    lang: Option<String>,
    base: Option<String>,
    properties: Vec<(String, String)>,
}

struct RdfXmlReader {
    graph: Graph,
    stack: Vec<Frame>,
    base: Option<String>,
    blank_counter: usize,
}

pub fn parse_rdf_xml(xml: &str) -> Result<Graph, AppError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = RdfXmlReader {
        graph: Graph::new(),
        stack: Vec::new(),
        base: None,
        blank_counter: 0,
    };

    loop {
        let (element_ns, event) = match reader.read_resolved_event() {
            Ok((ns, event)) => (namespace_of(&ns), event),
            Err(e) => return Err(AppError::FormatError(format!("RDF/XML: {e}"))),
        };

        match event {
            Event::Start(ref e) => {
                let iri = element_iri(element_ns.as_deref(), e);
                let attrs = read_attributes(&reader, e)?;
                state.open(iri, attrs);
            }
            Event::Empty(ref e) => {
                let iri = element_iri(element_ns.as_deref(), e);
                let attrs = read_attributes(&reader, e)?;
                state.open(iri, attrs);
                state.close();
            }
            Event::End(_) => state.close(),
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|e| AppError::FormatError(format!("RDF/XML text: {e}")))?;
                state.append_text(&text);
            }
            Event::CData(e) => {
                state.append_text(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if state.graph.is_empty() {
        return Err(AppError::FormatError("RDF/XML document contains no triples".into()));
    }
    Ok(state.graph)
}

impl RdfXmlReader {
    fn open(&mut self, iri: String, attrs: Attributes) {
        if let Some(base) = &attrs.base {
            self.base = Some(base.clone());
        }

        let parent = match self.stack.last() {
            None | Some(Frame::Container) => Parent::Top,
            Some(Frame::Node(subject)) => Parent::Subject(subject.clone()),
            Some(Frame::Property(p)) if p.nested => match &p.object {
                Some(object) => Parent::Subject(object.clone()),
                None => Parent::Value,
            },
            Some(Frame::Property(_)) => Parent::Value,
        };

        match parent {
            Parent::Top if iri == format!("{RDF_NS}RDF") => self.stack.push(Frame::Container),
            Parent::Top => {
                let subject = self.node_element(&iri, &attrs);
                self.stack.push(Frame::Node(subject));
            }
            Parent::Value => {
                // Node element nested inside a property becomes its object.
                let subject = self.node_element(&iri, &attrs);
                if let Some(Frame::Property(p)) = self.stack.last_mut() {
                    p.object = Some(subject.clone());
                }
                self.stack.push(Frame::Node(subject));
            }
            Parent::Subject(subject) => {
                let frame = self.property_element(subject, iri, attrs);
                self.stack.push(Frame::Property(frame));
            }
        }
    }

    fn close(&mut self) {
        if let Some(Frame::Property(p)) = self.stack.pop() {
            let object = match p.object {
                Some(object) => object,
                None => Term::Literal {
                    value: p.text.trim().to_string(),
                    datatype: p.datatype,
                    lang: p.lang,
                },
            };
            self.graph.insert(p.subject, p.predicate, object);
        }
    }

    fn append_text(&mut self, text: &str) {
        if let Some(Frame::Property(p)) = self.stack.last_mut() {
            if p.object.is_none() {
                p.text.push_str(text);
            }
        }
    }

    fn node_element(&mut self, iri: &str, attrs: &Attributes) -> Term {
        let subject = if let Some(about) = &attrs.about {
            Term::Iri(self.resolve(about))
        } else if let Some(id) = &attrs.id {
            Term::Iri(self.resolve(&format!("#{id}")))
        } else if let Some(node_id) = &attrs.node_id {
            Term::Blank(node_id.clone())
        } else {
            self.fresh_blank()
        };

        if iri != format!("{RDF_NS}Description") {
            self.graph
                .insert(subject.clone(), RDF_TYPE, Term::iri(iri));
        }
        for (predicate, value) in &attrs.properties {
            let object = if predicate == RDF_TYPE {
                Term::Iri(self.resolve(value))
            } else {
                Term::Literal {
                    value: value.clone(),
                    datatype: None,
                    lang: attrs.lang.clone(),
                }
            };
            self.graph.insert(subject.clone(), predicate.clone(), object);
        }
        subject
    }

    fn property_element(&mut self, subject: Term, predicate: String, attrs: Attributes) -> PropertyFrame {
        let nested = attrs.parse_type.as_deref() == Some("Resource");
        let object = if let Some(resource) = &attrs.resource {
            Some(Term::Iri(self.resolve(resource)))
        } else if let Some(node_id) = &attrs.node_id {
            Some(Term::Blank(node_id.clone()))
        } else if nested || !attrs.properties.is_empty() {
            Some(self.fresh_blank())
        } else {
            None
        };

        // Property attributes on a property element describe the object node.
        if let Some(object) = &object {
            for (p, value) in &attrs.properties {
                self.graph
                    .insert(object.clone(), p.clone(), Term::literal(value.clone()));
            }
        }

        PropertyFrame {
            subject,
            predicate,
            datatype: attrs.datatype,
            lang: attrs.lang,
            text: String::new(),
            object,
            nested,
        }
    }

    fn fresh_blank(&mut self) -> Term {
        self.blank_counter += 1;
        Term::Blank(format!("b{}", self.blank_counter))
    }

    fn resolve(&self, reference: &str) -> String {
        match &self.base {
            Some(base) => Url::parse(base)
                .and_then(|b| b.join(reference))
                .map(|u| u.to_string())
                .unwrap_or_else(|_| reference.to_string()),
            None => reference.to_string(),
        }
    }
}

fn namespace_of(ns: &ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

fn element_iri(ns: Option<&str>, e: &BytesStart<'_>) -> String {
    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    match ns {
        Some(ns) => format!("{ns}{local}"),
        None => local,
    }
}

fn read_attributes(reader: &NsReader<&[u8]>, e: &BytesStart<'_>) -> Result<Attributes, AppError> {
    let mut attrs = Attributes::default();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| AppError::FormatError(format!("RDF/XML attribute: {e}")))?;
        let raw_key = attr.key.as_ref();
        if raw_key.starts_with(b"xmlns") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| AppError::FormatError(format!("RDF/XML attribute value: {e}")))?
            .into_owned();

        match raw_key {
            b"xml:lang" => attrs.lang = Some(value),
            b"xml:base" => attrs.base = Some(value),
            _ => {
                let iri = attribute_iri(reader, attr.key);
                match iri.strip_prefix(RDF_NS) {
                    Some("about") => attrs.about = Some(value),
                    Some("ID") => attrs.id = Some(value),
                    Some("nodeID") => attrs.node_id = Some(value),
                    Some("resource") => attrs.resource = Some(value),
                    Some("datatype") => attrs.datatype = Some(value),
                    Some("parseType") => attrs.parse_type = Some(value),
                    _ => attrs.properties.push((iri, value)),
                }
            }
        }
    }
    Ok(attrs)
}

fn attribute_iri(reader: &NsReader<&[u8]>, key: QName<'_>) -> String {
    let (ns, local) = reader.resolve_attribute(key);
    let local = String::from_utf8_lossy(local.as_ref()).into_owned();
    match namespace_of(&ns) {
        Some(ns) => format!("{ns}{local}"),
        None => local,
    }
}
