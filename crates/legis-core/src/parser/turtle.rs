//! Turtle reader producing a [`Graph`].
//!
//! Parsing is two passes: a nom grammar builds statements, then emission
//! resolves prefixes and the base IRI and allocates blank nodes. Supported:
//! `@prefix`/`@base` and their SPARQL forms, `a`, prefixed names, IRIs,
//! short and long strings with escapes, language tags, datatypes, numeric and
//! boolean literals, `;` and `,` lists, `[ ... ]` blank nodes, comments.
//! Collections are not supported.

use std::collections::HashMap;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, multispace1, not_line_ending, one_of},
    combinator::{all_consuming, cut, map, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use url::Url;

use super::graph::{Graph, RDF_TYPE, Term, XSD_NS};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
enum IriRef {
    Full(String),
    Prefixed(String, String),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Iri(IriRef),
    Blank(String),
    Anon(Vec<PredicateObjects>),
    Literal {
        value: String,
        datatype: Option<IriRef>,
        lang: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    A,
    Iri(IriRef),
}

type PredicateObjects = (Verb, Vec<Node>);

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Prefix(String, String),
    Base(String),
    Triples(Node, Vec<PredicateObjects>),
}

pub fn parse_turtle(text: &str) -> Result<Graph, AppError> {
    let statements = match all_consuming(document)(text) {
        Ok((_, statements)) => statements,
        Err(e) => {
            let at: String = match &e {
                nom::Err::Error(e) | nom::Err::Failure(e) => e.input.chars().take(40).collect(),
                nom::Err::Incomplete(_) => String::new(),
            };
            return Err(AppError::FormatError(format!("Turtle syntax error near {at:?}")));
        }
    };

    let mut emitter = Emitter::default();
    for statement in statements {
        emitter.statement(statement)?;
    }
    if emitter.graph.is_empty() {
        return Err(AppError::FormatError("Turtle document contains no triples".into()));
    }
    Ok(emitter.graph)
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), not_line_ending)(input)
}

/// Whitespace and comments.
fn ws(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn token<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    preceded(ws, inner)
}

fn document(input: &str) -> IResult<&str, Vec<Statement>> {
    terminated(many0(token(statement)), ws)(input)
}

fn statement(input: &str) -> IResult<&str, Statement> {
    alt((
        directive,
        terminated(triples, token(cut(char('.')))),
    ))(input)
}

fn directive(input: &str) -> IResult<&str, Statement> {
    alt((
        map(
            tuple((tag("@prefix"), token(pname_ns), token(iri_ref), token(char('.')))),
            |(_, prefix, iri, _)| Statement::Prefix(prefix.to_string(), iri),
        ),
        map(
            tuple((tag("@base"), token(iri_ref), token(char('.')))),
            |(_, iri, _)| Statement::Base(iri),
        ),
        map(
            tuple((tag_no_case("PREFIX"), token(pname_ns), token(iri_ref))),
            |(_, prefix, iri)| Statement::Prefix(prefix.to_string(), iri),
        ),
        map(preceded(tag_no_case("BASE"), token(iri_ref)), Statement::Base),
    ))(input)
}

fn triples(input: &str) -> IResult<&str, Statement> {
    alt((
        map(pair(subject, cut(predicate_object_list)), |(s, pos)| {
            Statement::Triples(s, pos)
        }),
        map(pair(blank_property_list, opt(predicate_object_list)), |(s, pos)| {
            Statement::Triples(s, pos.unwrap_or_default())
        }),
    ))(input)
}

fn subject(input: &str) -> IResult<&str, Node> {
    // blank labels first: `_` is also a valid prefix name
    alt((blank_label, map(iri, Node::Iri), anon_empty))(input)
}

fn predicate_object_list(input: &str) -> IResult<&str, Vec<PredicateObjects>> {
    let (input, first) = token(predicate_objects)(input)?;
    let (input, rest) = many0(preceded(
        many0_semicolons,
        token(predicate_objects),
    ))(input)?;
    let (input, _) = opt(many0_semicolons)(input)?;

    let mut all = vec![first];
    all.extend(rest);
    Ok((input, all))
}

fn many0_semicolons(input: &str) -> IResult<&str, ()> {
    value((), pair(token(char(';')), many0(token(char(';')))))(input)
}

fn predicate_objects(input: &str) -> IResult<&str, PredicateObjects> {
    pair(verb, cut(object_list))(input)
}

fn verb(input: &str) -> IResult<&str, Verb> {
    alt((
        map(iri, Verb::Iri),
        value(Verb::A, terminated(char('a'), peek_separator)),
    ))(input)
}

/// `a` is only the keyword when followed by whitespace or a term opener.
fn peek_separator(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        Some(c) if c.is_whitespace() || c == '<' || c == '[' || c == '"' || c == '_' => {
            Ok((input, ()))
        }
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    }
}

fn object_list(input: &str) -> IResult<&str, Vec<Node>> {
    separated_list1(token(char(',')), token(object))(input)
}

fn object(input: &str) -> IResult<&str, Node> {
    alt((
        literal,
        blank_label,
        map(iri, Node::Iri),
        anon_empty,
        blank_property_list,
    ))(input)
}

fn blank_label(input: &str) -> IResult<&str, Node> {
    map(preceded(tag("_:"), take_while1(is_name_char)), |l: &str| {
        Node::Blank(l.to_string())
    })(input)
}

fn anon_empty(input: &str) -> IResult<&str, Node> {
    value(Node::Anon(Vec::new()), pair(char('['), token(char(']'))))(input)
}

fn blank_property_list(input: &str) -> IResult<&str, Node> {
    map(
        delimited(char('['), predicate_object_list, token(char(']'))),
        Node::Anon,
    )(input)
}

fn iri(input: &str) -> IResult<&str, IriRef> {
    alt((map(iri_ref, IriRef::Full), prefixed_name))(input)
}

fn iri_ref(input: &str) -> IResult<&str, String> {
    map(delimited(char('<'), take_until(">"), char('>')), |s: &str| {
        s.to_string()
    })(input)
}

fn pname_ns(input: &str) -> IResult<&str, &str> {
    terminated(take_while(is_name_char), char(':'))(input)
}

fn prefixed_name(input: &str) -> IResult<&str, IriRef> {
    let (input, prefix) = pname_ns(input)?;
    let (input, local) = local_name(input)?;
    Ok((input, IriRef::Prefixed(prefix.to_string(), local.to_string())))
}

/// Local part of a prefixed name; may be empty, may contain inner dots but
/// never ends with one (that dot terminates the statement).
fn local_name(input: &str) -> IResult<&str, &str> {
    let end = input
        .find(|c: char| !(is_name_char(c) || c == '.' || c == ':' || c == '%'))
        .unwrap_or(input.len());
    let len = input[..end].trim_end_matches('.').len();
    Ok((&input[len..], &input[..len]))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn literal(input: &str) -> IResult<&str, Node> {
    alt((rdf_literal, numeric_literal, boolean_literal))(input)
}

fn rdf_literal(input: &str) -> IResult<&str, Node> {
    let (input, value) = string(input)?;
    let (input, lang) = opt(lang_tag)(input)?;
    let (input, datatype) = if lang.is_none() {
        opt(preceded(tag("^^"), iri))(input)?
    } else {
        (input, None)
    };
    Ok((
        input,
        Node::Literal {
            value,
            datatype,
            lang: lang.map(str::to_lowercase),
        },
    ))
}

fn lang_tag(input: &str) -> IResult<&str, &str> {
    preceded(
        char('@'),
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            many0(pair(char('-'), take_while1(|c: char| c.is_ascii_alphanumeric()))),
        )),
    )(input)
}

fn string(input: &str) -> IResult<&str, String> {
    alt((
        long_string("\"\"\""),
        long_string("'''"),
        short_string('"'),
        short_string('\''),
    ))(input)
}

fn long_string<'a>(quote: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        map(delimited(tag(quote), take_until(quote), tag(quote)), |s: &str| {
            unescape(s)
        })(input)
    }
}

fn short_string<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        let stop: &str = if quote == '"' { "\"\\\n\r" } else { "'\\\n\r" };
        delimited(
            char(quote),
            map(
                opt(escaped_transform(
                    is_not(stop),
                    '\\',
                    alt((
                        value("\\", char('\\')),
                        value("\"", char('"')),
                        value("'", char('\'')),
                        value("\n", char('n')),
                        value("\r", char('r')),
                        value("\t", char('t')),
                    )),
                )),
                Option::unwrap_or_default,
            ),
            char(quote),
        )(input)
    }
}

fn unescape(s: &str) -> String {
    s.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
        .replace("\\\"", "\"")
        .replace("\\'", "'")
        .replace("\\\\", "\\")
}

fn numeric_literal(input: &str) -> IResult<&str, Node> {
    let (input, number) = number(input)?;
    let datatype = if number.contains('.') { "decimal" } else { "integer" };
    Ok((
        input,
        Node::Literal {
            value: number.to_string(),
            datatype: Some(IriRef::Full(format!("{XSD_NS}{datatype}"))),
            lang: None,
        },
    ))
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
    )))(input)
}

fn boolean_literal(input: &str) -> IResult<&str, Node> {
    let (input, b) = terminated(alt((tag("true"), tag("false"))), peek_not_name)(input)?;
    Ok((
        input,
        Node::Literal {
            value: b.to_string(),
            datatype: Some(IriRef::Full(format!("{XSD_NS}boolean"))),
            lang: None,
        },
    ))
}

fn peek_not_name(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        Some(c) if is_name_char(c) || c == ':' => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
        _ => Ok((input, ())),
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Emitter {
    graph: Graph,
    prefixes: HashMap<String, String>,
    base: Option<String>,
    blank_counter: usize,
}

impl Emitter {
    fn statement(&mut self, statement: Statement) -> Result<(), AppError> {
        match statement {
            Statement::Prefix(prefix, iri) => {
                let resolved = self.resolve_relative(&iri);
                self.prefixes.insert(prefix, resolved);
            }
            Statement::Base(iri) => {
                self.base = Some(self.resolve_relative(&iri));
            }
            Statement::Triples(subject, predicate_objects) => {
                let subject = self.node(subject)?;
                self.predicate_objects(&subject, predicate_objects)?;
            }
        }
        Ok(())
    }

    fn predicate_objects(&mut self, subject: &Term, list: Vec<PredicateObjects>) -> Result<(), AppError> {
        for (verb, objects) in list {
            let predicate = match verb {
                Verb::A => RDF_TYPE.to_string(),
                Verb::Iri(iri) => self.iri(&iri)?,
            };
            for object in objects {
                let object = self.node(object)?;
                self.graph.insert(subject.clone(), predicate.clone(), object);
            }
        }
        Ok(())
    }

    fn node(&mut self, node: Node) -> Result<Term, AppError> {
        Ok(match node {
            Node::Iri(iri) => Term::Iri(self.iri(&iri)?),
            Node::Blank(label) => Term::Blank(label),
            Node::Anon(list) => {
                self.blank_counter += 1;
                let blank = Term::Blank(format!("anon{}", self.blank_counter));
                self.predicate_objects(&blank, list)?;
                blank
            }
            Node::Literal {
                value,
                datatype,
                lang,
            } => Term::Literal {
                value,
                datatype: datatype.map(|d| self.iri(&d)).transpose()?,
                lang,
            },
        })
    }

    fn iri(&self, iri: &IriRef) -> Result<String, AppError> {
        match iri {
            IriRef::Full(iri) => Ok(self.resolve_relative(iri)),
            IriRef::Prefixed(prefix, local) => self
                .prefixes
                .get(prefix)
                .map(|ns| format!("{ns}{local}"))
                .ok_or_else(|| AppError::FormatError(format!("undeclared prefix {prefix:?}"))),
        }
    }

    fn resolve_relative(&self, iri: &str) -> String {
        match &self.base {
            Some(base) if !iri.contains("://") => Url::parse(base)
                .and_then(|b| b.join(iri))
                .map(|u| u.to_string())
                .unwrap_or_else(|_| iri.to_string()),
            _ => iri.to_string(),
        }
    }
}
