//! Route templates
//!
//! A route template is an upstream path whose segments may be placeholders marked
//! with `$`:
//!
//! ```text
//! /subscriptions/$subscriptions/resourceGroups/$resourceGroups/providers/Microsoft.Web/sites/$sites?api-version=2022-03-01
//! ```
//!
//! The `$` marker is distinct from the `{name}` syntax used by hosting layers, so a
//! template can be passed through those layers untouched. Placeholder names come from
//! the path only. In the query string, `$name` is substituted when `name` is one of
//! those path placeholders; any other `$` token, such as the OData `$filter`, is kept
//! as written.
//!
//! Each placeholder is resolved against a [`ResourceId`] by finding the segment-name
//! equal to the placeholder name and taking the following segment as its value.
//! Substitution is a single pass over the tokenized template, so resolved values are
//! never scanned for further placeholders.

use crate::errors::{AggregatorError, Result};
use crate::resource_id::ResourceId;
use hyper::Method;
use hyper::body::Bytes;
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value as JsonValue};

pub const PLACEHOLDER_MARKER: char = '$';

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

#[derive(Clone, Debug)]
pub struct RouteTemplate {
    /// One token per path segment
    segments: Vec<Token>,
    /// Query string split around placeholder occurrences
    query: Option<Vec<Token>>,
    names: IndexSet<String>,
}

/// Splits `query` into literal runs and `$name` tokens naming one of `names`.
/// A name runs over ASCII alphanumerics and `_`.
fn tokenize_query(query: &str, names: &IndexSet<String>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = query;

    while let Some(pos) = rest.find(PLACEHOLDER_MARKER) {
        literal.push_str(&rest[..pos]);
        let after = &rest[pos + PLACEHOLDER_MARKER.len_utf8()..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];

        if names.contains(name) {
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Placeholder(name.to_string()));
        } else {
            literal.push(PLACEHOLDER_MARKER);
            literal.push_str(name);
        }
        rest = &after[len..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Self {
        let (path, query) = match template.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (template, None),
        };

        let mut names = IndexSet::new();
        let segments = path
            .split('/')
            .map(|segment| match segment.strip_prefix(PLACEHOLDER_MARKER) {
                Some(name) if !name.is_empty() => {
                    names.insert(name.to_string());
                    Token::Placeholder(name.to_string())
                }
                _ => Token::Literal(segment.to_string()),
            })
            .collect();
        let query = query.map(|query| tokenize_query(query, &names));

        Self {
            segments,
            query,
            names,
        }
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholder_names(&self) -> &IndexSet<String> {
        &self.names
    }

    /// Resolves every placeholder of this template against `identifier`.
    pub fn resolve(&self, identifier: &ResourceId) -> Result<ParameterBinding> {
        let mut binding = ParameterBinding::default();

        for name in &self.names {
            let value = identifier.value_of(name).ok_or_else(|| {
                AggregatorError::ParameterUnresolved {
                    name: name.clone(),
                    identifier: identifier.to_string(),
                }
            })?;
            binding.insert(name.clone(), value.to_string());
        }

        Ok(binding)
    }

    /// Builds the concrete route for `binding` in one pass over the tokens.
    pub fn expand(&self, binding: &ParameterBinding) -> Result<String> {
        let parts = self
            .segments
            .iter()
            .map(|token| substitute(token, binding))
            .collect::<Result<Vec<_>>>()?;

        let mut route = parts.join("/");
        if let Some(query) = &self.query {
            route.push('?');
            for token in query {
                route.push_str(substitute(token, binding)?);
            }
        }

        Ok(route)
    }

    /// Resolves and expands the template once per identifier, preserving order.
    ///
    /// Fails on the first identifier that leaves a placeholder unresolved.
    pub fn expand_all<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<Vec<ConcreteRequest>> {
        identifiers
            .iter()
            .map(|raw| {
                let identifier = ResourceId::parse(raw.as_ref());
                let binding = self.resolve(&identifier)?;
                let route = self.expand(&binding)?;
                Ok(ConcreteRequest::get(route, binding))
            })
            .collect()
    }
}

fn substitute<'a>(token: &'a Token, binding: &'a ParameterBinding) -> Result<&'a str> {
    match token {
        Token::Literal(text) => Ok(text.as_str()),
        Token::Placeholder(name) => {
            binding
                .get(name)
                .ok_or_else(|| AggregatorError::ParameterUnresolved {
                    name: name.clone(),
                    identifier: String::new(),
                })
        }
    }
}

/// Placeholder name to resolved value, in template order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterBinding(IndexMap<String, String>);

impl ParameterBinding {
    pub fn insert(&mut self, name: String, value: String) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The binding as a JSON object, used as per-item provenance.
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .0
            .iter()
            .map(|(name, value)| (name.clone(), JsonValue::String(value.clone())))
            .collect();
        JsonValue::Object(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBinding {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One upstream call of a fan-out batch, tagged with the binding that produced it.
#[derive(Clone, Debug)]
pub struct ConcreteRequest {
    pub method: Method,
    /// Path and optional query, relative to the management host.
    pub route: String,
    pub body: Option<Bytes>,
    pub binding: ParameterBinding,
}

impl ConcreteRequest {
    pub fn get(route: String, binding: ParameterBinding) -> Self {
        Self {
            method: Method::GET,
            route,
            body: None,
            binding,
        }
    }

    pub fn post(route: String, body: Bytes, binding: ParameterBinding) -> Self {
        Self {
            method: Method::POST,
            route,
            body: Some(body),
            binding,
        }
    }
}
