//! DID URL parsing.
//!
//! A DID URL has the shape
//!
//! ```text
//! did:<method>:<method-specific-id>[<path>][?<query>][#<fragment>]
//! ```
//!
//! The whole string is matched by a single anchored regular expression; the
//! query component is then split into a key/value map.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::InvalidDidError;

static DID_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^did:([a-z0-9]+):([a-zA-Z0-9:.\-_]+)([^?#]*)?(\?([^#]*))?(#(.*))?$")
        .expect("DID URL pattern should compile")
});

/// A single query parameter value.
///
/// A key that appears once maps to [`QueryValue::One`]; a key repeated in the
/// query string collects every value, in order, into [`QueryValue::Many`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// The first value for this key.
    pub fn first(&self) -> &str {
        match self {
            QueryValue::One(v) => v,
            QueryValue::Many(vs) => vs.first().map(String::as_str).unwrap_or_default(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::One(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Many(vec![first, value]);
            }
            QueryValue::Many(vs) => vs.push(value),
        }
    }

    fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::One(v) => vec![v.as_str()],
            QueryValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::One(s.to_string())
    }
}

/// The components of a parsed DID URL.
///
/// Absent components are represented by empty values rather than `None`, so
/// `did:example:abc` has `path == ""`, an empty `query`, and `fragment == ""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidUrl {
    /// The bare DID, `did:<method>:<id>`.
    pub did: String,
    /// The DID method name, e.g. `web`.
    pub method: String,
    /// The method-specific identifier. May itself contain `:`.
    pub id: String,
    /// Everything between the identifier and `?`/`#`, e.g. `/hello/world`.
    pub path: String,
    pub query: BTreeMap<String, QueryValue>,
    pub fragment: String,
}

impl DidUrl {
    /// First value of a query parameter, if present.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(QueryValue::first)
    }

    /// `did:<method>:<id>#<fragment>`: the id of a resource inside the DID
    /// document. Without a fragment this is just the DID.
    pub fn resource_id(&self) -> String {
        if self.fragment.is_empty() {
            self.did.clone()
        } else {
            format!("{}#{}", self.did, self.fragment)
        }
    }
}

/// Parse a DID URL into its components.
///
/// # Errors
///
/// Returns [`InvalidDidError`] when `input` does not match the DID URL grammar:
/// a missing `did:` scheme, an empty or upper-case method, or an empty
/// method-specific id.
pub fn parse_did_url(input: &str) -> Result<DidUrl, InvalidDidError> {
    let caps = DID_URL.captures(input).ok_or(InvalidDidError)?;

    let method = caps.get(1).map_or("", |m| m.as_str());
    let id = caps.get(2).map_or("", |m| m.as_str());
    let path = caps.get(3).map_or("", |m| m.as_str());
    let query_string = caps.get(5).map_or("", |m| m.as_str());
    let fragment = caps.get(7).map_or("", |m| m.as_str());

    Ok(DidUrl {
        did: format!("did:{method}:{id}"),
        method: method.to_string(),
        id: id.to_string(),
        path: path.to_string(),
        query: parse_query(query_string),
        fragment: fragment.to_string(),
    })
}

impl FromStr for DidUrl {
    type Err = InvalidDidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_did_url(s)
    }
}

/// Re-assembles the URL. Query parameters are written in key order and
/// percent-encoded, so the output may differ textually from the input.
impl fmt::Display for DidUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.did, self.path)?;
        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .flat_map(|(k, v)| {
                    v.values().into_iter().map(move |value| {
                        format!("{}={}", urlencoding::encode(k), urlencoding::encode(value))
                    })
                })
                .collect();
            write!(f, "?{}", pairs.join("&"))?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn parse_query(query: &str) -> BTreeMap<String, QueryValue> {
    let mut out: BTreeMap<String, QueryValue> = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        if key.is_empty() {
            continue;
        }
        let value = decode_component(raw_value);
        match out.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                out.insert(key, QueryValue::One(value));
            }
        }
    }
    out
}

/// `+` is a space; malformed percent escapes are kept as-is.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
