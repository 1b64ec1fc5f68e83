//! Label selectors, as sent in `labelSelector` and evaluated by the fake backend and listers
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    iter::FromIterator,
    str::FromStr,
};
use thiserror::Error;

// local type aliases
type Map = BTreeMap<String, String>;
type Expressions = Vec<Expression>;

/// A label selector string could not be parsed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unable to parse label selector {selector:?}: {reason}")]
pub struct ParseSelectorError {
    /// The selector that failed to parse
    pub selector: String,
    /// What was wrong with it
    pub reason: String,
}

/// A selector expression with existing operations
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Expression {
    /// The key's value is one of the set
    In(String, BTreeSet<String>),
    /// The key is absent or its value is not in the set
    NotIn(String, BTreeSet<String>),
    /// The key has exactly this value
    Equal(String, String),
    /// The key is absent or has another value
    NotEqual(String, String),
    /// The key is present
    Exists(String),
    /// The key is absent
    DoesNotExist(String),
}

/// Perform selection on a list of expressions
///
/// All expressions must match. An empty selector matches everything.
///
/// ```
/// use kubegen_core::Selector;
///
/// let selector: Selector = "app=web,tier in (frontend, edge),!legacy".parse().unwrap();
/// let labels = [("app".to_string(), "web".to_string()), ("tier".to_string(), "edge".to_string())].into();
/// assert!(selector.matches(&labels));
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct Selector(Expressions);

impl Selector {
    /// A selector matching every object
    pub fn everything() -> Self {
        Self::default()
    }

    /// Create a selector from a map of key=value label matches
    fn from_map(map: Map) -> Self {
        Self(map.into_iter().map(|(k, v)| Expression::Equal(k, v)).collect())
    }

    /// Indicates whether this label selector matches all objects
    pub fn selects_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every expression matches the given labels
    pub fn matches(&self, labels: &Map) -> bool {
        self.0.iter().all(|expr| expr.matches(labels))
    }

    /// Parse an optional selector string, where `None` selects everything
    pub fn parse_optional(selector: Option<&str>) -> Result<Self, ParseSelectorError> {
        selector.map_or_else(|| Ok(Self::everything()), str::parse)
    }
}

impl Expression {
    fn matches(&self, labels: &Map) -> bool {
        match self {
            Expression::In(key, values) => match labels.get(key) {
                Some(v) => values.contains(v),
                None => false,
            },
            Expression::NotIn(key, values) => match labels.get(key) {
                Some(v) => !values.contains(v),
                None => true,
            },
            Expression::Exists(key) => labels.contains_key(key),
            Expression::DoesNotExist(key) => !labels.contains_key(key),
            Expression::Equal(key, value) => labels.get(key) == Some(value),
            Expression::NotEqual(key, value) => labels.get(key) != Some(value),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &BTreeSet<String>| values.iter().cloned().collect::<Vec<_>>().join(",");
        match self {
            Expression::In(key, values) => write!(f, "{key} in ({})", join(values)),
            Expression::NotIn(key, values) => write!(f, "{key} notin ({})", join(values)),
            Expression::Equal(key, value) => write!(f, "{key}={value}"),
            Expression::NotEqual(key, value) => write!(f, "{key}!={value}"),
            Expression::Exists(key) => write!(f, "{key}"),
            Expression::DoesNotExist(key) => write!(f, "!{key}"),
        }
    }
}

/// Formats as a selector string for the API
impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selectors: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", selectors.join(","))
    }
}

impl FromStr for Selector {
    type Err = ParseSelectorError;

    fn from_str(selector: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| ParseSelectorError {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };
        if selector.trim().is_empty() {
            return Ok(Self::everything());
        }
        split_requirements(selector)
            .ok_or_else(|| fail("unbalanced parentheses"))?
            .into_iter()
            .map(|req| parse_requirement(req).map_err(|reason| fail(&reason)))
            .collect()
    }
}

// Split on commas outside of parenthesized value sets
fn split_requirements(selector: &str) -> Option<Vec<&str>> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&selector[start..]);
    Some(parts)
}

fn parse_requirement(req: &str) -> Result<Expression, String> {
    let req = req.trim();
    if req.is_empty() {
        return Err("empty requirement".into());
    }
    if let Some(key) = req.strip_prefix('!') {
        return Ok(Expression::DoesNotExist(key_of(key)?));
    }
    if let Some((key, value)) = req.split_once("!=") {
        return Ok(Expression::NotEqual(key_of(key)?, value_of(value)?));
    }
    if let Some((key, value)) = req.split_once("==").or_else(|| req.split_once('=')) {
        return Ok(Expression::Equal(key_of(key)?, value_of(value)?));
    }
    if let Some(open) = req.find('(') {
        let set = req[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| format!("expected ')' at the end of {req:?}"))?;
        let values = set
            .split(',')
            .map(value_of)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if values.iter().all(String::is_empty) {
            return Err(format!("set for {req:?} must have at least one value"));
        }
        let head: Vec<&str> = req[..open].split_whitespace().collect();
        return match head.as_slice() {
            [key, "in"] => Ok(Expression::In(key_of(key)?, values)),
            [key, "notin"] => Ok(Expression::NotIn(key_of(key)?, values)),
            _ => Err(format!("expected 'in' or 'notin' in {req:?}")),
        };
    }
    Ok(Expression::Exists(key_of(req)?))
}

fn key_of(raw: &str) -> Result<String, String> {
    let key = raw.trim();
    let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/');
    if key.is_empty() || !key.chars().all(valid) {
        return Err(format!("invalid label key {key:?}"));
    }
    Ok(key.to_string())
}

fn value_of(raw: &str) -> Result<String, String> {
    let value = raw.trim();
    let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if !value.chars().all(valid) {
        return Err(format!("invalid label value {value:?}"));
    }
    Ok(value.to_string())
}

// convenience conversions for Selector

impl FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Expression> for Selector {
    fn from(value: Expression) -> Self {
        Self(vec![value])
    }
}
