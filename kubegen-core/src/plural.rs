//! Derive the plural REST resource name from a type name
//!
//! This is a heuristic rather than a grammar. Irregular plurals belong in the exception table.
use std::collections::HashMap;

/// Plural namer with an exception table
///
/// Exceptions are keyed by the case-sensitive type name and their values are
/// returned lowercased, bypassing the suffix rules.
#[derive(Clone, Debug)]
pub struct Pluralizer {
    exceptions: HashMap<String, String>,
}

impl Default for Pluralizer {
    fn default() -> Self {
        Self::with_exceptions([
            ("Endpoints", "endpoints"),
            ("NodeMetrics", "nodes"),
            ("PodMetrics", "pods"),
        ])
    }
}

impl Pluralizer {
    /// Create a pluralizer with only the given exceptions
    pub fn with_exceptions<I, K, V>(exceptions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            exceptions: exceptions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add or override a single exception
    #[must_use]
    pub fn exception(mut self, singular: &str, plural: &str) -> Self {
        self.exceptions.insert(singular.into(), plural.into());
        self
    }

    /// Return the lowercase plural of `singular`
    pub fn name(&self, singular: &str) -> String {
        if let Some(plural) = self.exceptions.get(singular) {
            return plural.to_ascii_lowercase();
        }
        let chars: Vec<char> = singular.chars().collect();
        if chars.len() < 2 {
            return singular.to_ascii_lowercase();
        }
        // suffixes match lowercase letters only
        let last = chars[chars.len() - 1];
        let before = chars[chars.len() - 2];
        let stem = |n: usize| chars[..chars.len() - n].iter().collect::<String>();

        let plural = match last {
            's' | 'x' | 'z' => format!("{singular}es"),
            'h' if before == 'c' || before == 's' => format!("{singular}es"),
            'y' if is_consonant(before) => format!("{}ies", stem(1)),
            'e' if before == 'f' => format!("{}ves", stem(2)),
            'f' => format!("{}ves", stem(1)),
            _ => format!("{singular}s"),
        };
        plural.to_ascii_lowercase()
    }
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_lowercase() && !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Pluralize a type name with the default exception table
pub fn to_plural(singular: &str) -> String {
    Pluralizer::default().name(singular)
}
