//! Placeholder parsing and substitution for request templates.
//!
//! Three spellings are recognized:
//!
//! - `{%name%}` a variable with no default
//! - `{%name=default%}` a variable with a literal default
//! - `{%$name%}` a reference to a global parameter
//!
//! Substitution is plain text replacement. A value holding `"` or `\` is
//! inserted as is and can leave the request body invalid JSON.

use regex::{Captures, Regex};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::globals::{is_global, GlobalParams};

const REGEX_PATTERN_PLACEHOLDER: &str = r"\{%(.+?)%\}";

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(REGEX_PATTERN_PLACEHOLDER).unwrap());

/// Text a reference to an unknown global parameter is replaced with.
pub const UNDEFINED_GLOBAL: &str = "undefined";

/// Placeholder names and their current values, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    entries: Vec<(String, String)>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Updates the value of an existing name. Returns `false` if the
    /// template has no such placeholder.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1 = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Entries a user fills in, i.e. everything but global references.
    pub fn user_variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(n, _)| !is_global(n))
    }

    pub fn global_references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(n, _)| is_global(n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for VariableMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Splits the text between `{%` and `%}` into its trimmed name and the
/// default after the first `=`, if any.
fn split_token(inner: &str) -> (&str, Option<&str>) {
    match inner.split_once('=') {
        Some((name, default)) => (name.trim(), Some(default)),
        None => (inner.trim(), None),
    }
}

/// Collects the placeholders of `template`.
///
/// The name is the text before the first `=` (trimmed), the default is
/// everything after it. A repeated name keeps its first position but takes
/// the value of its last occurrence; a bare repeat resets it to empty.
pub fn parse(template: &str) -> VariableMap {
    let mut variables = VariableMap::new();

    for caps in PLACEHOLDER_REGEX.captures_iter(template) {
        let (name, default) = split_token(&caps[1]);
        variables.insert(name, default.unwrap_or_default());
    }

    variables
}

/// Replaces every placeholder known to `variables` in one pass over
/// `template`. Inserted values are never scanned again.
///
/// Names are trimmed the same way [`parse`] trims them. A global reference
/// replaces only the first `{%$name%}` token naming it; a missing global
/// becomes [`UNDEFINED_GLOBAL`]. A plain variable replaces both its bare and
/// its defaulted spelling everywhere.
pub fn substitute(template: &str, variables: &VariableMap, globals: &GlobalParams) -> String {
    let mut used_globals: HashSet<&str> = HashSet::new();

    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            let token = &caps[0];
            let (name, default) = split_token(&caps[1]);

            if is_global(name) {
                if default.is_some() {
                    return token.to_string();
                }
                if let Some(name) = variables.iter().map(|(n, _)| n).find(|n| *n == name) {
                    if used_globals.insert(name) {
                        return globals
                            .get(name)
                            .map(String::as_str)
                            .unwrap_or(UNDEFINED_GLOBAL)
                            .to_string();
                    }
                }
                return token.to_string();
            }

            if default.is_some_and(|d| d.contains('%')) {
                return token.to_string();
            }

            match variables.get(name) {
                Some(value) => value.to_string(),
                None => token.to_string(),
            }
        })
        .into_owned()
}

/// Parses `template`, applies `overrides` and substitutes.
pub fn bind<'a, I>(template: &str, overrides: I, globals: &GlobalParams) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut variables = parse(template);
    for (name, value) in overrides {
        if !variables.set(name, value) {
            tracing::debug!("template has no placeholder named '{}'", name);
        }
    }
    substitute(template, &variables, globals)
}
