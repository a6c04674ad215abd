//! Reduces a raw search response to the fields a reader asked for.
//!
//! Responses may embed literal multi-line text between triple quotes
//! (`"""like this"""`). [`normalize`] rewrites those blocks into ordinary JSON
//! strings before parsing. [`project`] then walks `hits.hits[*]._source` and
//! keeps only the requested fields.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::WorkbenchError;

pub const TRIPLE_QUOTE: &str = "\"\"\"";

/// One step of a path into a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Key(&'a str),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Present(&'a Value),
    Absent,
}

impl<'a> Lookup<'a> {
    pub fn present(self) -> Option<&'a Value> {
        match self {
            Lookup::Present(value) => Some(value),
            Lookup::Absent => None,
        }
    }
}

/// Follows `path` from `value`. A missing key, an out-of-range index or a
/// step into a scalar all yield [`Lookup::Absent`].
pub fn lookup<'a>(value: &'a Value, path: &[Step<'_>]) -> Lookup<'a> {
    let mut current = value;
    for step in path {
        let next = match (step, current) {
            (Step::Key(key), Value::Object(map)) => map.get(*key),
            (Step::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Lookup::Absent,
        }
    }
    Lookup::Present(current)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Present(Value),
    Absent,
}

/// A hit reduced to the requested fields, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    fn from_source(source: Option<&Value>, names: &[String]) -> Self {
        let mut record = Record::default();
        for name in names {
            if record.get(name).is_some() {
                continue;
            }
            let field = match source.map(|s| lookup(s, &[Step::Key(name.as_str())])) {
                Some(Lookup::Present(value)) => Field::Present(value.clone()),
                _ => Field::Absent,
            };
            record.fields.push((name.clone(), field));
        }
        record
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Applies `f` to the value of `name` if present.
    pub fn map_field<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        if let Some((_, Field::Present(value))) = self.fields.iter_mut().find(|(n, _)| n == name) {
            *value = f(value);
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present = self
            .fields
            .iter()
            .filter_map(|(name, field)| match field {
                Field::Present(value) => Some((name, value)),
                Field::Absent => None,
            })
            .collect::<Vec<_>>();
        let mut map = serializer.serialize_map(Some(present.len()))?;
        for (name, value) in present {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ProjectedResult {
    pub total: u64,
    pub hits: Vec<Record>,
}

impl ProjectedResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn to_pretty_json(&self) -> String {
        // Records only hold serde_json values, which always serialize.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Splits a comma separated field list. Names are trimmed, nothing else:
/// duplicates and empty names are kept.
pub fn parse_field_list(fields: &str) -> Vec<String> {
    fields.split(',').map(|f| f.trim().to_string()).collect()
}

/// Rewrites `"""…"""` blocks as ordinary JSON strings.
///
/// The text is split on `"""`; odd segments lie inside a block and get
/// their quotes and newlines escaped. Segments are then joined with `"`.
pub fn clear_triple_quotes(raw: &str) -> String {
    raw.split(TRIPLE_QUOTE)
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 1 {
                segment.replace('"', "\\\"").replace('\n', "\\n")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\"")
}

pub fn try_normalize(raw: &str) -> Result<Value, WorkbenchError> {
    serde_json::from_str(&clear_triple_quotes(raw))
        .map_err(|e| WorkbenchError::MalformedPayload(e.to_string()))
}

/// Parses a raw response, falling back to `{}` when it is not JSON.
pub fn normalize(raw: &str) -> Value {
    try_normalize(raw).unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        Value::Object(Map::new())
    })
}

pub fn try_project(parsed: &Value, fields: &[String]) -> Result<ProjectedResult, WorkbenchError> {
    let total = lookup(parsed, &[Step::Key("hits"), Step::Key("total"), Step::Key("value")])
        .present()
        .and_then(Value::as_u64)
        .ok_or(WorkbenchError::ShapeMismatch("hits.total.value"))?;
    let hits = lookup(parsed, &[Step::Key("hits"), Step::Key("hits")])
        .present()
        .and_then(Value::as_array)
        .ok_or(WorkbenchError::ShapeMismatch("hits.hits"))?;

    let hits = hits
        .iter()
        .filter_map(|hit| match lookup(hit, &[Step::Key("_source")]) {
            Lookup::Absent => None,
            Lookup::Present(source) if is_blank(source) => None,
            Lookup::Present(source @ Value::Object(_)) => Some(Record::from_source(Some(source), fields)),
            Lookup::Present(_) => Some(Record::from_source(None, fields)),
        })
        .collect();

    Ok(ProjectedResult { total, hits })
}

/// `null`, `false`, `0` and `""` count as no source at all.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Projects a search envelope, degrading to an empty result on any shape
/// mismatch.
pub fn project(parsed: &Value, fields: &[String]) -> ProjectedResult {
    try_project(parsed, fields).unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        ProjectedResult::default()
    })
}

pub fn project_text(raw: &str, fields: &[String]) -> ProjectedResult {
    project(&normalize(raw), fields)
}

/// Reads an already projected payload (`{"total": n, "hits": [..]}`) and
/// reduces its records to `fields`. Records may be flat or still carry a
/// `_source`.
pub fn records_from_projected(parsed: &Value, fields: &[String]) -> ProjectedResult {
    let Some(items) = lookup(parsed, &[Step::Key("hits")]).present().and_then(Value::as_array) else {
        return ProjectedResult::default();
    };

    let hits: Vec<Record> = items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| match lookup(item, &[Step::Key("_source")]) {
            Lookup::Present(source @ Value::Object(_)) => Record::from_source(Some(source), fields),
            _ => Record::from_source(Some(item), fields),
        })
        .collect();
    let total = lookup(parsed, &[Step::Key("total")])
        .present()
        .and_then(Value::as_u64)
        .unwrap_or(hits.len() as u64);

    ProjectedResult { total, hits }
}

/// Projects `primary`; when that yields no hits, tries `previous`, a text
/// that may itself be an earlier projection.
pub fn project_with_fallback(primary: &str, previous: Option<&str>, fields: &[String]) -> ProjectedResult {
    let first = project_text(primary, fields);
    if !first.is_empty() {
        return first;
    }

    let Some(previous) = previous else {
        return first;
    };
    tracing::debug!("no hits in primary payload, trying the previous one");
    let parsed = normalize(previous);
    if let Ok(second) = try_project(&parsed, fields) {
        if !second.is_empty() {
            return second;
        }
    }
    let second = records_from_projected(&parsed, fields);
    if !second.is_empty() {
        return second;
    }

    first
}

/// Pretty-prints the JSON spanning the first `{` to the last `}` of `text`
/// (or `[`..`]` when there is no `{` at all), keeping the text around it on
/// separate lines. Returns `text` unchanged when that span is not JSON.
pub fn format_embedded_json(text: &str) -> String {
    let span = match text.find('{') {
        Some(first) => text.rfind('}').map(|last| (first, last)),
        None => text.find('[').zip(text.rfind(']')),
    };
    let Some((first, last)) = span.filter(|(first, last)| first < last) else {
        return text.to_string();
    };

    let Ok(value) = serde_json::from_str::<Value>(&text[first..=last]) else {
        return text.to_string();
    };
    let Ok(pretty) = serde_json::to_string_pretty(&value) else {
        return text.to_string();
    };

    let mut parts = vec![&text[..first], pretty.as_str()];
    if last + 1 < text.len() {
        parts.push(&text[last + 1..]);
    }
    parts.join("\n")
}
