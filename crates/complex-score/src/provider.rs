use crate::rules::geo::GeoPoint;
use crate::rules::{CategoryRules, Modifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Index-local document identifier.
pub type DocId = u32;

/// Raised by a provider when it cannot interpret a field's stored type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldAccessError {
    #[error("field [{field}] holds {found}, expected {expected}")]
    UnsupportedType {
        field: String,
        expected: &'static str,
        found: String,
    },
}

/// Source of per-document field values.
pub trait FieldValueProvider {
    /// First numeric value of the field, if any.
    fn scalar(&self, field: &str, doc: DocId) -> Result<Option<f64>, FieldAccessError>;

    /// All string values of the field; `None` or an empty list both mean absent.
    fn multi(&self, field: &str, doc: DocId) -> Result<Option<Vec<String>>, FieldAccessError>;

    /// First geo point of the field, if any.
    fn geo(&self, field: &str, doc: DocId) -> Result<Option<GeoPoint>, FieldAccessError>;
}

/// Values of one document, keyed by field name; lives for one scoring call.
///
/// Each shape is kept apart, so a field can be read as a number by a field rule and as
/// keywords by a sort rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValueSnapshot {
    scalars: HashMap<String, f64>,
    points: HashMap<String, GeoPoint>,
    terms: HashMap<String, Vec<String>>,
}

impl FieldValueSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(mut self, field: impl Into<String>, value: f64) -> Self {
        self.scalars.insert(field.into(), value);
        self
    }

    pub fn with_point(mut self, field: impl Into<String>, point: GeoPoint) -> Self {
        self.points.insert(field.into(), point);
        self
    }

    pub fn with_terms<I, S>(mut self, field: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = terms.into_iter().map(Into::into).collect();
        self.terms.insert(field.into(), terms);
        self
    }

    /// Reads every field the category's rules touch, in the shape each rule expects.
    pub fn capture<P: FieldValueProvider + ?Sized>(
        provider: &P,
        doc: DocId,
        rules: &CategoryRules,
    ) -> Result<Self, FieldAccessError> {
        let mut snapshot = Self::new();

        for rule in &rules.field_rules {
            match rule.modifier {
                Modifier::Scalar(_) => {
                    if !snapshot.scalars.contains_key(&rule.field) {
                        if let Some(value) = provider.scalar(&rule.field, doc)? {
                            snapshot.scalars.insert(rule.field.clone(), value);
                        }
                    }
                }
                Modifier::DecayGeoExp(_) => {
                    if !snapshot.points.contains_key(&rule.field) {
                        if let Some(point) = provider.geo(&rule.field, doc)? {
                            snapshot.points.insert(rule.field.clone(), point);
                        }
                    }
                }
            }
        }

        for rule in &rules.sort_rules {
            for field in rule.clauses.iter().filter_map(|clause| clause.field.as_ref()) {
                if snapshot.terms.contains_key(field) {
                    continue;
                }
                if let Some(terms) = provider.multi(field, doc)? {
                    snapshot.terms.insert(field.clone(), terms);
                }
            }
        }

        Ok(snapshot)
    }

    pub fn scalar(&self, field: &str) -> Option<f64> {
        self.scalars.get(field).copied()
    }

    pub fn point(&self, field: &str) -> Option<GeoPoint> {
        self.points.get(field).copied()
    }

    /// Terms of a field; absent fields read as the empty set.
    pub fn terms(&self, field: &str) -> &[String] {
        self.terms.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of captured values across all shapes.
    pub fn len(&self) -> usize {
        self.scalars.len() + self.points.len() + self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A document as supplied to [`JsonDocumentStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDocument {
    pub id: String,
    #[serde(default)]
    pub sub_query_score: f64,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

/// In-memory provider over JSON documents; `DocId` is the position in the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonDocumentStore {
    documents: Vec<JsonDocument>,
}

impl JsonDocumentStore {
    pub fn new(documents: Vec<JsonDocument>) -> Self {
        Self { documents }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, std::io::Error> {
        let documents: Vec<JsonDocument> = serde_json::from_reader(reader)?;
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[JsonDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn field(&self, field: &str, doc: DocId) -> Option<&Value> {
        self.documents
            .get(doc as usize)
            .and_then(|document| document.fields.get(field))
            .filter(|value| !value.is_null())
    }
}

impl FieldValueProvider for JsonDocumentStore {
    fn scalar(&self, field: &str, doc: DocId) -> Result<Option<f64>, FieldAccessError> {
        let Some(value) = self.field(field, doc) else {
            return Ok(None);
        };
        let first = match value {
            Value::Array(items) => match items.first() {
                None => return Ok(None),
                Some(first) => first,
            },
            other => other,
        };
        match first {
            Value::Number(number) => Ok(number.as_f64()),
            other => Err(unsupported(field, "a number", other)),
        }
    }

    fn multi(&self, field: &str, doc: DocId) -> Result<Option<Vec<String>>, FieldAccessError> {
        let Some(value) = self.field(field, doc) else {
            return Ok(None);
        };
        match value {
            Value::Array(items) => {
                let terms = items
                    .iter()
                    .map(|item| keyword(item).ok_or_else(|| unsupported(field, "keywords", item)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((!terms.is_empty()).then_some(terms))
            }
            other => keyword(other)
                .map(|term| Some(vec![term]))
                .ok_or_else(|| unsupported(field, "keywords", other)),
        }
    }

    fn geo(&self, field: &str, doc: DocId) -> Result<Option<GeoPoint>, FieldAccessError> {
        let Some(value) = self.field(field, doc) else {
            return Ok(None);
        };
        parse_geo_value(value)
            .map(Some)
            .ok_or_else(|| unsupported(field, "a geo point", value))
    }
}

// Numbers and booleans are indexed as keywords by their text form.
fn keyword(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn parse_geo_value(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::String(text) => GeoPoint::parse(text).ok(),
        Value::Object(object) => {
            let lat = object.get("lat")?.as_f64()?;
            let lon = object.get("lon")?.as_f64()?;
            Some(GeoPoint::new(lat, lon))
        }
        // GeoJSON order: [lon, lat].
        Value::Array(items) => match items.as_slice() {
            [Value::Number(lon), Value::Number(lat)] => {
                Some(GeoPoint::new(lat.as_f64()?, lon.as_f64()?))
            }
            [first, ..] => parse_geo_value(first),
            [] => None,
        },
        _ => None,
    }
}

fn unsupported(field: &str, expected: &'static str, found: &Value) -> FieldAccessError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    FieldAccessError::UnsupportedType {
        field: field.to_string(),
        expected,
        found: found.to_string(),
    }
}
