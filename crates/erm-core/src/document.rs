//! Raw-document mapping. The store hands over opaque field maps; mapping to
//! domain records never fails. Timestamps may arrive as RFC 3339 strings,
//! epoch-millisecond numbers (legacy imports), or not at all; the missing and
//! unparseable cases substitute the current wall-clock time.

use crate::{canonical_user_set, Mission, SecurityMeasure};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

/// A persisted document: store-assigned identifier plus an opaque field map.
/// Fields may be absent entirely rather than carrying explicit nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

pub fn mission_from_document(doc: &RawDocument) -> Mission {
    let fields = &doc.fields;
    Mission {
        id: doc.id.clone(),
        name: string_field(fields, "name").unwrap_or_default(),
        description: string_field(fields, "description").unwrap_or_default(),
        status: string_field(fields, "status")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default(),
        assigned_to: canonical_user_set(string_list_field(fields, "assignedTo")),
        organization_context: fields
            .get("organizationContext")
            .filter(|value| !value.is_null())
            .cloned(),
        is_auto_generated: fields
            .get("isAutoGenerated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        generated_by: string_field(fields, "generatedBy"),
        created_at: coerce_timestamp(&doc.id, "createdAt", fields.get("createdAt")),
        updated_at: coerce_timestamp(&doc.id, "updatedAt", fields.get("updatedAt")),
    }
}

const MEASURE_FIELDS: [&str; 6] = [
    "missionId",
    "name",
    "description",
    "controlType",
    "createdAt",
    "updatedAt",
];

pub fn measure_from_document(doc: &RawDocument) -> SecurityMeasure {
    let fields = &doc.fields;
    let extra = fields
        .iter()
        .filter(|(key, _)| !MEASURE_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    SecurityMeasure {
        id: doc.id.clone(),
        mission_id: string_field(fields, "missionId").unwrap_or_default(),
        name: string_field(fields, "name").unwrap_or_default(),
        description: string_field(fields, "description").unwrap_or_default(),
        control_type: string_field(fields, "controlType"),
        extra,
        created_at: coerce_timestamp(&doc.id, "createdAt", fields.get("createdAt")),
        updated_at: coerce_timestamp(&doc.id, "updatedAt", fields.get("updatedAt")),
    }
}

/// Coerces a stored timestamp value, substituting "now" when the field is
/// absent or unreadable. Never raises; the substitution is logged at debug
/// level so legacy documents stay traceable.
pub fn coerce_timestamp(doc_id: &str, field: &str, value: Option<&Value>) -> DateTime<Utc> {
    if let Some(parsed) = value.and_then(parse_timestamp_value) {
        return parsed;
    }
    debug!(doc_id, field, "timestamp missing or unparseable, substituting current time");
    Utc::now()
}

fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn string_list_field(fields: &Map<String, Value>, name: &str) -> Vec<String> {
    fields
        .get(name)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
