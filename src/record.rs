//! Event Detail Report records and payload decoding
//!
//! The portal's payload is loosely shaped: identifiers arrive as strings or numbers,
//! codes as numbers or short mnemonics, and extra fields come and go. Decoding keeps
//! whatever it does not model in [`EventRecord::raw_fields`] and only fails when the
//! event identifier or name is missing.

use crate::error::FetchError;
use crate::labels;
use crate::types::EventId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const FIELD_ID: &str = "demoId";
const FIELD_NAME: &str = "demoName";
const FIELD_TYPE: &str = "demoClassCode";
const FIELD_STATUS: &str = "demoStatusCode";
const FIELD_DATE: &str = "demoDate";
const FIELD_LOCKED: &str = "demoLockInd";
const FIELD_INSTRUCTIONS: &str = "demoInstructions";
const FIELD_ITEMS: &str = "itemDetails";

/// Preparation and portioning notes for an event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    /// Preparation text (`demoPrepnTxt`)
    pub preparation: Option<String>,
    /// Portion text (`demoPortnTxt`)
    pub portion: Option<String>,
}

/// One product line attached to an event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    /// `itemNbr`
    pub item_number: String,
    /// `gtin`, shown as the primary item number
    pub primary_item_number: String,
    /// `itemDesc`
    pub description: String,
    /// `vendorNbr`
    pub vendor: String,
    /// `deptNbr`, shown as the category
    pub category: String,
}

/// A decoded Event Detail Report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier as reported by the portal
    pub event_id: EventId,
    /// Event name
    pub name: String,
    /// Numeric event type code, when the portal sent a number
    pub type_code: Option<u32>,
    /// Numeric status code, when the portal sent a number
    pub status_code: Option<u32>,
    /// Scheduled date
    pub scheduled_date: Option<NaiveDate>,
    /// Whether the event is locked for edits
    pub locked: bool,
    /// Preparation and portion notes
    pub instructions: Instructions,
    /// Product lines
    pub items: Vec<ItemDetail>,
    /// Every field not modeled above, as text
    pub raw_fields: BTreeMap<String, String>,
}

impl EventRecord {
    /// Decode a record from the portal's JSON payload
    ///
    /// `requested` is only used for error reporting.
    pub fn from_payload(requested: &EventId, payload: Value) -> Result<Self, FetchError> {
        let mut fields = match payload {
            Value::Object(map) if !map.is_empty() => map,
            Value::Null => return Err(not_found(requested)),
            Value::Object(_) => return Err(not_found(requested)),
            Value::Array(items) if items.is_empty() => return Err(not_found(requested)),
            other => {
                return Err(FetchError::InvalidPayload {
                    event_id: requested.clone(),
                    reason: format!("expected a JSON object, got {}", json_kind(&other)),
                });
            }
        };

        let event_id = fields
            .remove(FIELD_ID)
            .and_then(|v| scalar_text(&v))
            .filter(|s| !s.is_empty())
            .map(EventId::from)
            .ok_or_else(|| invalid(requested, "missing event identifier (demoId)"))?;

        let name = fields
            .remove(FIELD_NAME)
            .and_then(|v| scalar_text(&v))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(requested, "missing event name (demoName)"))?;

        let mut raw_fields = BTreeMap::new();

        let type_code = take_code(&mut fields, FIELD_TYPE, &mut raw_fields);
        let status_code = take_code(&mut fields, FIELD_STATUS, &mut raw_fields);

        let scheduled_date = match fields.remove(FIELD_DATE) {
            Some(value) => {
                let parsed = scalar_text(&value).and_then(|text| parse_date(&text));
                if parsed.is_none() {
                    keep_raw(&mut raw_fields, FIELD_DATE, &value);
                }
                parsed
            }
            None => None,
        };

        let locked = fields
            .remove(FIELD_LOCKED)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let instructions = match fields.remove(FIELD_INSTRUCTIONS) {
            Some(Value::Object(mut map)) => {
                let instructions = Instructions {
                    preparation: map.remove("demoPrepnTxt").and_then(|v| scalar_text(&v)),
                    portion: map.remove("demoPortnTxt").and_then(|v| scalar_text(&v)),
                };
                for (key, value) in map {
                    keep_raw(&mut raw_fields, &format!("{FIELD_INSTRUCTIONS}.{key}"), &value);
                }
                instructions
            }
            Some(Value::Null) | None => Instructions::default(),
            Some(other) => {
                keep_raw(&mut raw_fields, FIELD_INSTRUCTIONS, &other);
                Instructions::default()
            }
        };

        let items = match fields.remove(FIELD_ITEMS) {
            Some(Value::Array(entries)) => entries.iter().filter_map(item_detail).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                keep_raw(&mut raw_fields, FIELD_ITEMS, &other);
                Vec::new()
            }
        };

        for (key, value) in fields {
            keep_raw(&mut raw_fields, &key, &value);
        }

        Ok(Self {
            event_id,
            name,
            type_code,
            status_code,
            scheduled_date,
            locked,
            instructions,
            items,
            raw_fields,
        })
    }

    /// Human-readable event type
    pub fn type_label(&self) -> String {
        labels::event_type_label(
            self.type_code,
            self.raw_fields.get(FIELD_TYPE).map(String::as_str),
        )
    }

    /// Human-readable status
    pub fn status_label(&self) -> String {
        labels::event_status_label(
            self.status_code,
            self.raw_fields.get(FIELD_STATUS).map(String::as_str),
        )
    }

    /// Scheduled date as text, falling back to whatever the portal sent
    pub fn date_label(&self) -> String {
        match self.scheduled_date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => self
                .raw_fields
                .get(FIELD_DATE)
                .cloned()
                .unwrap_or_else(|| labels::NOT_AVAILABLE.to_string()),
        }
    }
}

fn not_found(requested: &EventId) -> FetchError {
    FetchError::NotFound {
        event_id: requested.clone(),
    }
}

fn invalid(requested: &EventId, reason: &str) -> FetchError {
    FetchError::InvalidPayload {
        event_id: requested.clone(),
        reason: reason.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Text form of a scalar value; `None` for null and containers
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn keep_raw(raw: &mut BTreeMap<String, String>, key: &str, value: &Value) {
    let text = match value {
        Value::Null => return,
        Value::Array(_) | Value::Object(_) => value.to_string(),
        scalar => scalar_text(scalar).unwrap_or_default(),
    };
    raw.insert(key.to_string(), text);
}

/// Remove a code field; numeric codes are returned, anything else is kept as raw text
fn take_code(
    fields: &mut Map<String, Value>,
    key: &str,
    raw: &mut BTreeMap<String, String>,
) -> Option<u32> {
    let value = fields.remove(key)?;
    let numeric = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    if numeric.is_none() {
        keep_raw(raw, key, &value);
    }
    numeric
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part
fn parse_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(
            s.trim().to_ascii_uppercase().as_str(),
            "Y" | "YES" | "TRUE" | "1"
        ),
        _ => false,
    }
}

fn item_detail(value: &Value) -> Option<ItemDetail> {
    let map = value.as_object()?;
    let text = |key: &str| map.get(key).and_then(scalar_text).unwrap_or_default();
    Some(ItemDetail {
        item_number: text("itemNbr"),
        primary_item_number: text("gtin"),
        description: text("itemDesc"),
        vendor: text("vendorNbr"),
        category: text("deptNbr"),
    })
}
