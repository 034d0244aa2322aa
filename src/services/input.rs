//! Request input normalization
//!
//! Mutating endpoints accept either a JSON object or a multipart form (the
//! latter carrying at most one file). Both land in a [`FormInput`] so the
//! services read fields the same way regardless of encoding.
//!
//! Access lists arrive in several shapes: JSON arrays, comma separated
//! strings, repeated `canView[]` form fields. [`FormInput::acl`] folds them
//! into a clean list of user ids.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::stream;
use serde_json::{Map, Value};
use std::convert::Infallible;

use crate::types::{FirmamentError, Result};

/// File part of a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field the file arrived in
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct FormInput {
    fields: Map<String, Value>,
    file: Option<UploadedFile>,
}

impl FormInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input from a JSON body; an empty body is an empty form
    pub fn from_json_bytes(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| FirmamentError::BadRequest(format!("Invalid JSON: {}", e)))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields: fields
                    .into_iter()
                    .map(|(k, v)| (normalize_key(&k), v))
                    .collect(),
                file: None,
            }),
            Value::Null => Ok(Self::default()),
            _ => Err(FirmamentError::BadRequest(
                "Request body must be a JSON object".into(),
            )),
        }
    }

    /// Parse a buffered `multipart/form-data` body.
    ///
    /// Repeated fields collect into an array. The first part carrying a file
    /// name becomes the upload; further files are rejected.
    pub async fn from_multipart(body: Bytes, boundary: &str) -> Result<Self> {
        let source = stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = multer::Multipart::new(source, boundary);
        let mut input = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = normalize_key(field.name().unwrap_or_default());

            if let Some(file_name) = field.file_name().map(str::to_string) {
                if input.file.is_some() {
                    return Err(FirmamentError::BadRequest(
                        "Only one file may be uploaded per request".into(),
                    ));
                }
                let content_type = field
                    .content_type()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await?;
                input.file = Some(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    bytes,
                });
                continue;
            }

            let text = field.text().await?;
            input.push(name, Value::String(text));
        }

        Ok(input)
    }

    /// Add a field value, turning repeated fields into arrays
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        let key = normalize_key(&key.into());
        match self.fields.get_mut(&key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(key, value);
            }
        }
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn take_file(&mut self) -> Option<UploadedFile> {
        self.file.take()
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Scalar field as text; null and absent are `None`
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(values) => values.first().and_then(scalar_text),
            _ => None,
        }
    }

    /// Trimmed, non-empty text
    pub fn required_text(&self, key: &str) -> Result<String> {
        self.text(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FirmamentError::BadRequest(format!("{} is required", key)))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => match scalar_text(other).as_deref().map(str::trim) {
                Some("true") | Some("1") | Some("on") => Ok(Some(true)),
                Some("false") | Some("0") | Some("off") | Some("") => Ok(Some(false)),
                _ => Err(FirmamentError::BadRequest(format!(
                    "{} must be a boolean",
                    key
                ))),
            },
        }
    }

    /// Date field: RFC 3339 timestamp or plain `YYYY-MM-DD`
    pub fn date(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.text(key) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_date(raw.trim())
                .map(Some)
                .ok_or_else(|| FirmamentError::BadRequest(format!("{} is not a valid date", key))),
        }
    }

    /// Access list field, `None` when absent.
    ///
    /// Accepts arrays, comma separated strings and repeated form fields;
    /// blank and placeholder entries are dropped and duplicates removed.
    pub fn acl(&self, key: &str) -> Option<Vec<String>> {
        let value = self.fields.get(key)?;
        let mut ids: Vec<String> = Vec::new();
        collect_ids(value, &mut ids);
        Some(ids)
    }

    /// List of ids, empty when absent
    pub fn ids(&self, key: &str) -> Vec<String> {
        self.acl(key).unwrap_or_default()
    }
}

/// `canView[]` and `canView` name the same field
fn normalize_key(key: &str) -> String {
    key.strip_suffix("[]").unwrap_or(key).to_string()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn collect_ids(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(values) => values.iter().for_each(|v| collect_ids(v, out)),
        Value::String(s) => {
            for part in s.split(',') {
                let id = part.trim();
                if id.is_empty() || id == "null" || id == "undefined" {
                    continue;
                }
                if !out.iter().any(|existing| existing == id) {
                    out.push(id.to_string());
                }
            }
        }
        Value::Number(n) => {
            let id = n.to_string();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        _ => {}
    }
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
