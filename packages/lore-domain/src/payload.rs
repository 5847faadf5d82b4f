use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entry::{KnowledgeEntry, SCHEMA_VERSION, Visibility};

pub const CONTENT_PREVIEW_CHARS: usize = 100;

/// First 100 characters of the content, with an ellipsis marker appended
/// when truncated. Stored in the payload as a display fallback for when the
/// content store cannot serve the full text.
pub fn content_preview(content: &str) -> String {
	let mut chars = content.chars();
	let preview: String = chars.by_ref().take(CONTENT_PREVIEW_CHARS).collect();

	if chars.next().is_some() { format!("{preview}...") } else { preview }
}

/// Flatten an entry into vector-index payload form. `content` is replaced by
/// its preview, `tags` is carried both as a list (for array-membership
/// filters) and as a comma-joined string (the decode source), and
/// `custom_fields` is serialized. Absent optionals are omitted entirely.
pub fn encode(entry: &KnowledgeEntry) -> Map<String, Value> {
	let mut payload = Map::new();

	payload.insert("id".to_string(), Value::String(entry.id.to_string()));
	payload.insert("title".to_string(), Value::String(entry.title.clone()));
	payload.insert("content_preview".to_string(), Value::String(content_preview(&entry.content)));
	payload.insert("created_by".to_string(), Value::String(entry.created_by.clone()));
	payload.insert("created_at".to_string(), Value::from(entry.created_at.unix_timestamp()));
	payload.insert("updated_at".to_string(), Value::from(entry.updated_at.unix_timestamp()));
	payload.insert("visibility".to_string(), Value::String(entry.visibility.as_str().to_string()));
	payload.insert(
		"tags".to_string(),
		Value::Array(entry.tags.iter().map(|tag| Value::String(tag.clone())).collect()),
	);
	payload.insert("tags_csv".to_string(), Value::String(entry.tags.join(",")));
	payload.insert("schema_version".to_string(), Value::String(entry.schema_version.clone()));

	if let Some(source) = entry.source.as_ref() {
		payload.insert("source".to_string(), Value::String(source.clone()));
	}
	if let Some(confidence) = entry.confidence {
		payload.insert("confidence".to_string(), Value::from(confidence as f64));
	}
	if let Some(expires_at) = entry.expires_at {
		payload.insert("expires_at".to_string(), Value::from(expires_at.unix_timestamp()));
	}
	if !entry.custom_fields.is_empty() {
		payload.insert(
			"custom_fields_json".to_string(),
			Value::String(Value::Object(entry.custom_fields.clone()).to_string()),
		);
	}

	payload
}

/// Inverse of [`encode`]. `content` is supplied by the caller (content-store
/// read or the stored preview). Keys the codec does not recognize are
/// dropped silently; a payload missing its identity fields yields `None`.
pub fn decode(payload: &Map<String, Value>, content: String) -> Option<KnowledgeEntry> {
	let id = payload.get("id").and_then(Value::as_str).and_then(|raw| Uuid::parse_str(raw).ok())?;
	let title = payload.get("title").and_then(Value::as_str)?.to_string();
	let created_by = payload.get("created_by").and_then(Value::as_str)?.to_string();
	let created_at = timestamp(payload, "created_at")?;
	let updated_at = timestamp(payload, "updated_at")?;
	let visibility = payload
		.get("visibility")
		.and_then(Value::as_str)
		.and_then(Visibility::parse)
		.unwrap_or_default();
	let tags = payload.get("tags_csv").and_then(Value::as_str).map(split_tags).unwrap_or_default();
	let custom_fields = payload
		.get("custom_fields_json")
		.and_then(Value::as_str)
		.and_then(|raw| serde_json::from_str::<Map<String, Value>>(raw).ok())
		.unwrap_or_default();
	let schema_version = payload
		.get("schema_version")
		.and_then(Value::as_str)
		.unwrap_or(SCHEMA_VERSION)
		.to_string();

	Some(KnowledgeEntry {
		id,
		title,
		content,
		created_by,
		created_at,
		updated_at,
		tags,
		visibility,
		source: payload.get("source").and_then(Value::as_str).map(str::to_string),
		confidence: payload.get("confidence").and_then(Value::as_f64).map(|value| value as f32),
		expires_at: timestamp(payload, "expires_at"),
		schema_version,
		custom_fields,
	})
}

/// Preview text stored in a payload, used when the content store has nothing
/// for the entry.
pub fn preview_of(payload: &Map<String, Value>) -> String {
	payload.get("content_preview").and_then(Value::as_str).unwrap_or_default().to_string()
}

fn timestamp(payload: &Map<String, Value>, key: &str) -> Option<OffsetDateTime> {
	let value = payload.get(key)?;
	let seconds = value.as_i64().or_else(|| value.as_f64().map(|raw| raw as i64))?;

	OffsetDateTime::from_unix_timestamp(seconds).ok()
}

fn split_tags(raw: &str) -> Vec<String> {
	if raw.is_empty() {
		Vec::new()
	} else {
		raw.split(',').map(str::to_string).collect()
	}
}
