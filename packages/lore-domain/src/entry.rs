use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MIN_CHARS: usize = 10;
pub const CONFIDENCE_MIN: f32 = 1.0;
pub const CONFIDENCE_MAX: f32 = 5.0;
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Visibility class of an entry. Determines which partition of the vector
/// index holds its point; see [`crate::partition`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
	Public,
	Team,
	#[default]
	Private,
}
impl Visibility {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Public => "public",
			Self::Team => "team",
			Self::Private => "private",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"public" => Some(Self::Public),
			"team" => Some(Self::Team),
			"private" => Some(Self::Private),
			_ => None,
		}
	}
}

/// One logical knowledge record. `content` is held verbatim only in the
/// content store; everything else is projected into the vector payload and
/// the metadata row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeEntry {
	pub id: Uuid,
	pub title: String,
	pub content: String,
	pub created_by: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub visibility: Visibility,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub confidence: Option<f32>,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
	pub schema_version: String,
	#[serde(default)]
	pub custom_fields: Map<String, Value>,
}

/// Caller-supplied fields for entry creation. Server-assigned fields
/// (`created_by`, timestamps) are filled in by the synchronizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntryDraft {
	#[serde(default)]
	pub id: Option<Uuid>,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub visibility: Option<Visibility>,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub confidence: Option<f32>,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub custom_fields: Map<String, Value>,
}

/// Partial update. Absent fields are left untouched; `created_by` is not
/// patchable at all.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntryPatch {
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub tags: Option<Vec<String>>,
	#[serde(default)]
	pub visibility: Option<Visibility>,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub confidence: Option<f32>,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub custom_fields: Option<Map<String, Value>>,
}
impl EntryPatch {
	pub fn is_empty(&self) -> bool {
		self.title.is_none()
			&& self.content.is_none()
			&& self.tags.is_none()
			&& self.visibility.is_none()
			&& self.source.is_none()
			&& self.confidence.is_none()
			&& self.expires_at.is_none()
			&& self.custom_fields.is_none()
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationIssue {
	TitleTooShort,
	TitleTooLong,
	ContentTooShort,
	ConfidenceOutOfRange,
	BlankTag,
}
impl ValidationIssue {
	pub fn message(self) -> &'static str {
		match self {
			Self::TitleTooShort => "title must be at least 3 characters",
			Self::TitleTooLong => "title must be at most 200 characters",
			Self::ContentTooShort => "content must be at least 10 characters",
			Self::ConfidenceOutOfRange => "confidence must be between 1 and 5",
			Self::BlankTag => "tags must be non-empty strings",
		}
	}
}

pub fn validate_draft(draft: &EntryDraft) -> Result<(), ValidationIssue> {
	validate_title(&draft.title)?;
	validate_content(&draft.content)?;
	validate_tags(&draft.tags)?;

	if let Some(confidence) = draft.confidence {
		validate_confidence(confidence)?;
	}

	Ok(())
}

pub fn validate_patch(patch: &EntryPatch) -> Result<(), ValidationIssue> {
	if let Some(title) = patch.title.as_deref() {
		validate_title(title)?;
	}
	if let Some(content) = patch.content.as_deref() {
		validate_content(content)?;
	}
	if let Some(tags) = patch.tags.as_deref() {
		validate_tags(tags)?;
	}
	if let Some(confidence) = patch.confidence {
		validate_confidence(confidence)?;
	}

	Ok(())
}

fn validate_title(title: &str) -> Result<(), ValidationIssue> {
	let chars = title.trim().chars().count();

	if chars < TITLE_MIN_CHARS {
		return Err(ValidationIssue::TitleTooShort);
	}
	if chars > TITLE_MAX_CHARS {
		return Err(ValidationIssue::TitleTooLong);
	}

	Ok(())
}

fn validate_content(content: &str) -> Result<(), ValidationIssue> {
	if content.trim().chars().count() < CONTENT_MIN_CHARS {
		return Err(ValidationIssue::ContentTooShort);
	}

	Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationIssue> {
	if tags.iter().any(|tag| tag.trim().is_empty()) {
		return Err(ValidationIssue::BlankTag);
	}

	Ok(())
}

fn validate_confidence(confidence: f32) -> Result<(), ValidationIssue> {
	if !(CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&confidence) {
		return Err(ValidationIssue::ConfidenceOutOfRange);
	}

	Ok(())
}
