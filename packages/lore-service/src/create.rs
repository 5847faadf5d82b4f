use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, LoreService, Permission, Result};
use lore_domain::{
	entry::{self, EntryDraft, KnowledgeEntry},
	partition, payload,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateEntryRequest {
	pub subject: String,
	pub entry: EntryDraft,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateEntryResponse {
	pub id: Uuid,
}

impl LoreService {
	/// Create one entry across all three stores: content first (non-fatal),
	/// then the vector point in its partition, then the summary row. A
	/// failure after the first write leaves the committed prefix in place.
	pub async fn create_entry(&self, req: CreateEntryRequest) -> Result<CreateEntryResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::Validation { message: "subject is required".to_string() });
		}

		self.authorize(subject, None, Permission::Write).await?;

		entry::validate_draft(&req.entry).map_err(Error::validation)?;

		let now = OffsetDateTime::now_utc();
		let draft = req.entry;
		let entry = KnowledgeEntry {
			id: draft.id.unwrap_or_else(Uuid::new_v4),
			title: draft.title,
			content: draft.content,
			created_by: subject.to_string(),
			created_at: now,
			updated_at: now,
			tags: draft.tags,
			visibility: draft.visibility.unwrap_or_default(),
			source: draft.source,
			confidence: draft.confidence,
			expires_at: draft.expires_at,
			schema_version: entry::SCHEMA_VERSION.to_string(),
			custom_fields: draft.custom_fields,
		};
		let vector = self.embed_text(&entry.content).await?;
		let target = partition::route(entry.visibility, &entry.created_by);

		if let Err(err) = self.collab.content.put(entry.id, &entry.content).await {
			tracing::warn!(
				entry_id = %entry.id,
				error = %err,
				"Content write failed; the payload preview will serve as fallback."
			);
		}

		self.collab.vectors.upsert(&target, entry.id, vector, payload::encode(&entry)).await?;
		self.collab.metadata.upsert(&crate::meta_row(&entry)).await?;

		tracing::info!(entry_id = %entry.id, partition = %target, "Entry created.");

		Ok(CreateEntryResponse { id: entry.id })
	}
}
