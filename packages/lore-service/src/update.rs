use serde::{Deserialize, Serialize};
use serde_json::Map;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, LoreService, MetaFieldUpdate, Permission, Result};
use lore_domain::{
	entry::{self, EntryPatch, KnowledgeEntry, Visibility},
	partition, payload,
};
use lore_storage::models::EntryMetaRow;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
	pub subject: String,
	pub id: Uuid,
	pub patch: EntryPatch,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateEntryResponse {
	pub id: Uuid,
	/// True when the visibility change moved the point to another partition.
	pub moved: bool,
}

impl LoreService {
	/// Apply a partial update. When the computed partition changes, the
	/// point is inserted into the new partition before the old copy is
	/// deleted, so a crash in between duplicates the entry rather than
	/// losing it. An entry never moves partitions without a fresh vector:
	/// absent new content, the stored content is read back and re-embedded,
	/// and that read failing fails the whole update.
	pub async fn update_entry(&self, req: UpdateEntryRequest) -> Result<UpdateEntryResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::Validation { message: "subject is required".to_string() });
		}

		self.authorize(subject, Some(req.id), Permission::Write).await?;

		if req.patch.is_empty() {
			return Err(Error::Validation {
				message: "update requires at least one field".to_string(),
			});
		}

		entry::validate_patch(&req.patch).map_err(Error::validation)?;

		let id = req.id;
		let patch = req.patch;
		let meta = self.collab.metadata.get(id).await?.ok_or_else(|| Error::not_found(id))?;
		let current_visibility = Visibility::parse(&meta.visibility).unwrap_or_default();
		let new_visibility = patch.visibility.unwrap_or(current_visibility);
		let old_partition = partition::route(current_visibility, &meta.created_by);
		let new_partition = partition::route(new_visibility, &meta.created_by);
		let moving = old_partition != new_partition;
		let now = OffsetDateTime::now_utc();

		let mut vector = None;
		let mut content = patch.content.clone();

		if let Some(new_content) = patch.content.as_deref() {
			vector = Some(self.embed_text(new_content).await?);

			if let Err(err) = self.collab.content.put(id, new_content).await {
				tracing::warn!(
					entry_id = %id,
					error = %err,
					"Content write failed; the payload preview will serve as fallback."
				);
			}
		} else if moving {
			// Read-back is fatal here: migrating with a stale or missing
			// vector would leave the entry unfindable in its new partition.
			let stored = self.collab.content.get(id).await.map_err(|err| Error::Upstream {
				message: format!("Content read-back for partition migration failed: {err}"),
			})?;
			let Some(stored) = stored else {
				return Err(Error::Upstream {
					message: format!(
						"Content for entry {id} is missing; refusing to migrate partitions."
					),
				});
			};

			vector = Some(self.embed_text(&stored).await?);
			content = Some(stored);
		}

		let ids = [id];
		let stored_payload = self.collab.vectors.fetch(&old_partition, &ids).await?.remove(&id);
		let mut entry = match stored_payload {
			Some(stored) => {
				let base_content = match content.clone() {
					Some(content) => content,
					None => self.resolve_content(id, &stored).await,
				};

				match payload::decode(&stored, base_content) {
					Some(entry) => entry,
					None => {
						tracing::warn!(
							entry_id = %id,
							"Stored payload is malformed; rebuilding from the metadata row."
						);

						seed_from_meta(&meta, content.clone().unwrap_or_default())
					},
				}
			},
			None => {
				tracing::warn!(
					entry_id = %id,
					partition = %old_partition,
					"Vector point missing; rebuilding payload from the metadata row."
				);

				seed_from_meta(&meta, content.clone().unwrap_or_default())
			},
		};

		// `created_by` comes from the stored row no matter what the patch
		// carries.
		entry.id = id;
		entry.created_by = meta.created_by.clone();
		entry.visibility = new_visibility;
		entry.updated_at = now;

		let meta_update = MetaFieldUpdate {
			updated_at: now,
			title: patch.title.clone(),
			visibility: patch.visibility.map(|visibility| visibility.as_str().to_string()),
			tags: patch.tags.clone(),
		};

		if let Some(title) = patch.title {
			entry.title = title;
		}
		if let Some(new_content) = content {
			entry.content = new_content;
		}
		if let Some(tags) = patch.tags {
			entry.tags = tags;
		}
		if let Some(source) = patch.source {
			entry.source = Some(source);
		}
		if let Some(confidence) = patch.confidence {
			entry.confidence = Some(confidence);
		}
		if let Some(expires_at) = patch.expires_at {
			entry.expires_at = Some(expires_at);
		}
		if let Some(custom_fields) = patch.custom_fields {
			entry.custom_fields = custom_fields;
		}

		let new_payload = payload::encode(&entry);

		if moving {
			let vector = match vector {
				Some(vector) => vector,
				None => self.embed_text(&entry.content).await?,
			};

			self.collab.vectors.upsert(&new_partition, id, vector, new_payload).await?;
			self.collab.vectors.delete(&old_partition, &ids).await?;

			tracing::info!(
				entry_id = %id,
				from = %old_partition,
				to = %new_partition,
				"Entry moved partitions."
			);
		} else if let Some(vector) = vector {
			self.collab.vectors.upsert(&old_partition, id, vector, new_payload).await?;
		} else {
			// No new content and no move: keep the existing vector and only
			// rewrite the payload.
			self.collab.vectors.update_payload(&old_partition, id, new_payload).await?;
		}

		self.collab.metadata.update(id, meta_update).await?;

		Ok(UpdateEntryResponse { id, moved: moving })
	}
}

fn seed_from_meta(meta: &EntryMetaRow, content: String) -> KnowledgeEntry {
	KnowledgeEntry {
		id: meta.id,
		title: meta.title.clone(),
		content,
		created_by: meta.created_by.clone(),
		created_at: meta.created_at,
		updated_at: meta.updated_at,
		tags: meta.tags.clone(),
		visibility: Visibility::parse(&meta.visibility).unwrap_or_default(),
		source: None,
		confidence: None,
		expires_at: None,
		schema_version: entry::SCHEMA_VERSION.to_string(),
		custom_fields: Map::new(),
	}
}
