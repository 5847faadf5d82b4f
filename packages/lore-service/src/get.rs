use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, LoreService, Permission, Result};
use lore_domain::{entry::{KnowledgeEntry, Visibility}, partition, payload};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetEntryRequest {
	pub subject: String,
	pub id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetEntryResponse {
	pub entry: KnowledgeEntry,
}

impl LoreService {
	pub async fn get_entry(&self, req: GetEntryRequest) -> Result<GetEntryResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::Validation { message: "subject is required".to_string() });
		}

		self.authorize(subject, Some(req.id), Permission::Read).await?;

		let meta = self.collab.metadata.get(req.id).await?.ok_or_else(|| Error::not_found(req.id))?;
		let visibility = Visibility::parse(&meta.visibility).unwrap_or_default();
		let source = partition::route(visibility, &meta.created_by);
		let ids = [req.id];
		let mut payloads = self.collab.vectors.fetch(&source, &ids).await?;
		let Some(stored) = payloads.remove(&req.id) else {
			tracing::warn!(
				entry_id = %req.id,
				partition = %source,
				"Metadata row has no vector point; the stores disagree."
			);

			return Err(Error::not_found(req.id));
		};
		let content = self.resolve_content(req.id, &stored).await;
		let entry = payload::decode(&stored, content).ok_or_else(|| Error::Upstream {
			message: format!("Stored payload for entry {} is malformed.", req.id),
		})?;

		Ok(GetEntryResponse { entry })
	}
}
