use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, LoreService, Permission, Result};
use lore_domain::{entry::Visibility, partition};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteEntryRequest {
	pub subject: String,
	pub id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteEntryResponse {
	pub id: Uuid,
}

impl LoreService {
	/// Remove an entry from all three stores. The content-store delete is
	/// non-fatal; vector and metadata deletes propagate.
	pub async fn delete_entry(&self, req: DeleteEntryRequest) -> Result<DeleteEntryResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::Validation { message: "subject is required".to_string() });
		}

		self.authorize(subject, Some(req.id), Permission::Delete).await?;

		let meta = self.collab.metadata.get(req.id).await?.ok_or_else(|| Error::not_found(req.id))?;
		let visibility = Visibility::parse(&meta.visibility).unwrap_or_default();
		let target = partition::route(visibility, &meta.created_by);
		let ids = [req.id];

		self.collab.vectors.delete(&target, &ids).await?;

		if let Err(err) = self.collab.content.delete(req.id).await {
			tracing::warn!(entry_id = %req.id, error = %err, "Content delete failed; ignoring.");
		}

		self.collab.metadata.delete(req.id).await?;

		tracing::info!(entry_id = %req.id, partition = %target, "Entry deleted.");

		Ok(DeleteEntryResponse { id: req.id })
	}
}
