use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, LoreService, MetaListFilter, Result};
use lore_domain::entry::Visibility;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListEntriesRequest {
	pub subject: String,
	#[serde(default)]
	pub visibility: Option<Visibility>,
	#[serde(default)]
	pub tag: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntrySummary {
	pub id: Uuid,
	pub title: String,
	pub visibility: Visibility,
	pub created_by: String,
	#[serde(with = "lore_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "lore_domain::time_serde")]
	pub updated_at: OffsetDateTime,
	pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListEntriesResponse {
	pub entries: Vec<EntrySummary>,
}

impl LoreService {
	/// List summary rows, optionally narrowed by visibility and tag.
	/// Private rows only surface for their owner.
	pub async fn list_entries(&self, req: ListEntriesRequest) -> Result<ListEntriesResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::Validation { message: "subject is required".to_string() });
		}

		let limit = req.limit.unwrap_or(self.cfg.search.list_limit).max(1);
		let filter = MetaListFilter {
			visibility: req.visibility.map(|visibility| visibility.as_str().to_string()),
			tag: req.tag.map(|tag| tag.trim().to_string()).filter(|tag| !tag.is_empty()),
			requester: subject.to_string(),
			limit,
		};
		let rows = self.collab.metadata.list(&filter).await?;
		let entries = rows
			.into_iter()
			.map(|row| EntrySummary {
				id: row.id,
				title: row.title,
				visibility: Visibility::parse(&row.visibility).unwrap_or_default(),
				created_by: row.created_by,
				created_at: row.created_at,
				updated_at: row.updated_at,
				tags: row.tags,
			})
			.collect();

		Ok(ListEntriesResponse { entries })
	}
}
