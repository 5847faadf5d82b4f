use time::OffsetDateTime;
use uuid::Uuid;

/// Summary row mirrored into Postgres for listing and ownership lookups.
/// The full entry lives split across the vector payload and the content
/// store; this row is the authority for `visibility` and `created_by`.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct EntryMetaRow {
	pub id: Uuid,
	pub title: String,
	pub visibility: String,
	pub created_by: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub tags: Vec<String>,
}
