pub mod access;
pub mod collab;
pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod search;
pub mod update;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use serde_json::{Map, Value};
use uuid::Uuid;

pub use access::{AccessAttempt, Permission};
pub use create::{CreateEntryRequest, CreateEntryResponse};
pub use delete::{DeleteEntryRequest, DeleteEntryResponse};
pub use get::{GetEntryRequest, GetEntryResponse};
pub use list::{EntrySummary, ListEntriesRequest, ListEntriesResponse};
pub use search::{SearchHit, SearchRequest, SearchResponse, SearchType};
pub use update::{UpdateEntryRequest, UpdateEntryResponse};

use lore_config::{Config, EmbeddingProviderConfig};
use lore_domain::{
	entry::{KnowledgeEntry, ValidationIssue},
	filter::FieldPredicate,
	payload,
};
use lore_storage::{db::Db, models::EntryMetaRow, qdrant::QdrantStore};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const KB_ENTRY_RESOURCE: &str = "kb-entry";

/// Text to fixed-dimension vector. The dimension contract is enforced by the
/// service, not the provider.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

#[derive(Clone, Debug)]
pub struct VectorMatch {
	pub id: Uuid,
	pub score: f32,
	pub payload: Map<String, Value>,
}

/// Partitioned nearest-neighbor store with a payload per point. A `None`
/// query vector means "match everything under the filter" (metadata mode).
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(
		&'a self,
		partition: &'a str,
		id: Uuid,
		vector: Vec<f32>,
		payload: Map<String, Value>,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn fetch<'a>(
		&'a self,
		partition: &'a str,
		ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<HashMap<Uuid, Map<String, Value>>>>;

	fn query<'a>(
		&'a self,
		partition: &'a str,
		vector: Option<&'a [f32]>,
		top_k: u32,
		filter: &'a [FieldPredicate],
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorMatch>>>;

	fn update_payload<'a>(
		&'a self,
		partition: &'a str,
		id: Uuid,
		payload: Map<String, Value>,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn delete<'a>(
		&'a self,
		partition: &'a str,
		ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

/// Full content keyed by entry id, independent of partitioning. Never
/// migrated on visibility changes.
pub trait ContentBlobStore
where
	Self: Send + Sync,
{
	fn put<'a>(&'a self, id: Uuid, content: &'a str) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<Option<String>>>;

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>>;
}

/// Fields of the summary row refreshed on every update. Absent fields are
/// left as they were.
#[derive(Clone, Debug)]
pub struct MetaFieldUpdate {
	pub updated_at: time::OffsetDateTime,
	pub title: Option<String>,
	pub visibility: Option<String>,
	pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct MetaListFilter {
	pub visibility: Option<String>,
	pub tag: Option<String>,
	pub requester: String,
	pub limit: u32,
}

/// Relational summary rows keyed by entry id; the authority for ownership
/// and current visibility lookups.
pub trait MetadataTable
where
	Self: Send + Sync,
{
	fn upsert<'a>(&'a self, row: &'a EntryMetaRow) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<Option<EntryMetaRow>>>;

	fn update<'a>(
		&'a self,
		id: Uuid,
		fields: MetaFieldUpdate,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn list<'a>(
		&'a self,
		filter: &'a MetaListFilter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EntryMetaRow>>>;
}

pub trait PermissionGate
where
	Self: Send + Sync,
{
	fn check<'a>(
		&'a self,
		subject: &'a str,
		resource_type: &'a str,
		resource_id: Option<Uuid>,
		permission: Permission,
	) -> BoxFuture<'a, color_eyre::Result<bool>>;
}

/// Fire-and-forget record of a permission decision. Implementations must
/// swallow their own failures.
pub trait AuditSink
where
	Self: Send + Sync,
{
	fn record<'a>(&'a self, attempt: AccessAttempt) -> BoxFuture<'a, ()>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub vectors: Arc<dyn VectorIndex>,
	pub content: Arc<dyn ContentBlobStore>,
	pub metadata: Arc<dyn MetadataTable>,
	pub permissions: Arc<dyn PermissionGate>,
	pub audit: Arc<dyn AuditSink>,
}

pub struct LoreService {
	pub cfg: Config,
	pub collab: Collaborators,
}

#[derive(Debug)]
pub enum Error {
	Validation { message: String },
	PermissionDenied { message: String },
	NotFound { message: String },
	Upstream { message: String },
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Validation { message } => write!(f, "Invalid request: {message}"),
			Self::PermissionDenied { message } => write!(f, "Permission denied: {message}"),
			Self::NotFound { message } => write!(f, "Not found: {message}"),
			Self::Upstream { message } => write!(f, "Upstream failure: {message}"),
		}
	}
}

impl std::error::Error for Error {}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Upstream { message: err.to_string() }
	}
}

impl Error {
	pub(crate) fn validation(issue: ValidationIssue) -> Self {
		Self::Validation { message: issue.message().to_string() }
	}

	pub(crate) fn not_found(id: Uuid) -> Self {
		Self::NotFound { message: format!("Entry {id} does not exist.") }
	}
}

impl LoreService {
	/// Wire the service against the production collaborators: HTTP
	/// embeddings, Qdrant partitions, and Postgres for metadata, content,
	/// permissions, and the access log.
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let db = Arc::new(db);
		let qdrant = Arc::new(qdrant);
		let collab = Collaborators {
			embedding: Arc::new(collab::HttpEmbedding),
			vectors: Arc::new(collab::QdrantIndex::new(qdrant)),
			content: Arc::new(collab::PgContentStore::new(db.clone())),
			metadata: Arc::new(collab::PgMetadataTable::new(db.clone())),
			permissions: Arc::new(access::PgPermissionGate::new(db.clone())),
			audit: Arc::new(access::PgAuditSink::new(db)),
		};

		Self { cfg, collab }
	}

	pub fn with_collaborators(cfg: Config, collab: Collaborators) -> Self {
		Self { cfg, collab }
	}

	pub(crate) async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self.collab.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(Error::Upstream {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Upstream {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vector)
	}

	/// Content-store read with the payload preview as fallback. Read
	/// failures degrade, they never abort.
	pub(crate) async fn resolve_content(&self, id: Uuid, payload: &Map<String, Value>) -> String {
		match self.collab.content.get(id).await {
			Ok(Some(content)) => content,
			Ok(None) => payload::preview_of(payload),
			Err(err) => {
				tracing::warn!(entry_id = %id, error = %err, "Content read failed; falling back to preview.");

				payload::preview_of(payload)
			},
		}
	}
}

pub(crate) fn meta_row(entry: &KnowledgeEntry) -> EntryMetaRow {
	EntryMetaRow {
		id: entry.id,
		title: entry.title.clone(),
		visibility: entry.visibility.as_str().to_string(),
		created_by: entry.created_by.clone(),
		created_at: entry.created_at,
		updated_at: entry.updated_at,
		tags: entry.tags.clone(),
	}
}
