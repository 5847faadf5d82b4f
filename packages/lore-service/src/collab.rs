use std::{collections::HashMap, sync::Arc};

use qdrant_client::{
	Payload,
	qdrant::{
		Condition, DeletePointsBuilder, Filter, GetPointsBuilder, PointId, PointStruct,
		PointsIdsList, Query, QueryPointsBuilder, Range, ScrollPointsBuilder,
		SetPayloadPointsBuilder, UpsertPointsBuilder, point_id::PointIdOptions, value::Kind,
	},
};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, ContentBlobStore, EmbeddingProvider, MetaFieldUpdate, MetaListFilter,
	MetadataTable, VectorIndex, VectorMatch,
};
use lore_config::EmbeddingProviderConfig;
use lore_domain::filter::{FieldPredicate, Predicate};
use lore_storage::{db::Db, models::EntryMetaRow, qdrant::QdrantStore};

/// Embedding seam backed by the HTTP provider client.
pub struct HttpEmbedding;
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(lore_providers::embedding::embed(cfg, texts))
	}
}

/// Vector index seam over Qdrant: one collection per partition key.
pub struct QdrantIndex {
	store: Arc<QdrantStore>,
}
impl QdrantIndex {
	pub fn new(store: Arc<QdrantStore>) -> Self {
		Self { store }
	}
}
impl VectorIndex for QdrantIndex {
	fn upsert<'a>(
		&'a self,
		partition: &'a str,
		id: Uuid,
		vector: Vec<f32>,
		payload: Map<String, Value>,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let collection = self.store.ensure_collection(partition).await?;
			let point = PointStruct::new(id.to_string(), vector, payload_from_json(&payload));

			self.store
				.client
				.upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
				.await?;

			Ok(())
		})
	}

	fn fetch<'a>(
		&'a self,
		partition: &'a str,
		ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<HashMap<Uuid, Map<String, Value>>>> {
		Box::pin(async move {
			let collection = self.store.collection_for(partition);
			let point_ids: Vec<PointId> =
				ids.iter().map(|id| PointId::from(id.to_string())).collect();
			let response = self
				.store
				.client
				.get_points(GetPointsBuilder::new(collection, point_ids).with_payload(true))
				.await?;
			let mut out = HashMap::new();

			for point in response.result {
				let Some(id) = point.id.as_ref().and_then(point_id_to_uuid) else {
					continue;
				};

				out.insert(id, json_from_payload(&point.payload));
			}

			Ok(out)
		})
	}

	fn query<'a>(
		&'a self,
		partition: &'a str,
		vector: Option<&'a [f32]>,
		top_k: u32,
		filter: &'a [FieldPredicate],
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorMatch>>> {
		Box::pin(async move {
			let collection = self.store.collection_for(partition);
			let filter = build_filter(filter);

			match vector {
				Some(vector) => {
					let mut search = QueryPointsBuilder::new(collection)
						.query(Query::new_nearest(vector.to_vec()))
						.limit(top_k as u64)
						.with_payload(true);

					if let Some(filter) = filter {
						search = search.filter(filter);
					}

					let response = self.store.client.query(search).await?;

					Ok(response
						.result
						.into_iter()
						.filter_map(|point| {
							let id = point.id.as_ref().and_then(point_id_to_uuid)?;

							Some(VectorMatch {
								id,
								score: point.score,
								payload: json_from_payload(&point.payload),
							})
						})
						.collect())
				},
				None => {
					let mut scroll =
						ScrollPointsBuilder::new(collection).limit(top_k).with_payload(true);

					if let Some(filter) = filter {
						scroll = scroll.filter(filter);
					}

					let response = self.store.client.scroll(scroll).await?;

					Ok(response
						.result
						.into_iter()
						.filter_map(|point| {
							let id = point.id.as_ref().and_then(point_id_to_uuid)?;

							Some(VectorMatch {
								id,
								score: 1.0,
								payload: json_from_payload(&point.payload),
							})
						})
						.collect())
				},
			}
		})
	}

	fn update_payload<'a>(
		&'a self,
		partition: &'a str,
		id: Uuid,
		payload: Map<String, Value>,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let collection = self.store.collection_for(partition);
			let selector = PointsIdsList { ids: vec![PointId::from(id.to_string())] };

			self.store
				.client
				.overwrite_payload(
					SetPayloadPointsBuilder::new(collection, payload_from_json(&payload))
						.points_selector(selector)
						.wait(true),
				)
				.await?;

			Ok(())
		})
	}

	fn delete<'a>(
		&'a self,
		partition: &'a str,
		ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let collection = self.store.collection_for(partition);
			let ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();

			self.store
				.client
				.delete_points(
					DeletePointsBuilder::new(collection)
						.points(PointsIdsList { ids })
						.wait(true),
				)
				.await?;

			Ok(())
		})
	}
}

/// Content seam over the Postgres content table.
pub struct PgContentStore {
	db: Arc<Db>,
}
impl PgContentStore {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl ContentBlobStore for PgContentStore {
	fn put<'a>(&'a self, id: Uuid, content: &'a str) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO kb_entry_content (id, content, updated_at)
VALUES ($1, $2, $3)
ON CONFLICT (id) DO UPDATE
SET content = EXCLUDED.content, updated_at = EXCLUDED.updated_at",
			)
			.bind(id)
			.bind(content)
			.bind(OffsetDateTime::now_utc())
			.execute(&self.db.pool)
			.await?;

			Ok(())
		})
	}

	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<Option<String>>> {
		Box::pin(async move {
			let content: Option<String> =
				sqlx::query_scalar("SELECT content FROM kb_entry_content WHERE id = $1")
					.bind(id)
					.fetch_optional(&self.db.pool)
					.await?;

			Ok(content)
		})
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			sqlx::query("DELETE FROM kb_entry_content WHERE id = $1")
				.bind(id)
				.execute(&self.db.pool)
				.await?;

			Ok(())
		})
	}
}

/// Metadata seam over the Postgres summary table.
pub struct PgMetadataTable {
	db: Arc<Db>,
}
impl PgMetadataTable {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl MetadataTable for PgMetadataTable {
	fn upsert<'a>(&'a self, row: &'a EntryMetaRow) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO kb_entries_meta (id, title, visibility, created_by, created_at, updated_at, tags)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (id) DO UPDATE
SET
	title = EXCLUDED.title,
	visibility = EXCLUDED.visibility,
	updated_at = EXCLUDED.updated_at,
	tags = EXCLUDED.tags",
			)
			.bind(row.id)
			.bind(&row.title)
			.bind(&row.visibility)
			.bind(&row.created_by)
			.bind(row.created_at)
			.bind(row.updated_at)
			.bind(&row.tags)
			.execute(&self.db.pool)
			.await?;

			Ok(())
		})
	}

	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<Option<EntryMetaRow>>> {
		Box::pin(async move {
			let row: Option<EntryMetaRow> = sqlx::query_as(
				"\
SELECT id, title, visibility, created_by, created_at, updated_at, tags
FROM kb_entries_meta
WHERE id = $1",
			)
			.bind(id)
			.fetch_optional(&self.db.pool)
			.await?;

			Ok(row)
		})
	}

	fn update<'a>(
		&'a self,
		id: Uuid,
		fields: MetaFieldUpdate,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
UPDATE kb_entries_meta
SET
	updated_at = $2,
	title = COALESCE($3, title),
	visibility = COALESCE($4, visibility),
	tags = COALESCE($5, tags)
WHERE id = $1",
			)
			.bind(id)
			.bind(fields.updated_at)
			.bind(fields.title)
			.bind(fields.visibility)
			.bind(fields.tags)
			.execute(&self.db.pool)
			.await?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			sqlx::query("DELETE FROM kb_entries_meta WHERE id = $1")
				.bind(id)
				.execute(&self.db.pool)
				.await?;

			Ok(())
		})
	}

	fn list<'a>(
		&'a self,
		filter: &'a MetaListFilter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EntryMetaRow>>> {
		Box::pin(async move {
			let rows: Vec<EntryMetaRow> = sqlx::query_as(
				"\
SELECT id, title, visibility, created_by, created_at, updated_at, tags
FROM kb_entries_meta
WHERE ($1::text IS NULL OR visibility = $1)
	AND ($2::text IS NULL OR $2 = ANY(tags))
	AND (visibility <> 'private' OR created_by = $3)
ORDER BY updated_at DESC
LIMIT $4",
			)
			.bind(filter.visibility.as_deref())
			.bind(filter.tag.as_deref())
			.bind(&filter.requester)
			.bind(filter.limit as i64)
			.fetch_all(&self.db.pool)
			.await?;

			Ok(rows)
		})
	}
}

fn build_filter(predicates: &[FieldPredicate]) -> Option<Filter> {
	if predicates.is_empty() {
		return None;
	}

	let mut conditions = Vec::with_capacity(predicates.len());

	for predicate in predicates {
		let field = predicate.field.as_str();
		let condition = match &predicate.predicate {
			Predicate::Equals(value) => equals_condition(field, value),
			Predicate::Range { gte, lte } =>
				Condition::range(field, Range { lt: None, gt: None, gte: *gte, lte: *lte }),
			Predicate::ContainsAny(values) => Condition::matches(field, values.clone()),
			Predicate::Contains(text) => Condition::matches_text(field, text.clone()),
		};

		conditions.push(condition);
	}

	Some(Filter::must(conditions))
}

fn equals_condition(field: &str, value: &Value) -> Condition {
	if let Some(text) = value.as_str() {
		return Condition::matches(field, text.to_string());
	}
	if let Some(flag) = value.as_bool() {
		return Condition::matches(field, flag);
	}
	if let Some(number) = value.as_i64() {
		return Condition::matches(field, number);
	}
	if let Some(number) = value.as_f64() {
		return Condition::range(field, Range {
			lt: None,
			gt: None,
			gte: Some(number),
			lte: Some(number),
		});
	}

	Condition::matches(field, value.to_string())
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_from_json(map: &Map<String, Value>) -> Payload {
	let mut out: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();

	for (key, value) in map {
		out.insert(key.clone(), qdrant_client::qdrant::Value::from(value.clone()));
	}

	Payload::from(out)
}

fn json_from_payload(payload: &HashMap<String, qdrant_client::qdrant::Value>) -> Map<String, Value> {
	let mut out = Map::new();

	for (key, value) in payload {
		if let Some(converted) = qdrant_value_to_json(value) {
			out.insert(key.clone(), converted);
		}
	}

	out
}

fn qdrant_value_to_json(value: &qdrant_client::qdrant::Value) -> Option<Value> {
	match value.kind.as_ref()? {
		Kind::NullValue(_) => Some(Value::Null),
		Kind::BoolValue(flag) => Some(Value::Bool(*flag)),
		Kind::IntegerValue(number) => Some(Value::from(*number)),
		Kind::DoubleValue(number) => serde_json::Number::from_f64(*number).map(Value::Number),
		Kind::StringValue(text) => Some(Value::String(text.clone())),
		Kind::ListValue(list) =>
			Some(Value::Array(list.values.iter().filter_map(qdrant_value_to_json).collect())),
		Kind::StructValue(fields) => Some(Value::Object(
			fields
				.fields
				.iter()
				.filter_map(|(key, value)| {
					qdrant_value_to_json(value).map(|json| (key.clone(), json))
				})
				.collect(),
		)),
	}
}
