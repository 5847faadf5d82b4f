use std::{collections::HashSet, sync::Mutex};

use qdrant_client::qdrant::{
	CreateCollectionBuilder, CreateFieldIndexCollection, Distance, FieldType, VectorParamsBuilder,
};

use crate::Result;

/// Qdrant handle. Each partition key maps to its own collection
/// (`<prefix>-<partition>`), mirroring the namespace isolation the search
/// engine relies on: one partition never sees another's points.
pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection_prefix: String,
	pub vector_dim: u32,
	known_collections: Mutex<HashSet<String>>,
}
impl QdrantStore {
	pub fn new(cfg: &lore_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection_prefix: cfg.collection_prefix.clone(),
			vector_dim: cfg.vector_dim,
			known_collections: Mutex::new(HashSet::new()),
		})
	}

	pub fn collection_for(&self, partition: &str) -> String {
		format!("{}-{partition}", self.collection_prefix)
	}

	/// Create the partition's collection on first write, with payload
	/// indexes for every filterable field. Existing collections are cached
	/// so the exists-check runs once per partition per process.
	pub async fn ensure_collection(&self, partition: &str) -> Result<String> {
		let collection = self.collection_for(partition);

		{
			let known = self.known_collections.lock().unwrap_or_else(|err| err.into_inner());

			if known.contains(&collection) {
				return Ok(collection);
			}
		}

		if !self.client.collection_exists(&collection).await? {
			self.client
				.create_collection(CreateCollectionBuilder::new(collection.clone()).vectors_config(
					VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
				))
				.await?;

			let indexed_fields = [
				("created_by", FieldType::Keyword),
				("visibility", FieldType::Keyword),
				("tags", FieldType::Keyword),
				("schema_version", FieldType::Keyword),
				("source", FieldType::Keyword),
				("created_at", FieldType::Integer),
				("updated_at", FieldType::Integer),
				("expires_at", FieldType::Integer),
				("title", FieldType::Text),
			];

			for (field_name, field_type) in indexed_fields {
				self.client
					.create_field_index(CreateFieldIndexCollection {
						collection_name: collection.clone(),
						wait: Some(true),
						field_name: field_name.to_string(),
						field_type: Some(field_type as i32),
						field_index_params: None,
						ordering: None,
					})
					.await?;
			}
		}

		let mut known = self.known_collections.lock().unwrap_or_else(|err| err.into_inner());

		known.insert(collection.clone());

		Ok(collection)
	}
}
