use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, LoreService, Result, VectorMatch};
use lore_domain::{
	entry::{KnowledgeEntry, Visibility},
	filter, partition, payload,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
	Semantic,
	Metadata,
	Hybrid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub subject: String,
	#[serde(default)]
	pub query: Option<String>,
	pub search_type: SearchType,
	#[serde(default)]
	pub filters: Map<String, Value>,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub visibility: Option<Vec<Visibility>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
	pub entry: KnowledgeEntry,
	pub score: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
	pub results: Vec<SearchHit>,
}

impl LoreService {
	/// Fan one query out across every partition the requester may see and
	/// merge under a single ranking contract: semantic and hybrid results
	/// sort descending by similarity; metadata results keep the fixed
	/// partition iteration order and a constant score of 1.0. A failing
	/// partition is skipped, never fatal.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::Validation { message: "subject is required".to_string() });
		}

		let top_k =
			req.top_k.unwrap_or(self.cfg.search.default_top_k).clamp(1, self.cfg.search.max_top_k);
		let scopes = req
			.visibility
			.unwrap_or_else(|| vec![Visibility::Public, Visibility::Team, Visibility::Private]);
		let partitions = partition::search_partitions(&scopes, subject);

		if partitions.is_empty() {
			return Ok(SearchResponse { results: Vec::new() });
		}

		let (vector, predicates) = match req.search_type {
			SearchType::Metadata => (None, filter::translate(&req.filters)),
			SearchType::Semantic => (Some(self.embed_query(req.query.as_deref()).await?), Vec::new()),
			SearchType::Hybrid => (
				Some(self.embed_query(req.query.as_deref()).await?),
				filter::translate(&req.filters),
			),
		};
		let ranked = matches!(req.search_type, SearchType::Semantic | SearchType::Hybrid);

		// Per-partition queries run concurrently; results are collected in
		// partition order so metadata-mode concatenation stays deterministic.
		let mut handles = Vec::with_capacity(partitions.len());

		for target in partitions {
			let vectors = self.collab.vectors.clone();
			let vector = vector.clone();
			let predicates = predicates.clone();
			let handle = tokio::spawn(async move {
				let matches = vectors.query(&target, vector.as_deref(), top_k, &predicates).await;

				(target, matches)
			});

			handles.push(handle);
		}

		let mut merged: Vec<VectorMatch> = Vec::new();

		for handle in handles {
			match handle.await {
				Ok((_, Ok(matches))) => merged.extend(matches),
				Ok((target, Err(err))) => {
					tracing::warn!(
						partition = %target,
						error = %err,
						"Partition query failed; skipping its results."
					);
				},
				Err(err) => {
					tracing::warn!(error = %err, "Partition query task failed; skipping its results.");
				},
			}
		}

		if ranked {
			merged.sort_by(|a, b| {
				b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
			});
		}

		merged.truncate(top_k as usize);

		let mut results = Vec::with_capacity(merged.len());

		for matched in merged {
			let content = self.resolve_content(matched.id, &matched.payload).await;
			let Some(entry) = payload::decode(&matched.payload, content) else {
				tracing::warn!(entry_id = %matched.id, "Skipping match with malformed payload.");

				continue;
			};
			let score = if ranked { matched.score } else { 1.0 };

			results.push(SearchHit { entry, score });
		}

		Ok(SearchResponse { results })
	}

	async fn embed_query(&self, query: Option<&str>) -> Result<Vec<f32>> {
		let query = query
			.map(str::trim)
			.filter(|query| !query.is_empty())
			.ok_or_else(|| Error::Validation {
				message: "query is required for semantic and hybrid search".to_string(),
			})?;

		self.embed_text(query).await
	}
}
