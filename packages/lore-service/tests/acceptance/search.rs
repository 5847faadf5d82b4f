use std::sync::Arc;

use serde_json::Map;

use super::{AllowAllGate, FakeEmbedding, VECTOR_DIM, draft, harness, harness_with};
use lore_domain::entry::Visibility;
use lore_service::{CreateEntryRequest, Error, SearchRequest, SearchType};

const REFUND_CONTENT: &str = "Customers may request a refund within 30 days of purchase.";
const ONBOARDING_CONTENT: &str = "New hires complete onboarding within their first week.";
const PASSWORD_CONTENT: &str = "Password reset instructions for the admin portal account.";
const QUERY: &str = "refund window";

fn axis(index: usize, value: f32) -> Vec<f32> {
	let mut vector = vec![0.0_f32; VECTOR_DIM];

	vector[index] = value;

	vector
}

/// Embedding fake pinned so that similarity to the query is highest for the
/// refund entry, middling for onboarding, and lowest for passwords.
fn pinned_embedding() -> Arc<FakeEmbedding> {
	let mut query_vector = vec![0.0_f32; VECTOR_DIM];

	query_vector[0] = 0.9;
	query_vector[1] = 0.1;

	Arc::new(
		FakeEmbedding::new(VECTOR_DIM)
			.pin(REFUND_CONTENT, axis(0, 1.0))
			.pin(PASSWORD_CONTENT, axis(1, 1.0))
			.pin(ONBOARDING_CONTENT, {
				let mut vector = vec![0.0_f32; VECTOR_DIM];

				vector[0] = 0.6;
				vector[1] = 0.4;

				vector
			})
			.pin(QUERY, query_vector),
	)
}

async fn seed(h: &super::Harness) {
	for (subject, title, content, visibility) in [
		("alice", "Refund Policy", REFUND_CONTENT, Some(Visibility::Private)),
		("bob", "Onboarding", ONBOARDING_CONTENT, Some(Visibility::Team)),
		("bob", "Password Resets", PASSWORD_CONTENT, Some(Visibility::Public)),
	] {
		let mut entry = draft(title, content);

		entry.visibility = visibility;
		entry.tags = vec![title.split(' ').next().unwrap().to_lowercase()];

		h.service
			.create_entry(CreateEntryRequest { subject: subject.to_string(), entry })
			.await
			.expect("seed create failed");
	}
}

fn search_request(search_type: SearchType) -> SearchRequest {
	SearchRequest {
		subject: "alice".to_string(),
		query: Some(QUERY.to_string()),
		search_type,
		filters: Map::new(),
		top_k: Some(10),
		visibility: None,
	}
}

#[tokio::test]
async fn semantic_results_sort_descending_across_partitions() {
	let h = harness_with(pinned_embedding(), Arc::new(AllowAllGate));

	seed(&h).await;

	let results = h
		.service
		.search(search_request(SearchType::Semantic))
		.await
		.expect("search failed")
		.results;

	assert_eq!(results.len(), 3);
	assert_eq!(results[0].entry.title, "Refund Policy");
	assert_eq!(results[1].entry.title, "Onboarding");
	assert_eq!(results[2].entry.title, "Password Resets");

	for pair in results.windows(2) {
		assert!(pair[0].score >= pair[1].score);
	}
}

#[tokio::test]
async fn semantic_truncates_to_top_k() {
	let h = harness_with(pinned_embedding(), Arc::new(AllowAllGate));

	seed(&h).await;

	let mut request = search_request(SearchType::Semantic);

	request.top_k = Some(1);

	let results = h.service.search(request).await.expect("search failed").results;

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].entry.title, "Refund Policy");
}

#[tokio::test]
async fn semantic_search_requires_a_query() {
	let h = harness();

	for query in [None, Some("   ".to_string())] {
		let err = h
			.service
			.search(SearchRequest {
				subject: "alice".to_string(),
				query,
				search_type: SearchType::Semantic,
				filters: Map::new(),
				top_k: None,
				visibility: None,
			})
			.await
			.expect_err("semantic search without a query must fail");

		assert!(matches!(err, Error::Validation { .. }));
	}
}

#[tokio::test]
async fn metadata_search_scores_are_constant_and_partition_ordered() {
	let h = harness();

	seed(&h).await;

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters: Map::new(),
			top_k: Some(10),
			visibility: None,
		})
		.await
		.expect("search failed")
		.results;

	assert_eq!(results.len(), 3);
	// Fixed partition iteration order: public, team, then the requester's
	// private partition.
	assert_eq!(results[0].entry.title, "Password Resets");
	assert_eq!(results[1].entry.title, "Onboarding");
	assert_eq!(results[2].entry.title, "Refund Policy");

	for hit in &results {
		assert_eq!(hit.score, 1.0);
	}
}

#[tokio::test]
async fn metadata_filters_restrict_results() {
	let h = harness();

	seed(&h).await;

	let mut filters = Map::new();

	filters.insert("created_by".to_string(), serde_json::json!("bob"));

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters,
			top_k: Some(10),
			visibility: None,
		})
		.await
		.expect("search failed")
		.results;

	assert_eq!(results.len(), 2);
	assert!(results.iter().all(|hit| hit.entry.created_by == "bob"));
}

#[tokio::test]
async fn tag_filters_use_array_membership() {
	let h = harness();

	seed(&h).await;

	let mut filters = Map::new();

	filters.insert("tags".to_string(), serde_json::json!(["refund", "missing-tag"]));

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters,
			top_k: Some(10),
			visibility: None,
		})
		.await
		.expect("search failed")
		.results;

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].entry.title, "Refund Policy");
}

#[tokio::test]
async fn hybrid_search_applies_filters_and_ranks() {
	let h = harness_with(pinned_embedding(), Arc::new(AllowAllGate));

	seed(&h).await;

	let mut request = search_request(SearchType::Hybrid);

	request.filters.insert("created_by".to_string(), serde_json::json!("bob"));

	let results = h.service.search(request).await.expect("search failed").results;

	assert_eq!(results.len(), 2);
	assert_eq!(results[0].entry.title, "Onboarding");
	assert_eq!(results[1].entry.title, "Password Resets");
	assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn failing_partitions_are_skipped_not_fatal() {
	let h = harness_with(pinned_embedding(), Arc::new(AllowAllGate));

	seed(&h).await;
	h.vectors.fail_partition("team-kb");

	let results = h
		.service
		.search(search_request(SearchType::Semantic))
		.await
		.expect("search must tolerate a broken partition")
		.results;

	assert_eq!(results.len(), 2);
	assert!(results.iter().all(|hit| hit.entry.title != "Onboarding"));
}

#[tokio::test]
async fn visibility_scopes_limit_the_partitions_searched() {
	let h = harness();

	seed(&h).await;

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters: Map::new(),
			top_k: Some(10),
			visibility: Some(vec![Visibility::Private]),
		})
		.await
		.expect("search failed")
		.results;

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].entry.title, "Refund Policy");

	// Another subject's private partition holds nothing of alice's.
	let results = h
		.service
		.search(SearchRequest {
			subject: "carol".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters: Map::new(),
			top_k: Some(10),
			visibility: Some(vec![Visibility::Private]),
		})
		.await
		.expect("search failed")
		.results;

	assert!(results.is_empty());
}

#[tokio::test]
async fn empty_scope_list_yields_no_results() {
	let h = harness();

	seed(&h).await;

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters: Map::new(),
			top_k: Some(10),
			visibility: Some(Vec::new()),
		})
		.await
		.expect("search failed")
		.results;

	assert!(results.is_empty());
}

#[tokio::test]
async fn content_read_failures_fall_back_to_the_stored_preview() {
	let h = harness();

	seed(&h).await;
	h.content.fail_gets.store(true, std::sync::atomic::Ordering::SeqCst);

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters: Map::new(),
			top_k: Some(10),
			visibility: Some(vec![Visibility::Private]),
		})
		.await
		.expect("search must tolerate content-store failures")
		.results;

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].entry.content, REFUND_CONTENT);
}

#[tokio::test]
async fn missing_blob_content_falls_back_to_the_stored_preview() {
	let h = harness();

	seed(&h).await;
	// Drop all stored blobs after the fact; previews must take over.
	h.content.contents.lock().unwrap().clear();

	let results = h
		.service
		.search(SearchRequest {
			subject: "alice".to_string(),
			query: None,
			search_type: SearchType::Metadata,
			filters: Map::new(),
			top_k: Some(10),
			visibility: Some(vec![Visibility::Private]),
		})
		.await
		.expect("search failed")
		.results;

	assert_eq!(results.len(), 1);
	// Short content fits the preview whole, with no ellipsis marker.
	assert_eq!(results[0].entry.content, REFUND_CONTENT);
}
