use std::sync::{Arc, atomic::Ordering};

use serde_json::Value;
use uuid::Uuid;

use super::{AllowAllGate, DenyAllGate, FakeEmbedding, VECTOR_DIM, draft, harness, harness_with};
use lore_domain::entry::{EntryPatch, Visibility};
use lore_service::{
	CreateEntryRequest, DeleteEntryRequest, Error, GetEntryRequest, UpdateEntryRequest,
};

const REFUND_CONTENT: &str = "Customers may request a refund within 30 days of purchase.";

#[tokio::test]
async fn create_then_get_round_trips() {
	let h = harness();
	let mut entry = draft("Refund Policy", REFUND_CONTENT);

	entry.tags = vec!["billing".to_string(), "policy".to_string()];
	entry.confidence = Some(4.0);
	entry.custom_fields.insert("region".to_string(), Value::String("emea".to_string()));

	let id = h
		.service
		.create_entry(CreateEntryRequest { subject: "alice".to_string(), entry })
		.await
		.expect("create failed")
		.id;
	let got = h
		.service
		.get_entry(GetEntryRequest { subject: "alice".to_string(), id })
		.await
		.expect("get failed")
		.entry;

	assert_eq!(got.id, id);
	assert_eq!(got.title, "Refund Policy");
	assert_eq!(got.content, REFUND_CONTENT);
	assert_eq!(got.created_by, "alice");
	assert_eq!(got.visibility, Visibility::Private);
	assert_eq!(got.tags, vec!["billing".to_string(), "policy".to_string()]);
	assert_eq!(got.confidence, Some(4.0));
	assert_eq!(got.custom_fields.get("region"), Some(&Value::String("emea".to_string())));
	assert_eq!(got.created_at, got.updated_at);
}

#[tokio::test]
async fn create_defaults_to_the_owner_partition() {
	let h = harness();
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;

	assert!(h.vectors.contains("user-alice", id));
	assert!(!h.vectors.contains("public-kb", id));
	assert_eq!(h.content.stored(id).as_deref(), Some(REFUND_CONTENT));
	assert_eq!(h.metadata.row(id).expect("meta row missing").visibility, "private");
}

#[tokio::test]
async fn create_rejects_invalid_drafts_before_any_write() {
	let h = harness();
	let err = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("ab", REFUND_CONTENT),
		})
		.await
		.expect_err("short title must fail");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(h.vectors.total_points(), 0);
	assert_eq!(h.metadata.count(), 0);
	assert!(h.content.contents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn content_write_failure_degrades_to_preview() {
	let h = harness();
	let long_content = format!("{} {}", REFUND_CONTENT, "x".repeat(120));

	h.content.fail_puts.store(true, Ordering::SeqCst);

	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", &long_content),
		})
		.await
		.expect("create must survive a content-store outage")
		.id;

	assert!(h.content.stored(id).is_none());

	let got = h
		.service
		.get_entry(GetEntryRequest { subject: "alice".to_string(), id })
		.await
		.expect("get failed")
		.entry;

	assert_eq!(got.content.chars().count(), 103);
	assert!(got.content.ends_with("..."));
	assert!(long_content.starts_with(got.content.trim_end_matches("...")));
}

#[tokio::test]
async fn visibility_update_moves_the_entry_between_partitions() {
	let h = harness();
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;
	let response = h
		.service
		.update_entry(UpdateEntryRequest {
			subject: "alice".to_string(),
			id,
			patch: EntryPatch { visibility: Some(Visibility::Public), ..EntryPatch::default() },
		})
		.await
		.expect("update failed");

	assert!(response.moved);
	assert!(h.vectors.contains("public-kb", id));
	assert!(!h.vectors.contains("user-alice", id));
	assert_eq!(h.metadata.row(id).expect("meta row missing").visibility, "public");

	let got = h
		.service
		.get_entry(GetEntryRequest { subject: "alice".to_string(), id })
		.await
		.expect("get after move failed")
		.entry;

	assert_eq!(got.visibility, Visibility::Public);
	assert_eq!(got.content, REFUND_CONTENT);
}

#[tokio::test]
async fn migration_requires_readable_content() {
	let h = harness();

	h.content.fail_puts.store(true, Ordering::SeqCst);

	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;
	let err = h
		.service
		.update_entry(UpdateEntryRequest {
			subject: "alice".to_string(),
			id,
			patch: EntryPatch { visibility: Some(Visibility::Public), ..EntryPatch::default() },
		})
		.await
		.expect_err("migration without readable content must fail");

	assert!(matches!(err, Error::Upstream { .. }));
	// The entry stayed where it was; nothing landed in the new partition.
	assert!(h.vectors.contains("user-alice", id));
	assert!(!h.vectors.contains("public-kb", id));
}

#[tokio::test]
async fn update_never_changes_created_by() {
	let h = harness();
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;

	h.service
		.update_entry(UpdateEntryRequest {
			subject: "mallory".to_string(),
			id,
			patch: EntryPatch {
				title: Some("Hijacked".to_string()),
				visibility: Some(Visibility::Public),
				..EntryPatch::default()
			},
		})
		.await
		.expect("update failed");

	let row = h.metadata.row(id).expect("meta row missing");

	assert_eq!(row.created_by, "alice");

	let got = h
		.service
		.get_entry(GetEntryRequest { subject: "alice".to_string(), id })
		.await
		.expect("get failed")
		.entry;

	assert_eq!(got.created_by, "alice");
}

#[tokio::test]
async fn payload_only_update_keeps_the_existing_vector() {
	let h = harness();
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;
	let before = h.vectors.vector_of("user-alice", id).expect("vector missing");

	h.service
		.update_entry(UpdateEntryRequest {
			subject: "alice".to_string(),
			id,
			patch: EntryPatch { title: Some("Refund Policy v2".to_string()), ..EntryPatch::default() },
		})
		.await
		.expect("update failed");

	let after = h.vectors.vector_of("user-alice", id).expect("vector missing after update");

	assert_eq!(before, after);

	let payload = h.vectors.payload_of("user-alice", id).expect("payload missing");

	assert_eq!(payload.get("title").and_then(Value::as_str), Some("Refund Policy v2"));
	assert_eq!(h.metadata.row(id).expect("meta row missing").title, "Refund Policy v2");
}

#[tokio::test]
async fn content_update_refreshes_vector_and_blob() {
	let new_content = "Refunds are granted within 60 days for annual plans only.";
	let mut old_vector = vec![0.0_f32; VECTOR_DIM];
	let mut new_vector = vec![0.0_f32; VECTOR_DIM];

	old_vector[0] = 1.0;
	new_vector[1] = 1.0;

	let embedding = FakeEmbedding::new(VECTOR_DIM)
		.pin(REFUND_CONTENT, old_vector)
		.pin(new_content, new_vector);
	let h = harness_with(Arc::new(embedding), Arc::new(AllowAllGate));
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;
	let before = h.vectors.vector_of("user-alice", id).expect("vector missing");

	h.service
		.update_entry(UpdateEntryRequest {
			subject: "alice".to_string(),
			id,
			patch: EntryPatch { content: Some(new_content.to_string()), ..EntryPatch::default() },
		})
		.await
		.expect("update failed");

	let after = h.vectors.vector_of("user-alice", id).expect("vector missing after update");

	assert_ne!(before, after);
	assert_eq!(h.content.stored(id).as_deref(), Some(new_content));
}

#[tokio::test]
async fn empty_patch_is_rejected() {
	let h = harness();
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;
	let err = h
		.service
		.update_entry(UpdateEntryRequest {
			subject: "alice".to_string(),
			id,
			patch: EntryPatch::default(),
		})
		.await
		.expect_err("empty patch must fail");

	assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn update_of_missing_entry_is_not_found() {
	let h = harness();
	let err = h
		.service
		.update_entry(UpdateEntryRequest {
			subject: "alice".to_string(),
			id: Uuid::new_v4(),
			patch: EntryPatch { title: Some("Ghost".to_string()), ..EntryPatch::default() },
		})
		.await
		.expect_err("updating a missing entry must fail");

	assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn delete_removes_the_entry_from_every_store() {
	let h = harness();
	let id = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed")
		.id;

	h.service
		.delete_entry(DeleteEntryRequest { subject: "alice".to_string(), id })
		.await
		.expect("delete failed");

	assert!(!h.vectors.contains("user-alice", id));
	assert!(h.content.stored(id).is_none());
	assert!(h.metadata.row(id).is_none());

	let err = h
		.service
		.get_entry(GetEntryRequest { subject: "alice".to_string(), id })
		.await
		.expect_err("get after delete must fail");

	assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn deleting_a_missing_id_is_not_found_and_writes_nothing() {
	let h = harness();
	let err = h
		.service
		.delete_entry(DeleteEntryRequest { subject: "alice".to_string(), id: Uuid::new_v4() })
		.await
		.expect_err("deleting a missing entry must fail");

	assert!(matches!(err, Error::NotFound { .. }));
	assert_eq!(h.vectors.total_points(), 0);
	assert_eq!(h.metadata.count(), 0);
}

#[tokio::test]
async fn denied_subjects_touch_no_store() {
	let h = harness_with(Arc::new(FakeEmbedding::new(VECTOR_DIM)), Arc::new(DenyAllGate));
	let err = h
		.service
		.create_entry(CreateEntryRequest {
			subject: "mallory".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect_err("denied create must fail");

	assert!(matches!(err, Error::PermissionDenied { .. }));
	assert_eq!(h.vectors.total_points(), 0);
	assert_eq!(h.metadata.count(), 0);
	assert!(h.content.contents.lock().unwrap().is_empty());

	let attempts = h.audit.attempts.lock().unwrap();

	assert_eq!(attempts.len(), 1);
	assert!(!attempts[0].granted);
	assert_eq!(attempts[0].subject, "mallory");
}

#[tokio::test]
async fn granted_operations_are_audited() {
	let h = harness_with(Arc::new(FakeEmbedding::new(VECTOR_DIM)), Arc::new(AllowAllGate));

	h.service
		.create_entry(CreateEntryRequest {
			subject: "alice".to_string(),
			entry: draft("Refund Policy", REFUND_CONTENT),
		})
		.await
		.expect("create failed");

	let attempts = h.audit.attempts.lock().unwrap();

	assert_eq!(attempts.len(), 1);
	assert!(attempts[0].granted);
}
