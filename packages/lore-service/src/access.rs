use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AuditSink, BoxFuture, Error, KB_ENTRY_RESOURCE, LoreService, PermissionGate, Result};
use lore_storage::db::Db;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
	Read,
	Write,
	Delete,
	Admin,
}
impl Permission {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
			Self::Delete => "delete",
			Self::Admin => "admin",
		}
	}
}

#[derive(Clone, Debug)]
pub struct AccessAttempt {
	pub subject: String,
	pub resource_type: String,
	pub resource_id: Option<Uuid>,
	pub permission: Permission,
	pub granted: bool,
}

impl LoreService {
	/// Single entry-level permission consult. The decision is handed to the
	/// audit sink regardless of outcome; denial surfaces before any store is
	/// touched.
	pub(crate) async fn authorize(
		&self,
		subject: &str,
		resource_id: Option<Uuid>,
		permission: Permission,
	) -> Result<()> {
		let granted = self
			.collab
			.permissions
			.check(subject, KB_ENTRY_RESOURCE, resource_id, permission)
			.await?;

		self.collab
			.audit
			.record(AccessAttempt {
				subject: subject.to_string(),
				resource_type: KB_ENTRY_RESOURCE.to_string(),
				resource_id,
				permission,
				granted,
			})
			.await;

		if !granted {
			return Err(Error::PermissionDenied {
				message: format!(
					"{} on {KB_ENTRY_RESOURCE} is not allowed for {subject}.",
					permission.as_str()
				),
			});
		}

		Ok(())
	}
}

/// Default gate: admin role wins, owners hold every permission on their own
/// entries, shared entries are readable by any authenticated subject, and
/// creation is open to all. The policy behind the trait is deployment
/// territory; this is only a workable baseline.
pub struct PgPermissionGate {
	db: Arc<Db>,
}
impl PgPermissionGate {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl PermissionGate for PgPermissionGate {
	fn check<'a>(
		&'a self,
		subject: &'a str,
		resource_type: &'a str,
		resource_id: Option<Uuid>,
		permission: Permission,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		Box::pin(async move {
			let role: Option<String> =
				sqlx::query_scalar("SELECT role FROM kb_user_roles WHERE user_id = $1")
					.bind(subject)
					.fetch_optional(&self.db.pool)
					.await?;

			if role.as_deref() == Some("admin") {
				return Ok(true);
			}
			if resource_type != KB_ENTRY_RESOURCE {
				return Ok(false);
			}

			let Some(id) = resource_id else {
				// Creating a new entry; any authenticated subject may.
				return Ok(permission == Permission::Write);
			};
			let row: Option<(String, String)> = sqlx::query_as(
				"SELECT created_by, visibility FROM kb_entries_meta WHERE id = $1",
			)
			.bind(id)
			.fetch_optional(&self.db.pool)
			.await?;
			// Absent rows fall through as granted so the operation itself
			// reports NotFound instead of a misleading denial.
			let Some((created_by, visibility)) = row else {
				return Ok(true);
			};

			if created_by == subject {
				return Ok(true);
			}

			Ok(permission == Permission::Read && matches!(visibility.as_str(), "public" | "team"))
		})
	}
}

/// Appends to the access log off the request path. Failures are logged and
/// dropped; auditing never blocks or fails an operation.
pub struct PgAuditSink {
	db: Arc<Db>,
}
impl PgAuditSink {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl AuditSink for PgAuditSink {
	fn record<'a>(&'a self, attempt: AccessAttempt) -> BoxFuture<'a, ()> {
		let pool = self.db.pool.clone();

		Box::pin(async move {
			tokio::spawn(async move {
				let result = sqlx::query(
					"\
INSERT INTO kb_access_log (log_id, subject, resource_type, resource_id, permission, granted, ts)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
				)
				.bind(Uuid::new_v4())
				.bind(&attempt.subject)
				.bind(&attempt.resource_type)
				.bind(attempt.resource_id)
				.bind(attempt.permission.as_str())
				.bind(attempt.granted)
				.bind(OffsetDateTime::now_utc())
				.execute(&pool)
				.await;

				if let Err(err) = result {
					tracing::warn!(error = %err, "Access log write failed; ignoring.");
				}
			});
		})
	}
}
