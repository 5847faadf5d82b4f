/// Full schema, applied idempotently by [`crate::db::Db::ensure_schema`].
/// Statements are split on ';' before execution, so none of them may embed a
/// literal semicolon.
pub const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS kb_entries_meta (
	id         UUID PRIMARY KEY,
	title      TEXT NOT NULL,
	visibility TEXT NOT NULL,
	created_by TEXT NOT NULL,
	created_at TIMESTAMPTZ NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL,
	tags       TEXT[] NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_kb_entries_meta_created_by ON kb_entries_meta (created_by);

CREATE INDEX IF NOT EXISTS idx_kb_entries_meta_visibility ON kb_entries_meta (visibility);

CREATE TABLE IF NOT EXISTS kb_entry_content (
	id         UUID PRIMARY KEY,
	content    TEXT NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS kb_user_roles (
	user_id TEXT PRIMARY KEY,
	role    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kb_access_log (
	log_id        UUID PRIMARY KEY,
	subject       TEXT NOT NULL,
	resource_type TEXT NOT NULL,
	resource_id   UUID,
	permission    TEXT NOT NULL,
	granted       BOOLEAN NOT NULL,
	ts            TIMESTAMPTZ NOT NULL
);
";
