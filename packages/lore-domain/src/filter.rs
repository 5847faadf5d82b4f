use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Typed filter predicate produced by [`translate`]. The vector-index
/// implementation maps these onto its native filter grammar.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
	Equals(Value),
	Range { gte: Option<f64>, lte: Option<f64> },
	ContainsAny(Vec<String>),
	Contains(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldPredicate {
	pub field: String,
	pub predicate: Predicate,
}
impl FieldPredicate {
	fn new(field: &str, predicate: Predicate) -> Self {
		Self { field: field.to_string(), predicate }
	}
}

/// Translate a generic filter object into typed predicates. Applied
/// identically in metadata and hybrid search:
/// - `tags: [..]` becomes an any-of membership test on the tag list;
/// - `created_at` / `updated_at` objects with `$gte` / `$lte` become range
///   predicates over unix seconds (RFC 3339 strings are accepted as bounds);
/// - `title` becomes a substring test when wildcard-marked (`*` anywhere, or
///   `/pattern/` delimited), with the markers stripped;
/// - everything else passes through as an equality predicate verbatim.
pub fn translate(filters: &Map<String, Value>) -> Vec<FieldPredicate> {
	let mut out = Vec::new();

	for (key, value) in filters {
		match key.as_str() {
			"tags" =>
				if let Some(items) = value.as_array() {
					let tags = items.iter().map(stringify).collect();

					out.push(FieldPredicate::new("tags", Predicate::ContainsAny(tags)));
				} else {
					out.push(FieldPredicate::new(key, Predicate::Equals(value.clone())));
				},
			"created_at" | "updated_at" =>
				if let Some(range) = range_predicate(value) {
					out.push(FieldPredicate::new(key, range));
				} else {
					out.push(FieldPredicate::new(key, Predicate::Equals(value.clone())));
				},
			"title" => out.push(FieldPredicate::new(key, title_predicate(value))),
			_ => out.push(FieldPredicate::new(key, Predicate::Equals(value.clone()))),
		}
	}

	out
}

fn stringify(value: &Value) -> String {
	match value.as_str() {
		Some(raw) => raw.to_string(),
		None => value.to_string(),
	}
}

fn range_predicate(value: &Value) -> Option<Predicate> {
	let bounds = value.as_object()?;
	let gte = bounds.get("$gte").and_then(range_bound);
	let lte = bounds.get("$lte").and_then(range_bound);

	if gte.is_none() && lte.is_none() {
		return None;
	}

	Some(Predicate::Range { gte, lte })
}

fn range_bound(value: &Value) -> Option<f64> {
	if let Some(number) = value.as_f64() {
		return Some(number);
	}

	let raw = value.as_str()?;

	OffsetDateTime::parse(raw, &Rfc3339).ok().map(|ts| ts.unix_timestamp() as f64)
}

fn title_predicate(value: &Value) -> Predicate {
	let Some(raw) = value.as_str() else {
		return Predicate::Equals(value.clone());
	};

	if raw.contains('*') {
		return Predicate::Contains(raw.replace('*', ""));
	}
	if raw.len() > 1 && raw.starts_with('/') && raw.ends_with('/') {
		return Predicate::Contains(raw[1..raw.len() - 1].to_string());
	}

	Predicate::Equals(value.clone())
}
