use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use lore_domain::entry::{EntryPatch, Visibility};
use lore_service::{
	CreateEntryRequest, CreateEntryResponse, DeleteEntryRequest, DeleteEntryResponse,
	Error as ServiceError, GetEntryRequest, GetEntryResponse, ListEntriesRequest,
	ListEntriesResponse, SearchRequest, SearchResponse, UpdateEntryRequest, UpdateEntryResponse,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/entries", post(create_entry).get(list_entries))
		.route("/v1/entries/{id}", get(get_entry).put(update_entry).delete(delete_entry))
		.route("/v1/search", post(search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct SubjectQuery {
	subject: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
	subject: String,
	visibility: Option<Visibility>,
	tag: Option<String>,
	limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UpdateEntryBody {
	subject: String,
	#[serde(default)]
	patch: EntryPatch,
}

async fn create_entry(
	State(state): State<AppState>,
	Json(payload): Json<CreateEntryRequest>,
) -> Result<Json<CreateEntryResponse>, ApiError> {
	let response = state.service.create_entry(payload).await?;

	Ok(Json(response))
}

async fn list_entries(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ListEntriesResponse>, ApiError> {
	let response = state
		.service
		.list_entries(ListEntriesRequest {
			subject: query.subject,
			visibility: query.visibility,
			tag: query.tag,
			limit: query.limit,
		})
		.await?;

	Ok(Json(response))
}

async fn get_entry(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Query(query): Query<SubjectQuery>,
) -> Result<Json<GetEntryResponse>, ApiError> {
	let response = state.service.get_entry(GetEntryRequest { subject: query.subject, id }).await?;

	Ok(Json(response))
}

async fn update_entry(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(body): Json<UpdateEntryBody>,
) -> Result<Json<UpdateEntryResponse>, ApiError> {
	let response = state
		.service
		.update_entry(UpdateEntryRequest { subject: body.subject, id, patch: body.patch })
		.await?;

	Ok(Json(response))
}

async fn delete_entry(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Query(query): Query<SubjectQuery>,
) -> Result<Json<DeleteEntryResponse>, ApiError> {
	let response =
		state.service.delete_entry(DeleteEntryRequest { subject: query.subject, id }).await?;

	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::Validation { message } =>
				Self { status: StatusCode::BAD_REQUEST, error_code: "validation_failed", message },
			ServiceError::PermissionDenied { message } =>
				Self { status: StatusCode::FORBIDDEN, error_code: "permission_denied", message },
			ServiceError::NotFound { message } =>
				Self { status: StatusCode::NOT_FOUND, error_code: "not_found", message },
			ServiceError::Upstream { message } =>
				Self { status: StatusCode::BAD_GATEWAY, error_code: "upstream_failure", message },
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
