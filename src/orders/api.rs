use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use super::auth::CallerRole;
use super::db::DbHandle;
#[cfg(test)]
use super::db::OrderDb;
use super::models::{Department, EventFilter, Role, SelectionEvent};
use super::selection::SelectionPayload;
use super::view::{MultiSelectionView, SelectionView};
use crate::errors::ApiError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
}

pub type SharedState = Arc<AppState>;

// ── Endpoint roles ────────────────────────────────────────────────────

const PRODUCTION_SELECTION_ROLES: &[Role] = &[Role::Admin, Role::Design, Role::Production];
const MACHINING_SELECTION_ROLES: &[Role] = &[Role::Admin, Role::Production, Role::Machining];
const INSPECTION_WRITE_ROLES: &[Role] = &[Role::Admin, Role::Machining];
const INSPECTION_READ_ROLES: &[Role] = &[Role::Admin, Role::Machining, Role::Inspection];
const MULTI_SELECTION_ROLES: &[Role] = &[
    Role::Admin,
    Role::Design,
    Role::Production,
    Role::Machining,
    Role::Inspection,
];
const ORDER_ROW_ROLES: &[Role] = &[Role::Admin, Role::Design];
const MACHINE_ADMIN_ROLES: &[Role] = &[Role::Admin];

// ── Request payload types ─────────────────────────────────────────────

/// A JSON body that may be absent, `null` or malformed; all three are 400s.
type JsonBody<T> = Result<Json<Option<T>>, JsonRejection>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSelectionRequest {
    pub selected_row_ids: Option<Vec<String>>,
    pub machine_id: Option<i64>,
    pub three_checkbox: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelectionRequest {
    pub designer_selected_row_ids: Option<Vec<String>>,
    pub production_selected_row_ids: Option<Vec<String>>,
    pub machine_selected_row_ids: Option<Vec<String>>,
    pub inspection_selected_row_ids: Option<Vec<String>>,
    pub machine_id: Option<i64>,
}

impl MultiSelectionRequest {
    /// Non-empty submitted sets in workflow order, paired with their department.
    fn into_sets(self) -> Vec<(Department, Vec<String>)> {
        let submitted = [
            self.designer_selected_row_ids,
            self.production_selected_row_ids,
            self.machine_selected_row_ids,
            self.inspection_selected_row_ids,
        ];
        Department::STAGES
            .into_iter()
            .zip(submitted)
            .filter_map(|(department, rows)| {
                rows.filter(|rows| !rows.is_empty()).map(|rows| (department, rows))
            })
            .collect()
    }
}

#[derive(Deserialize)]
pub struct StatusEntryRequest {
    pub department: String,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRowInput {
    pub row_id: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineRequest {
    pub machine_name: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct CreateCommunicationRequest {
    pub department: String,
    pub message: String,
    pub priority: String,
}

/// Response of a successful single-department save.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSelection {
    pub id: i64,
    pub order_id: i64,
    pub department: Department,
    #[serde(flatten)]
    pub selection: SelectionPayload,
    pub created_at: String,
}

impl SavedSelection {
    fn new(event: SelectionEvent, selection: SelectionPayload) -> Self {
        Self {
            id: event.id,
            order_id: event.order_id,
            department: event.department,
            selection,
            created_at: event.created_at,
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/orders/{order_id}/selection",
            post(save_production_selection).get(get_production_selection),
        )
        .route(
            "/api/orders/{order_id}/machining-selection",
            post(save_machining_selection).get(get_machining_selection),
        )
        .route(
            "/api/orders/{order_id}/inspection-selection",
            post(save_inspection_selection).get(get_inspection_selection),
        )
        .route(
            "/api/orders/{order_id}/multi-selection",
            post(save_multi_selection).get(get_multi_selection),
        )
        .route(
            "/api/orders/{order_id}/history",
            get(list_history).post(append_history),
        )
        .route(
            "/api/orders/{order_id}/rows",
            get(list_order_rows).put(replace_order_rows),
        )
        .route("/api/machines", get(list_machines).post(create_machine))
        .route(
            "/api/machines/{id}",
            get(get_machine).put(update_machine).delete(delete_machine),
        )
        .route(
            "/api/communications",
            get(list_communications).post(create_communication),
        )
        .route("/api/communications/{id}/read", put(mark_communication_read))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn require_body<T>(body: JsonBody<T>) -> Result<T, ApiError> {
    match body {
        Ok(Json(Some(body))) => Ok(body),
        Ok(Json(None)) => Err(ApiError::BadRequest("Invalid request".into())),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}

fn require_rows(ids: Option<Vec<String>>) -> Result<Vec<String>, ApiError> {
    match ids {
        Some(ids) if !ids.is_empty() => {
            reject_blank_ids(&ids)?;
            Ok(ids)
        }
        _ => Err(ApiError::BadRequest("No rows selected".into())),
    }
}

/// Blank ids would be dropped when the stored comment is decoded.
fn reject_blank_ids(ids: &[String]) -> Result<(), ApiError> {
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ApiError::BadRequest("Row ids must not be blank".into()));
    }
    Ok(())
}

/// Name of the machine a selection is bound to. A failed lookup leaves the
/// selection without a name rather than failing the save.
async fn machine_name(state: &SharedState, machine_id: Option<i64>) -> Option<String> {
    let id = machine_id?;
    match state.db.call(move |db| db.get_machine(id)).await {
        Ok(Some(machine)) => Some(machine.machine_name),
        Ok(None) => {
            tracing::warn!(machine_id = id, "machine not found, saving selection without name");
            None
        }
        Err(e) => {
            tracing::warn!(machine_id = id, error = %e, "machine lookup failed");
            None
        }
    }
}

async fn append_selection(
    state: &SharedState,
    order_id: i64,
    department: Department,
    selection: SelectionPayload,
) -> Result<SavedSelection, ApiError> {
    let comment = selection.encode();
    let event = state
        .db
        .call(move |db| db.append_event(order_id, department, Some(&comment)))
        .await
        .map_err(|e| ApiError::internal("Failed to save selection", e))?;
    tracing::info!(
        order_id,
        %department,
        event_id = event.id,
        rows = selection.selected_row_ids.len(),
        "selection appended"
    );
    Ok(SavedSelection::new(event, selection))
}

async fn latest_selection(
    state: &SharedState,
    order_id: i64,
    department: Department,
) -> Result<SelectionView, ApiError> {
    let latest = state
        .db
        .call(move |db| db.latest_event(order_id, department, EventFilter::SelectionOnly))
        .await
        .map_err(|e| ApiError::internal("Failed to load selection", e))?;
    Ok(SelectionView::from_latest(latest.as_ref()))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn save_production_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
    body: JsonBody<RowSelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(PRODUCTION_SELECTION_ROLES)?;
    let req = require_body(body)?;
    let rows = require_rows(req.selected_row_ids)?;
    let selection = SelectionPayload::new(rows).with_marker(req.three_checkbox);
    let saved = append_selection(&state, order_id, Department::Production, selection).await?;
    Ok(Json(saved))
}

async fn get_production_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(PRODUCTION_SELECTION_ROLES)?;
    Ok(Json(latest_selection(&state, order_id, Department::Production).await?))
}

async fn save_machining_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
    body: JsonBody<RowSelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(MACHINING_SELECTION_ROLES)?;
    let req = require_body(body)?;
    let rows = require_rows(req.selected_row_ids)?;
    let name = machine_name(&state, req.machine_id).await;
    let selection = SelectionPayload::new(rows)
        .with_machine(req.machine_id, name)
        .with_marker(req.three_checkbox);
    let saved = append_selection(&state, order_id, Department::Machining, selection).await?;
    Ok(Json(saved))
}

async fn get_machining_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(MACHINING_SELECTION_ROLES)?;
    Ok(Json(latest_selection(&state, order_id, Department::Machining).await?))
}

async fn save_inspection_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
    body: JsonBody<RowSelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(INSPECTION_WRITE_ROLES)?;
    let req = require_body(body)?;
    let rows = require_rows(req.selected_row_ids)?;
    let saved =
        append_selection(&state, order_id, Department::Inspection, SelectionPayload::new(rows))
            .await?;
    Ok(Json(saved))
}

async fn get_inspection_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(INSPECTION_READ_ROLES)?;
    Ok(Json(latest_selection(&state, order_id, Department::Inspection).await?))
}

/// Append one marked event per submitted set the caller may write. Sets
/// the caller may not write are skipped; the first failed append aborts
/// the rest, and anything already appended stays.
async fn save_multi_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
    body: JsonBody<MultiSelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = caller.require(MULTI_SELECTION_ROLES)?;
    let req = require_body(body)?;
    let machine_id = req.machine_id;
    let sets = req.into_sets();
    for (_, rows) in &sets {
        reject_blank_ids(rows)?;
    }

    let mut appended = 0usize;
    for (department, rows) in sets {
        if !role.may_write(department) {
            tracing::warn!(
                order_id,
                %role,
                %department,
                "skipping selection set the caller may not write"
            );
            continue;
        }
        let mut selection = SelectionPayload::new(rows).with_marker(Some(true));
        if department == Department::Machining {
            let name = machine_name(&state, machine_id).await;
            selection = selection.with_machine(machine_id, name);
        }
        append_selection(&state, order_id, department, selection).await?;
        appended += 1;
    }

    tracing::info!(order_id, %role, appended, "multi-department selection saved");
    Ok(Json(serde_json::json!({
        "message": "Multi-department selection saved successfully"
    })))
}

async fn get_multi_selection(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    let role = caller.require(MULTI_SELECTION_ROLES)?;
    let view = state
        .db
        .call(move |db| {
            MultiSelectionView::resolve(role, |department, filter| {
                db.latest_event(order_id, department, filter)
            })
        })
        .await
        .map_err(|e| ApiError::internal("Failed to load multi-department selection", e))?;
    Ok(Json(view))
}

async fn list_history(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    _caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    let events = state
        .db
        .call(move |db| db.list_events(order_id))
        .await
        .map_err(|e| ApiError::internal("Failed to load status history", e))?;
    Ok(Json(events))
}

async fn append_history(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    _caller: CallerRole,
    body: JsonBody<StatusEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let req = require_body(body)?;
    let department = Department::from_str(&req.department).map_err(ApiError::BadRequest)?;
    let comment = req.comment;
    let event = state
        .db
        .call(move |db| db.append_event(order_id, department, comment.as_deref()))
        .await
        .map_err(|e| ApiError::internal("Failed to append status history", e))?;
    tracing::info!(order_id, %department, event_id = event.id, "status entry appended");
    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_order_rows(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(ORDER_ROW_ROLES)?;
    let rows = state
        .db
        .call(move |db| db.list_order_rows(order_id))
        .await
        .map_err(|e| ApiError::internal("Failed to load order rows", e))?;
    Ok(Json(rows))
}

async fn replace_order_rows(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
    caller: CallerRole,
    body: JsonBody<Vec<OrderRowInput>>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(ORDER_ROW_ROLES)?;
    let input = require_body(body)?;
    if input.iter().any(|row| row.row_id.trim().is_empty()) {
        return Err(ApiError::BadRequest("Row id must not be empty".into()));
    }
    let rows: Vec<(String, serde_json::Value)> =
        input.into_iter().map(|row| (row.row_id, row.fields)).collect();
    let saved = state
        .db
        .call(move |db| db.replace_order_rows(order_id, &rows))
        .await
        .map_err(|e| ApiError::internal("Failed to save order rows", e))?;
    tracing::info!(order_id, rows = saved.len(), "order rows replaced");
    Ok(Json(saved))
}

async fn list_machines(
    State(state): State<SharedState>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(MACHINE_ADMIN_ROLES)?;
    let machines = state
        .db
        .call(move |db| db.list_machines())
        .await
        .map_err(|e| ApiError::internal("Failed to list machines", e))?;
    Ok(Json(machines))
}

async fn create_machine(
    State(state): State<SharedState>,
    caller: CallerRole,
    body: JsonBody<MachineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(MACHINE_ADMIN_ROLES)?;
    let req = require_body(body)?;
    if req.machine_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Machine name must not be empty".into()));
    }
    let date_added = chrono::Local::now().format("%d-%m-%Y").to_string();
    let machine = state
        .db
        .call(move |db| db.create_machine(&req.machine_name, &req.status, &date_added))
        .await
        .map_err(|e| ApiError::internal("Failed to create machine", e))?;
    tracing::info!(machine_id = machine.id, "machine registered");
    Ok((StatusCode::CREATED, Json(machine)))
}

async fn get_machine(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let machine = state
        .db
        .call(move |db| db.get_machine(id))
        .await
        .map_err(|e| ApiError::internal("Failed to load machine", e))?;
    match machine {
        Some(machine) => Ok(Json(machine)),
        None => Err(ApiError::NotFound(format!("Machine {} not found", id))),
    }
}

async fn update_machine(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    caller: CallerRole,
    body: JsonBody<MachineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(MACHINE_ADMIN_ROLES)?;
    let req = require_body(body)?;
    if req.machine_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Machine name must not be empty".into()));
    }
    let machine = state
        .db
        .call(move |db| db.update_machine(id, &req.machine_name, &req.status))
        .await
        .map_err(|e| ApiError::internal("Failed to update machine", e))?;
    match machine {
        Some(machine) => Ok(Json(machine)),
        None => Err(ApiError::NotFound(format!("Machine {} not found", id))),
    }
}

async fn delete_machine(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(MACHINE_ADMIN_ROLES)?;
    let deleted = state
        .db
        .call(move |db| db.delete_machine(id))
        .await
        .map_err(|e| ApiError::internal("Failed to delete machine", e))?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound(format!("Machine {} not found", id))),
    }
}

async fn list_communications(
    State(state): State<SharedState>,
    _caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    let communications = state
        .db
        .call(move |db| db.list_communications())
        .await
        .map_err(|e| ApiError::internal("Failed to list communications", e))?;
    Ok(Json(communications))
}

async fn create_communication(
    State(state): State<SharedState>,
    _caller: CallerRole,
    body: JsonBody<CreateCommunicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let req = require_body(body)?;
    let department = Department::from_str(&req.department).map_err(ApiError::BadRequest)?;
    let now = chrono::Local::now();
    let date = now.format("%d-%m-%y").to_string();
    let time = now.format("%H:%M").to_string();
    let communication = state
        .db
        .call(move |db| {
            db.create_communication(department, &req.message, &req.priority, &date, &time)
        })
        .await
        .map_err(|e| ApiError::internal("Failed to create communication", e))?;
    tracing::info!(communication_id = communication.id, %department, "communication posted");
    Ok((StatusCode::CREATED, Json(communication)))
}

async fn mark_communication_read(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    _caller: CallerRole,
) -> Result<impl IntoResponse, ApiError> {
    let communication = state
        .db
        .call(move |db| db.mark_communication_read(id))
        .await
        .map_err(|e| ApiError::internal("Failed to mark communication as read", e))?;
    match communication {
        Some(communication) => Ok(Json(communication)),
        None => Err(ApiError::NotFound(format!("Communication {} not found", id))),
    }
}
