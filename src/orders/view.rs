//! Read-side views over the selection ledger.
//!
//! Both views are built from a lookup closure that answers "latest event
//! for this department under this filter", so the visibility rules here
//! stay independent of how the store orders and filters events.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::models::{Department, EventFilter, Role, SelectionEvent};
use super::selection::{self, SelectionPayload};

/// Response of the single-department `GET` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    pub selected_row_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
}

impl From<SelectionPayload> for SelectionView {
    fn from(payload: SelectionPayload) -> Self {
        Self {
            selected_row_ids: payload.selected_row_ids,
            machine_id: payload.machine_id,
            machine_name: payload.machine_name,
        }
    }
}

impl SelectionView {
    /// Decode the latest qualifying event, or the empty view if there is none.
    pub fn from_latest(latest: Option<&SelectionEvent>) -> Self {
        latest
            .and_then(|event| event.comment.as_deref())
            .map(selection::decode)
            .map(Self::from)
            .unwrap_or_default()
    }
}

/// Response of `GET /multi-selection`: the latest selection of each stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelectionView {
    pub designer_selected_row_ids: Vec<String>,
    pub production_selected_row_ids: Vec<String>,
    pub machine_selected_row_ids: Vec<String>,
    pub inspection_selected_row_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
}

impl MultiSelectionView {
    /// Assemble the view for a caller with `role`.
    ///
    /// Machining is the one role-conditioned stage. Inspection sees the
    /// latest machining event with any comment, marked or not, legacy or
    /// not. Everyone else sees the latest machining selection only when
    /// it was made with the multi-department form.
    pub fn resolve<F>(role: Role, mut latest: F) -> Result<Self>
    where
        F: FnMut(Department, EventFilter) -> Result<Option<SelectionEvent>>,
    {
        let mut stage_ids = |department: Department| -> Result<Vec<String>> {
            let event = latest(department, EventFilter::SelectionOnly)?;
            Ok(SelectionView::from_latest(event.as_ref()).selected_row_ids)
        };

        let designer_selected_row_ids = stage_ids(Department::Design)?;
        let production_selected_row_ids = stage_ids(Department::Production)?;
        let inspection_selected_row_ids = stage_ids(Department::Inspection)?;

        let inspector = role == Role::Inspection;
        let machining_filter = if inspector {
            EventFilter::AnyComment
        } else {
            EventFilter::SelectionOnly
        };
        let machining = latest(Department::Machining, machining_filter)?
            .and_then(|event| event.comment)
            .map(|comment| selection::decode(&comment))
            .filter(|payload| inspector || payload.is_marked())
            .unwrap_or_default();

        Ok(Self {
            designer_selected_row_ids,
            production_selected_row_ids,
            machine_selected_row_ids: machining.selected_row_ids,
            inspection_selected_row_ids,
            machine_id: machining.machine_id,
            machine_name: machining.machine_name,
        })
    }
}
