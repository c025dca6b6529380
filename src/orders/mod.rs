//! Order tracking back-end and its selection ledger.
//!
//! ## Overview
//!
//! Orders move through four departments (design, production, machining,
//! inspection). At each stage a department selects which of the order's
//! rows it is working on. Every selection is appended to the order's
//! status history; the current selection of a department is the most
//! recent qualifying event, never an updated row.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │   auth.rs (CallerRole extractor)       │
//!                       │         │                                        │
//!                       │         │ SelectionPayload::encode()             │
//!                       │         v                                        │
//!                       │  selection.rs  (payload codec, legacy decode)    │
//!                       │         │                                        │
//!                       │         │ MultiSelectionView::resolve()          │
//!                       │         v                                        │
//!                       │  view.rs  (per-role visibility of each stage)    │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  db.rs  (OrderDb, DbHandle, latest_event query)  │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Typical Request Flow (multi-department save)
//!
//! 1. `POST /api/orders/{order_id}/multi-selection` → `api::save_multi_selection()`
//! 2. `CallerRole` resolves the `X-User-Role` header; the endpoint role
//!    list is checked first, then each submitted set is checked against
//!    `models::WRITE_PERMISSIONS`. Sets the caller may not write are dropped.
//! 3. Each remaining set becomes a `SelectionPayload` with the marker set,
//!    the machining set is enriched with the machine name, and the payload
//!    is appended through `OrderDb::append_event`.
//! 4. A later `GET` asks `OrderDb::latest_event` for the tail of each
//!    department and `view.rs` decides what the caller's role may see.

pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod selection;
pub mod server;
pub mod view;
