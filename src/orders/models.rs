use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Departments and roles ─────────────────────────────────────────────

/// Workflow stage tag carried by every status-history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    Design,
    Production,
    Machining,
    Inspection,
    Admin,
    Inquiry,
}

impl Department {
    /// The four stages an order row selection can be routed through, in
    /// workflow order.
    pub const STAGES: [Department; 4] = [
        Department::Design,
        Department::Production,
        Department::Machining,
        Department::Inspection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Design => "DESIGN",
            Self::Production => "PRODUCTION",
            Self::Machining => "MACHINING",
            Self::Inspection => "INSPECTION",
            Self::Admin => "ADMIN",
            Self::Inquiry => "INQUIRY",
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DESIGN" => Ok(Self::Design),
            "PRODUCTION" => Ok(Self::Production),
            "MACHINING" => Ok(Self::Machining),
            "INSPECTION" => Ok(Self::Inspection),
            "ADMIN" => Ok(Self::Admin),
            "INQUIRY" => Ok(Self::Inquiry),
            _ => Err(format!("Invalid department: {}", s)),
        }
    }
}

/// The single role supplied by the authentication layer for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Design,
    Production,
    Machining,
    Inspection,
    Inquiry,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Design,
        Role::Production,
        Role::Machining,
        Role::Inspection,
        Role::Inquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Design => "DESIGN",
            Self::Production => "PRODUCTION",
            Self::Machining => "MACHINING",
            Self::Inspection => "INSPECTION",
            Self::Inquiry => "INQUIRY",
        }
    }

    /// Whether this role may append a selection for `department` through
    /// the multi-department form.
    pub fn may_write(&self, department: Department) -> bool {
        WRITE_PERMISSIONS
            .iter()
            .find(|(d, _)| *d == department)
            .is_some_and(|(_, roles)| roles.contains(self))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts both `PRODUCTION` and the authority form `ROLE_PRODUCTION`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("ROLE_").unwrap_or(name);
        match name {
            "ADMIN" => Ok(Self::Admin),
            "DESIGN" => Ok(Self::Design),
            "PRODUCTION" => Ok(Self::Production),
            "MACHINING" => Ok(Self::Machining),
            "INSPECTION" => Ok(Self::Inspection),
            "INQUIRY" => Ok(Self::Inquiry),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Department selection set → roles allowed to write it.
pub const WRITE_PERMISSIONS: [(Department, &[Role]); 4] = [
    (Department::Design, &[Role::Design, Role::Admin]),
    (Department::Production, &[Role::Production, Role::Admin]),
    (Department::Machining, &[Role::Machining, Role::Admin]),
    (Department::Inspection, &[Role::Inspection, Role::Admin]),
];

// ── Ledger ────────────────────────────────────────────────────────────

/// One entry of an order's status history. Entries whose comment carries a
/// selection payload are the selection events; others are plain notes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEvent {
    /// Insertion sequence. Strictly increasing per store.
    pub id: i64,
    pub order_id: i64,
    pub department: Department,
    pub comment: Option<String>,
    pub created_at: String,
}

/// Which events a latest-per-department query accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Only events whose comment contains `selectedRowIds`.
    SelectionOnly,
    /// Any event with a non-null comment.
    AnyComment,
}

impl EventFilter {
    pub const SELECTION_MARKER: &'static str = "selectedRowIds";

    pub fn accepts(&self, comment: Option<&str>) -> bool {
        match (self, comment) {
            (_, None) => false,
            (Self::AnyComment, Some(_)) => true,
            (Self::SelectionOnly, Some(c)) => c.contains(Self::SELECTION_MARKER),
        }
    }
}

// ── Machines ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: i64,
    pub machine_name: String,
    pub status: String,
    pub date_added: String,
}

// ── Communications ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    pub id: i64,
    pub department: Department,
    pub message: String,
    pub date: String,
    pub time: String,
    pub priority: String,
    pub is_read: bool,
}

// ── Order rows ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub order_id: i64,
    pub row_id: String,
    pub position: i64,
    pub fields: serde_json::Value,
}
