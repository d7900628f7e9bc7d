//! Join, ordering and pagination descriptors.

use std::fmt;

/// Join variant. INNER is the default when none is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Inner,
    Right,
}

impl JoinKind {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT",
            JoinKind::Inner => "INNER",
            JoinKind::Right => "RIGHT",
        }
    }
}

/// A join against another table with a raw ON expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: String,
}

impl Join {
    /// Inner join (the default kind).
    pub fn new(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::with_kind(JoinKind::Inner, table, on)
    }

    pub fn with_kind(kind: JoinKind, table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            on: on.into(),
        }
    }

    pub fn left(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::with_kind(JoinKind::Left, table, on)
    }

    pub fn right(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::with_kind(JoinKind::Right, table, on)
    }

    pub(crate) fn to_sql(&self) -> String {
        format!("{} JOIN {} ON {}", self.kind.as_sql(), self.table, self.on)
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        })
    }
}

/// One ORDER BY entry; list order is clause order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub(crate) fn to_sql(&self) -> String {
        format!("{} {}", self.field, self.direction)
    }
}

/// Row-offset pagination. `limit == 0` means unlimited: OFFSET is still
/// emitted but no LIMIT clause is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub start: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(start: u64, limit: u64) -> Self {
        Self { start, limit }
    }
}
