//! Dynamic WHERE clauses for list queries
//!
//! SQLite and MySQL both use `?` placeholders, so a clause built once can
//! be bound against either driver.

use chrono::{DateTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// Conditions joined with `AND`, each holding its own placeholders
#[derive(Debug, Default, Clone)]
pub struct WhereClause {
    conditions: Vec<String>,
    binds: Vec<BindValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition containing exactly one `?`
    pub fn push(&mut self, condition: &str, value: BindValue) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.binds.push(value);
        self
    }

    /// Match `term` as a substring of any of `columns`
    pub fn push_search(&mut self, columns: &[&str], term: &str) -> &mut Self {
        let term = term.trim();
        if term.is_empty() || columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", term);
        let parts: Vec<String> = columns.iter().map(|c| format!("{} LIKE ?", c)).collect();
        self.conditions.push(format!("({})", parts.join(" OR ")));
        for _ in columns {
            self.binds.push(BindValue::Text(pattern.clone()));
        }
        self
    }

    /// Rendered clause with a leading space, or an empty string
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }
}

pub fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[BindValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in binds {
        query = match value {
            BindValue::Text(s) => query.bind(s.clone()),
            BindValue::Int(i) => query.bind(*i),
            BindValue::Bool(b) => query.bind(*b),
            BindValue::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

pub fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    binds: &[BindValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in binds {
        query = match value {
            BindValue::Text(s) => query.bind(s.clone()),
            BindValue::Int(i) => query.bind(*i),
            BindValue::Bool(b) => query.bind(*b),
            BindValue::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

/// Build `?, ?, ?` for an `IN (...)` list
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clause() {
        let clause = WhereClause::new();
        assert_eq!(clause.sql(), "");
        assert!(clause.binds().is_empty());
    }

    #[test]
    fn test_conditions_and_binds_stay_aligned() {
        let mut clause = WhereClause::new();
        clause
            .push("status = ?", BindValue::Text("ACTIVE".into()))
            .push_search(&["email", "name"], "ann")
            .push("id > ?", BindValue::Int(3));

        assert_eq!(
            clause.sql(),
            " WHERE status = ? AND (email LIKE ? OR name LIKE ?) AND id > ?"
        );
        assert_eq!(clause.binds().len(), 4);
        assert_eq!(clause.binds()[1], BindValue::Text("%ann%".into()));
    }

    #[test]
    fn test_blank_search_ignored() {
        let mut clause = WhereClause::new();
        clause.push_search(&["title"], "   ");
        assert_eq!(clause.sql(), "");
        assert!(clause.binds().is_empty());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(1), "?");
    }
}
