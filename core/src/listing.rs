use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::table::Table;

/// Ordering of a full table read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, ascending: bool) -> Self {
        Self {
            column: column.into(),
            ascending,
        }
    }

    /// Newest first on the table's default column.
    pub fn default_for(table: Table) -> Self {
        Self::new(table.default_order(), false)
    }

    pub fn from_query(table: Table, order: Option<&str>, ascending: Option<&str>) -> Self {
        let column = order
            .filter(|c| !c.is_empty())
            .unwrap_or(table.default_order())
            .to_string();
        let ascending = matches!(ascending, Some("true") | Some("1"));
        Self { column, ascending }
    }

    /// Rows missing the column (or holding null) always go last.
    pub fn sort(&self, rows: &mut [Value]) {
        rows.sort_by(|a, b| {
            let a = a.get(&self.column).filter(|v| !v.is_null());
            let b = b.get(&self.column).filter(|v| !v.is_null());
            match (a, b) {
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
                (Some(a), Some(b)) if self.ascending => compare(a, b),
                (Some(a), Some(b)) => compare(a, b).reverse(),
            }
        });
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_descending_by_timestamp() {
        let mut rows = vec![
            json!({"id": "a", "received_at": "2024-01-01T10:00:00Z"}),
            json!({"id": "b", "received_at": "2024-03-01T10:00:00Z"}),
            json!({"id": "c", "received_at": "2024-02-01T10:00:00Z"}),
        ];
        OrderBy::default_for(Table::Packages).sort(&mut rows);
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn rows_without_the_column_go_last_either_way() {
        let mut rows = vec![json!({"id": "x"}), json!({"id": "y", "date": "2024-05-01"})];
        OrderBy::new("date", true).sort(&mut rows);
        assert_eq!(rows[0]["id"], "y");
        OrderBy::new("date", false).sort(&mut rows);
        assert_eq!(rows[1]["id"], "x");
    }

    #[test]
    fn query_falls_back_to_table_default() {
        let order = OrderBy::from_query(Table::Visitors, None, None);
        assert_eq!(order, OrderBy::new("entry_at", false));
        let order = OrderBy::from_query(Table::Visitors, Some("name"), Some("true"));
        assert_eq!(order, OrderBy::new("name", true));
    }
}
