//! Engine-neutral statement and result-set types.
//!
//! Both connectors accept the same [`Statement`] and hand back the same
//! [`ResultSet`], so nothing above `db` needs to know which engine is active.

use std::borrow::Cow;
use std::fmt;

/// A bound parameter value. The schema only has text columns, so text or NULL is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Null,
}

impl SqlValue {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s.as_str()),
            SqlValue::Null => None,
        }
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "'{s}'"),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

/// SQL text plus positional (`?`) parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: Cow<'static, str>,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql.trim())?;
        if !self.params.is_empty() {
            f.write_str(" [")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// One row of a raw result set: column name to nullable text value, in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    columns: Vec<(String, Option<String>)>,
}

impl ResultRow {
    pub fn new(columns: Vec<(String, Option<String>)>) -> Self {
        Self { columns }
    }

    /// Value of `column` (case-insensitive). `None` for both NULL and a missing column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .and_then(|(_, value)| value.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn first(&self) -> Option<&ResultRow> {
        self.rows.first()
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_display_includes_params() {
        let stmt = Statement::new("UPDATE SimpleTags SET tag = ? WHERE uuid = ?")
            .bind(None::<String>)
            .bind("abc");
        assert_eq!(
            stmt.to_string(),
            "UPDATE SimpleTags SET tag = ? WHERE uuid = ? [NULL, 'abc']"
        );
    }

    #[test]
    fn row_lookup_is_case_insensitive_and_null_aware() {
        let row = ResultRow::new(vec![
            ("uuid".to_string(), Some("u1".to_string())),
            ("tagPrefix".to_string(), None),
        ]);
        assert_eq!(row.get("UUID"), Some("u1"));
        assert_eq!(row.get("tagprefix"), None);
        assert_eq!(row.get("name"), None);
    }
}
