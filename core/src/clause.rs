//! Accumulation of the WHERE/LIMIT tail of the next statement.
//!
//! A [`Clause`] collects predicates across chained calls and renders them as
//! a suffix that can be appended to `SELECT * FROM <table>`, `UPDATE ...` or
//! `DELETE FROM <table>`. Values arrive already rendered as SQL literals;
//! quoting is the caller's concern because it depends on the connection.
//!
//! Rendering order is fixed: predicates, then the executor suffix, then raw
//! fragments, then `LIMIT`/`OFFSET`. Call order therefore never produces an
//! unparseable tail.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator for structured predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl Cmp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "!=",
            Cmp::Gt => ">",
            Cmp::Gte => ">=",
            Cmp::Lt => "<",
            Cmp::Lte => "<=",
            Cmp::Like => "LIKE",
            Cmp::NotLike => "NOT LIKE",
        }
    }
}

/// Boolean connective joining a structured predicate to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn as_sql(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// Pending WHERE/LIMIT fragment.
///
/// At most one `WHERE` keyword is ever emitted; later predicates are joined
/// with a single space and carry their own connective.
///
/// # Examples
///
/// ```
/// use kiwi_core::Clause;
///
/// let mut clause = Clause::new();
/// clause.push_predicate("friend_id = ", "2");
/// clause.push_predicate("AND firstname LIKE ", "'%ar%'");
/// assert_eq!(
///     clause.render(""),
///     " WHERE friend_id = 2 AND firstname LIKE '%ar%'"
/// );
///
/// clause.set_limit(10, 20);
/// clause.push_raw("ORDER BY lastname");
/// assert_eq!(
///     clause.render(""),
///     " WHERE friend_id = 2 AND firstname LIKE '%ar%' ORDER BY lastname LIMIT 10 OFFSET 20"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clause {
    conditions: String,
    raw: String,
    limit: Option<(u64, u64)>,
}

impl Clause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a `WHERE` keyword has been emitted.
    pub fn has_where(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Appends caller-supplied predicate text followed by a rendered literal.
    ///
    /// The predicate is raw SQL: it carries the column, the comparison
    /// operator and, after the first call, the boolean connective.
    pub fn push_predicate(&mut self, predicate: &str, literal: &str) {
        self.conditions
            .push_str(if self.has_where() { " " } else { " WHERE " });
        self.conditions.push_str(predicate);
        self.conditions.push_str(literal);
    }

    /// Appends `column <op> literal`, prefixed by the connective unless it
    /// is the first predicate.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiwi_core::{Clause, Cmp, Connective};
    ///
    /// let mut clause = Clause::new();
    /// clause.push_comparison(Connective::And, "friend_id", Cmp::Eq, "2");
    /// clause.push_comparison(Connective::Or, "lastname", Cmp::Like, "'K%'");
    /// assert_eq!(clause.render(""), " WHERE friend_id = 2 OR lastname LIKE 'K%'");
    /// ```
    pub fn push_comparison(
        &mut self,
        connective: Connective,
        column: &str,
        cmp: Cmp,
        literal: &str,
    ) {
        let predicate = if self.has_where() {
            format!("{} {column} {} ", connective.as_sql(), cmp.as_sql())
        } else {
            format!("{column} {} ", cmp.as_sql())
        };
        self.push_predicate(&predicate, literal);
    }

    /// Appends raw SQL after the predicates (e.g. `ORDER BY ...`).
    pub fn push_raw(&mut self, sql: &str) {
        let sql = sql.trim();
        if sql.is_empty() {
            return;
        }
        self.raw.push(' ');
        self.raw.push_str(sql);
    }

    /// Sets `LIMIT n` and, when `offset > 0`, `OFFSET offset`. A later call
    /// replaces an earlier one.
    pub fn set_limit(&mut self, n: u64, offset: u64) {
        self.limit = Some((n, offset));
    }

    /// Replaces everything with a single `WHERE <column> = <literal>`.
    pub fn reset_to_key(&mut self, column: &str, literal: &str) {
        self.reset();
        self.push_predicate(&format!("{column} = "), literal);
    }

    /// Clears the fragment.
    pub fn reset(&mut self) {
        self.conditions.clear();
        self.raw.clear();
        self.limit = None;
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.raw.is_empty() && self.limit.is_none()
    }

    /// Renders the fragment with an executor suffix placed after the
    /// predicates. Empty parts add no whitespace.
    pub fn render(&self, suffix: &str) -> String {
        let mut out = self.conditions.clone();
        let suffix = suffix.trim();
        if !suffix.is_empty() {
            out.push(' ');
            out.push_str(suffix);
        }
        out.push_str(&self.raw);
        if let Some((n, offset)) = self.limit {
            out.push_str(&format!(" LIMIT {n}"));
            if offset > 0 {
                out.push_str(&format!(" OFFSET {offset}"));
            }
        }
        out
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clause_renders_nothing() {
        let clause = Clause::new();
        assert!(clause.is_empty());
        assert_eq!(clause.render(""), "");
        assert_eq!(clause.render("ORDER BY id"), " ORDER BY id");
    }

    #[test]
    fn test_single_where_keyword() {
        let mut clause = Clause::new();
        clause.push_predicate("note = ", "'WHERE'");
        clause.push_predicate("AND id > ", "3");
        let rendered = clause.render("");
        assert_eq!(rendered, " WHERE note = 'WHERE' AND id > 3");
        assert_eq!(rendered.matches(" WHERE ").count(), 1);
    }

    #[test]
    fn test_limit_without_offset() {
        let mut clause = Clause::new();
        clause.set_limit(5, 0);
        assert_eq!(clause.render(""), " LIMIT 5");
        clause.set_limit(1, 2);
        assert_eq!(clause.to_string(), " LIMIT 1 OFFSET 2");
    }

    #[test]
    fn test_limit_renders_after_suffix() {
        let mut clause = Clause::new();
        clause.set_limit(3, 0);
        clause.push_predicate("friend_id = ", "2");
        assert_eq!(
            clause.render("ORDER BY id DESC"),
            " WHERE friend_id = 2 ORDER BY id DESC LIMIT 3"
        );
    }

    #[test]
    fn test_reset_to_key_discards_previous_predicates() {
        let mut clause = Clause::new();
        clause.push_predicate("username = ", "'GP'");
        clause.set_limit(1, 0);
        clause.reset_to_key("id", "7");
        assert_eq!(clause.render(""), " WHERE id = 7");
    }

    #[test]
    fn test_blank_raw_is_ignored() {
        let mut clause = Clause::new();
        clause.push_raw("   ");
        assert!(clause.is_empty());
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(Cmp::NotLike.as_sql(), "NOT LIKE");
        assert_eq!(Cmp::Gte.as_sql(), ">=");
        assert_eq!(Connective::Or.as_sql(), "OR");
    }
}
