//! CQL filter expressions for catalog item searches.

use std::fmt;

/// A rendered CQL query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqlQuery(String);

impl CqlQuery {
    /// Wrap an already rendered query.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    /// Query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `field==value` exact-match query with the value quoted.
    #[must_use]
    pub fn field_equals(field: &str, value: &str) -> Self {
        Self(format!("{field}=={}", quote(value)))
    }
}

impl fmt::Display for CqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Predicates that select candidate items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryCriteria {
    /// Item status names that qualify as lost.
    pub statuses: Vec<String>,
    /// Statistical code marking items damaged beyond repair.
    pub damaged_code: Option<String>,
    /// Note type that must be present when only patron-requested items qualify.
    pub patron_requesting_note_type: Option<String>,
    /// Statistical code marking items already in the workflow.
    pub in_workflow_code: String,
}

/// Builds the two catalog searches the triggers run.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    criteria: DiscoveryCriteria,
}

impl QueryBuilder {
    /// Create a builder for the given criteria.
    #[must_use]
    pub const fn new(criteria: DiscoveryCriteria) -> Self {
        Self { criteria }
    }

    /// The criteria this builder renders.
    #[must_use]
    pub const fn criteria(&self) -> &DiscoveryCriteria {
        &self.criteria
    }

    /// Search for new lost or damaged items not yet in the workflow.
    ///
    /// Returns `None` when neither statuses nor a damaged code are configured,
    /// since no item could ever qualify.
    #[must_use]
    pub fn discovery(&self) -> Option<CqlQuery> {
        let selection = self.selection_clause()?;

        let mut query = format!("({selection}");
        if let Some(note_type) = &self.criteria.patron_requesting_note_type {
            query.push_str(" and notes.itemNoteTypeId==");
            query.push_str(&quote(note_type));
        }
        query.push_str(" not ");
        query.push_str(self.in_workflow().as_str());
        query.push_str(") and discoverySuppress==false sortby hrid");

        Some(CqlQuery(query))
    }

    /// Search for items currently awaiting a workflow decision.
    #[must_use]
    pub fn in_workflow(&self) -> CqlQuery {
        CqlQuery::field_equals("statisticalCodeIds", &self.criteria.in_workflow_code)
    }

    fn selection_clause(&self) -> Option<String> {
        let statuses: Vec<String> = self
            .criteria
            .statuses
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| format!("status.name=={}", quote(s)))
            .collect();

        let status_clause = (!statuses.is_empty()).then(|| format!("({})", statuses.join(" or ")));
        let damaged_clause = self
            .criteria
            .damaged_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|code| CqlQuery::field_equals("statisticalCodeIds", code).0);

        match (status_clause, damaged_clause) {
            (Some(status), Some(damaged)) => Some(format!("({status} or {damaged})")),
            (Some(status), None) => Some(status),
            (None, Some(damaged)) => Some(format!("({damaged})")),
            (None, None) => None,
        }
    }
}

/// Quote a CQL term, escaping backslashes and double quotes.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
