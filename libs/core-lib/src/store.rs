//! Query vocabulary for the [`TableStore`](crate::TableStore) port.
//!
//! Only what the dashboard needs is expressible: equality filters,
//! case-insensitive substring search, a single ordering column and a limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Backend tables referenced by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    TenantConfig,
    Organizations,
    Users,
    AuthUsers,
    Conversations,
    Messages,
    SalesLeads,
    Deals,
    Sequences,
    MarketingCampaigns,
    Templates,
    AudienceSegments,
    BlogPosts,
    SocialPosts,
    SystemEvents,
    LandingPages,
}

impl Table {
    pub const ALL: [Table; 16] = [
        Table::TenantConfig,
        Table::Organizations,
        Table::Users,
        Table::AuthUsers,
        Table::Conversations,
        Table::Messages,
        Table::SalesLeads,
        Table::Deals,
        Table::Sequences,
        Table::MarketingCampaigns,
        Table::Templates,
        Table::AudienceSegments,
        Table::BlogPosts,
        Table::SocialPosts,
        Table::SystemEvents,
        Table::LandingPages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::TenantConfig => "tenant_config",
            Table::Organizations => "organizations",
            Table::Users => "users",
            Table::AuthUsers => "auth_users",
            Table::Conversations => "conversations",
            Table::Messages => "messages",
            Table::SalesLeads => "sales_leads",
            Table::Deals => "deals",
            Table::Sequences => "sequences",
            Table::MarketingCampaigns => "marketing_campaigns",
            Table::Templates => "templates",
            Table::AudienceSegments => "audience_segments",
            Table::BlogPosts => "blog_posts",
            Table::SocialPosts => "social_posts",
            Table::SystemEvents => "system_events",
            Table::LandingPages => "landing_pages",
        }
    }

    pub fn parse(name: &str) -> Option<Table> {
        Table::ALL.iter().copied().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    /// Case-insensitive substring match.
    Search(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Eq(value.into()),
        }
    }

    pub fn search(column: &str, term: &str) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Search(term.to_string()),
        }
    }

    /// Evaluates the filter against a JSON row. Used by the in-memory store.
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match &self.op {
            FilterOp::Eq(expected) => field == expected || as_text(field) == as_text(expected),
            FilterOp::Search(term) => as_text(field)
                .map(|text| text.to_lowercase().contains(&term.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// Renders scalar JSON values as text, as the backend compares them.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn search(mut self, column: &str, term: &str) -> Self {
        self.filters.push(Filter::search(column, term));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Column names reach SQL and URLs verbatim, so only plain identifiers are accepted.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(Table::parse(table.as_str()), Some(table));
        }
        assert_eq!(Table::parse("pg_shadow"), None);
    }

    #[test]
    fn eq_filter_compares_scalars_as_text() {
        let row = json!({"tenant_id": "acme", "unread_count": 3});
        assert!(Filter::eq("tenant_id", "acme").matches(&row));
        assert!(!Filter::eq("tenant_id", "globex").matches(&row));
        assert!(Filter::eq("unread_count", "3").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    #[test]
    fn search_is_case_insensitive() {
        let row = json!({"contact_name": "Maria Lopez"});
        assert!(Filter::search("contact_name", "lop").matches(&row));
        assert!(!Filter::search("contact_name", "smith").matches(&row));
    }

    #[test]
    fn identifiers_are_checked() {
        assert!(is_safe_identifier("tenant_id"));
        assert!(!is_safe_identifier("tenant_id; drop table users"));
        assert!(!is_safe_identifier("1abc"));
        assert!(!is_safe_identifier(""));
    }
}
