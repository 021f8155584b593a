use crate::config::QueryOptions;

/// Isolation condition ANDed into every assembled query: the scope id must
/// equal at least one of `fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeClause {
    pub value: String,
    pub fields: Vec<String>,
}

impl ScopeClause {
    #[must_use]
    pub fn new(scope_id: &str, options: &QueryOptions) -> Self {
        Self { value: scope_id.to_string(), fields: options.scope_fields.clone() }
    }
}
