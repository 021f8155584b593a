//! Translation options shared by both backends.

use crate::errors::ODataError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ID_FIELD: &str = "_id";
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Field holding the store's object identifier.
    pub id_field: String,
    /// Fields compared against the scope id; a record matches when any of them does.
    pub scope_fields: Vec<String>,
    /// Reject value-token nodes that carry children instead of treating them as match-all.
    pub strict_nodes: bool,
    pub max_depth: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            scope_fields: vec!["connection_id".to_string(), "connection".to_string()],
            strict_nodes: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl QueryOptions {
    /// # Errors
    /// Returns an error if the TOML is malformed or the options are invalid.
    pub fn from_toml_str(s: &str) -> Result<Self, ODataError> {
        let opts: Self = toml::from_str(s)?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ODataError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ODataError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Applies overrides from the environment:
    /// - `ODATALITE_ID_FIELD`
    /// - `ODATALITE_SCOPE_FIELDS` (comma separated)
    /// - `ODATALITE_STRICT` (1/true/yes)
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(id) = std::env::var("ODATALITE_ID_FIELD")
            && !id.trim().is_empty()
        {
            self.id_field = id.trim().to_string();
        }
        if let Ok(fields) = std::env::var("ODATALITE_SCOPE_FIELDS") {
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            if !fields.is_empty() {
                self.scope_fields = fields;
            }
        }
        if let Ok(s) = std::env::var("ODATALITE_STRICT") {
            self.strict_nodes = matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// # Errors
    /// Returns `ODataError::Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ODataError> {
        if self.id_field.is_empty() {
            return Err(ODataError::Config("id_field must not be empty".into()));
        }
        if self.scope_fields.is_empty() {
            return Err(ODataError::Config("at least one scope field is required".into()));
        }
        if let Some(f) = self.scope_fields.iter().find(|f| f.is_empty() || f.starts_with('$')) {
            return Err(ODataError::Config(format!("invalid scope field '{f}'")));
        }
        if self.max_depth == 0 {
            return Err(ODataError::Config("max_depth must be positive".into()));
        }
        Ok(())
    }
}
