//! Formatting stage config.
//!
//! Each chunk is rendered through a template before embedding, so that
//! surrounding context (title, tags, …) can travel with the chunk text.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

/// The placeholder substituted with the chunk text.
pub const CHUNK_PLACEHOLDER: &str = "$chunk";

/// The reserved column name implied by the placeholder.
const CHUNK_COLUMN: &str = "chunk";

/// How each chunk is rendered into the string sent to the embedder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum FormattingConfig {
    /// Embed the chunk text as-is.
    ChunkValue,
    /// Render a template substituting `$chunk` and `$<column>` values.
    Template {
        /// Template string; must contain `$chunk`.
        template: String,
        /// Source columns available as template variables. `None`
        /// means all source columns.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self::ChunkValue
    }
}

impl FormattingConfig {
    /// Validate against the source relation.
    ///
    /// Rejects sources that already contain a column literally named
    /// `chunk` (it would shadow the placeholder), checks that any
    /// explicit column subset exists, and requires the template to
    /// reference `$chunk`.
    pub fn validate(&self, source: &SourceSchemaInfo) -> Result<()> {
        if source.has_column(CHUNK_COLUMN) {
            return Err(ConfigError::ReservedColumn {
                column: CHUNK_COLUMN.to_string(),
            });
        }
        if let Self::Template { template, columns } = self {
            if !template.contains(CHUNK_PLACEHOLDER) {
                return Err(ConfigError::InvalidTemplate(format!(
                    "template must contain {CHUNK_PLACEHOLDER}"
                )));
            }
            if let Some(columns) = columns {
                for column in columns {
                    if !source.has_column(column) {
                        return Err(ConfigError::MissingColumn {
                            column: column.clone(),
                            table: source.table.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The source columns used as template variables, defaulting to all
    /// source columns when no explicit subset was given.
    pub fn effective_columns(&self, source: &SourceSchemaInfo) -> Vec<String> {
        match self {
            Self::ChunkValue => Vec::new(),
            Self::Template { columns, .. } => columns.clone().unwrap_or_else(|| {
                source.column_names().into_iter().map(str::to_string).collect()
            }),
        }
    }
}
