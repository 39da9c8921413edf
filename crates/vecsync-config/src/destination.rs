//! Destination stage config.
//!
//! Embeddings either land in a generated embedding-store table joined
//! back to the source through a view, or in a single nullable column
//! added to the source table itself.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

/// Where embeddings are written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// A generated embedding-store table plus a join view.
    Table,
    /// A nullable embedding column added directly to the source table.
    /// One embedding per row, so this requires chunking `none`.
    Column {
        /// Name of the column added to the source relation.
        embedding_column: String,
    },
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self::Table
    }
}

impl DestinationConfig {
    /// The embedding column name in column mode.
    pub fn embedding_column(&self) -> Option<&str> {
        match self {
            Self::Table => None,
            Self::Column { embedding_column } => Some(embedding_column),
        }
    }

    /// Validate against the source relation. The embedding column must
    /// not already exist, since provisioning adds it.
    pub fn validate(&self, source: &SourceSchemaInfo) -> Result<()> {
        let Self::Column { embedding_column } = self else {
            return Ok(());
        };
        if embedding_column.is_empty() {
            return Err(ConfigError::OutOfRange {
                param: "embedding_column",
                detail: "must not be empty".into(),
            });
        }
        if source.columns.iter().any(|c| c.name == *embedding_column) {
            return Err(ConfigError::ColumnExists {
                column: embedding_column.clone(),
                table: source.table.clone(),
            });
        }
        Ok(())
    }
}
