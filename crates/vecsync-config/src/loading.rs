//! Loading and parsing stage configs.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

/// How the worker obtains the raw payload for a source row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum LoadingConfig {
    /// Read the value of a source column directly.
    Column {
        /// The column holding the text (or bytes) to embed.
        column_name: String,
    },
    /// Treat a source column as a URI and fetch the referenced document
    /// through the external document loader.
    Uri {
        /// The column holding the URI.
        column_name: String,
    },
}

impl LoadingConfig {
    /// The source column this config reads.
    pub fn column_name(&self) -> &str {
        match self {
            Self::Column { column_name } | Self::Uri { column_name } => column_name,
        }
    }

    /// Validate against the source relation's columns.
    pub fn validate(&self, source: &SourceSchemaInfo) -> Result<()> {
        let column = self.column_name();
        if !source.has_column(column) {
            return Err(ConfigError::MissingColumn {
                column: column.to_string(),
                table: source.table.clone(),
            });
        }
        Ok(())
    }
}

/// Whether loaded payloads are run through the parsing collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum ParsingConfig {
    /// Parse non-text payloads into markdown/text; pass text through.
    #[default]
    Auto,
    /// Require the loaded value to already be plain text.
    None,
}
