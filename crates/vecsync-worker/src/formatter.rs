//! Chunk formatting.
//!
//! Renders each chunk through the configured template so surrounding
//! context (title, tags, …) travels with the chunk text into the
//! embedding.

use std::collections::BTreeMap;

use vecsync_config::FormattingConfig;
use vecsync_core::SourceSchemaInfo;

/// Renders chunks into the strings handed to the embedder.
#[derive(Clone, Debug)]
pub struct Formatter {
    template: Option<String>,
    columns: Vec<String>,
}

impl Formatter {
    /// Build a formatter, resolving the effective column set against
    /// the source relation.
    pub fn new(config: &FormattingConfig, source: &SourceSchemaInfo) -> Self {
        match config {
            FormattingConfig::ChunkValue => Self { template: None, columns: Vec::new() },
            FormattingConfig::Template { template, .. } => Self {
                template: Some(template.clone()),
                columns: config.effective_columns(source),
            },
        }
    }

    /// Source columns the formatter reads.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Render one chunk with the source row's column values.
    pub fn render(&self, chunk: &str, row: &BTreeMap<String, String>) -> String {
        let Some(template) = &self.template else {
            return chunk.to_string();
        };

        static EMPTY: &str = "";
        let mut vars: Vec<(&str, &str)> = self
            .columns
            .iter()
            .map(|c| (c.as_str(), row.get(c).map_or(EMPTY, String::as_str)))
            .collect();
        vars.push(("chunk", chunk));
        // Longest name first so `$title` never clobbers `$title_full`.
        vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = template.clone();
        for (name, value) in vars {
            out = out.replace(&format!("${name}"), value);
        }
        out
    }
}
