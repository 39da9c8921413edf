//! Chunking stage config.
//!
//! Splitting is deterministic given identical input and config, which
//! is what makes re-processing a key idempotent.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    400
}

fn default_separator() -> String {
    "\n\n".to_string()
}

fn default_separators() -> Vec<String> {
    vec![
        "\n\n".to_string(),
        "\n".to_string(),
        ".".to_string(),
        "?".to_string(),
        "!".to_string(),
        " ".to_string(),
        String::new(),
    ]
}

/// How text payloads are split into embeddable chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum ChunkingConfig {
    /// No splitting; the whole document is one chunk. Required for
    /// column-destination vectorizers.
    None,
    /// Split on a single fixed separator.
    CharacterTextSplitter {
        /// Target maximum chunk length in characters.
        #[serde(default = "default_chunk_size")]
        chunk_size: usize,
        /// Characters of overlap carried between adjacent chunks.
        #[serde(default = "default_chunk_overlap")]
        chunk_overlap: usize,
        /// The separator to split on.
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Try an ordered list of separators from coarsest to finest until
    /// pieces fit the target chunk size.
    RecursiveCharacterTextSplitter {
        /// Target maximum chunk length in characters.
        #[serde(default = "default_chunk_size")]
        chunk_size: usize,
        /// Characters of overlap carried between adjacent chunks.
        #[serde(default = "default_chunk_overlap")]
        chunk_overlap: usize,
        /// Separators in descending coarseness; an empty string means
        /// character-level splitting as the final fallback.
        #[serde(default = "default_separators")]
        separators: Vec<String>,
    },
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::RecursiveCharacterTextSplitter {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

impl ChunkingConfig {
    /// Target chunk size; zero when splitting is disabled.
    pub fn chunk_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::CharacterTextSplitter { chunk_size, .. }
            | Self::RecursiveCharacterTextSplitter { chunk_size, .. } => *chunk_size,
        }
    }

    /// Chunk overlap; zero when splitting is disabled.
    pub fn chunk_overlap(&self) -> usize {
        match self {
            Self::None => 0,
            Self::CharacterTextSplitter { chunk_overlap, .. }
            | Self::RecursiveCharacterTextSplitter { chunk_overlap, .. } => *chunk_overlap,
        }
    }

    /// Validate parameter ranges. The source schema is unused today but
    /// kept so every stage validates through the same shape.
    pub fn validate(&self, _source: &SourceSchemaInfo) -> Result<()> {
        if matches!(self, Self::None) {
            return Ok(());
        }
        if self.chunk_size() == 0 {
            return Err(ConfigError::OutOfRange {
                param: "chunk_size",
                detail: "must be greater than zero".into(),
            });
        }
        if self.chunk_overlap() >= self.chunk_size() {
            return Err(ConfigError::OutOfRange {
                param: "chunk_overlap",
                detail: format!(
                    "must be smaller than chunk_size ({} >= {})",
                    self.chunk_overlap(),
                    self.chunk_size()
                ),
            });
        }
        if let Self::RecursiveCharacterTextSplitter { separators, .. } = self {
            if separators.is_empty() {
                return Err(ConfigError::OutOfRange {
                    param: "separators",
                    detail: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceSchemaInfo {
        SourceSchemaInfo { table: "t".into(), columns: vec![] }
    }

    #[test]
    fn defaults() {
        let cfg = ChunkingConfig::default();
        assert_eq!(cfg.chunk_size(), 800);
        assert_eq!(cfg.chunk_overlap(), 400);
        assert!(cfg.validate(&source()).is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let cfg = ChunkingConfig::CharacterTextSplitter {
            chunk_size: 100,
            chunk_overlap: 100,
            separator: "\n".into(),
        };
        assert!(matches!(
            cfg.validate(&source()),
            Err(ConfigError::OutOfRange { param: "chunk_overlap", .. })
        ));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let cfg = ChunkingConfig::CharacterTextSplitter {
            chunk_size: 0,
            chunk_overlap: 0,
            separator: "\n".into(),
        };
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn empty_separator_list_rejected() {
        let cfg = ChunkingConfig::RecursiveCharacterTextSplitter {
            chunk_size: 100,
            chunk_overlap: 10,
            separators: vec![],
        };
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn none_skips_range_checks() {
        let cfg = ChunkingConfig::None;
        assert_eq!(cfg.chunk_size(), 0);
        assert!(cfg.validate(&source()).is_ok());
        let json = r#"{"implementation":"none"}"#;
        assert_eq!(serde_json::from_str::<ChunkingConfig>(json).unwrap(), cfg);
    }

    #[test]
    fn serde_tag_and_defaults() {
        let json = r#"{"implementation":"character_text_splitter"}"#;
        let cfg: ChunkingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.chunk_size(), 800);
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["implementation"], "character_text_splitter");
    }

    #[test]
    fn recursive_default_separator_cascade() {
        let json = r#"{"implementation":"recursive_character_text_splitter"}"#;
        let cfg: ChunkingConfig = serde_json::from_str(json).unwrap();
        if let ChunkingConfig::RecursiveCharacterTextSplitter { separators, .. } = &cfg {
            assert_eq!(separators.first().unwrap(), "\n\n");
            assert_eq!(separators.last().unwrap(), "");
        } else {
            panic!("wrong variant");
        }
    }
}
