//! Indexing stage config.
//!
//! Approximate-nearest-neighbor index creation is a one-shot policy
//! evaluated by the scheduler, not part of the write path.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

fn default_min_rows() -> u64 {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_hnsw_m() -> u32 {
    16
}

fn default_hnsw_ef_construction() -> u32 {
    64
}

fn default_diskann_num_neighbors() -> u32 {
    50
}

fn default_diskann_search_list_size() -> u32 {
    100
}

fn default_diskann_alpha() -> f64 {
    1.2
}

fn default_storage_layout() -> String {
    "memory_optimized".to_string()
}

/// ANN index policy for the embedding column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum IndexingConfig {
    /// Never create an index.
    None,
    /// Graph-based HNSW index.
    Hnsw {
        /// Row-count threshold before the index is created.
        #[serde(default = "default_min_rows")]
        min_rows: u64,
        /// Neighbor count per graph node.
        #[serde(default = "default_hnsw_m")]
        m: u32,
        /// Build-time search width.
        #[serde(default = "default_hnsw_ef_construction")]
        ef_construction: u32,
        /// Defer creation until the work queue is empty.
        #[serde(default = "default_true")]
        create_when_queue_empty: bool,
    },
    /// Disk-oriented ANN variant.
    Diskann {
        /// Row-count threshold before the index is created.
        #[serde(default = "default_min_rows")]
        min_rows: u64,
        /// On-disk storage layout (`memory_optimized` or `plain`).
        #[serde(default = "default_storage_layout")]
        storage_layout: String,
        /// Graph neighbor count.
        #[serde(default = "default_diskann_num_neighbors")]
        num_neighbors: u32,
        /// Build-time search list size.
        #[serde(default = "default_diskann_search_list_size")]
        search_list_size: u32,
        /// Pruning parameter.
        #[serde(default = "default_diskann_alpha")]
        alpha: f64,
        /// Defer creation until the work queue is empty.
        #[serde(default = "default_true")]
        create_when_queue_empty: bool,
    },
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self::None
    }
}

impl IndexingConfig {
    /// Row-count threshold, if an index is configured.
    pub fn min_rows(&self) -> Option<u64> {
        match self {
            Self::None => None,
            Self::Hnsw { min_rows, .. } | Self::Diskann { min_rows, .. } => Some(*min_rows),
        }
    }

    /// Whether creation waits for an empty queue.
    pub fn create_when_queue_empty(&self) -> bool {
        match self {
            Self::None => false,
            Self::Hnsw { create_when_queue_empty, .. }
            | Self::Diskann { create_when_queue_empty, .. } => *create_when_queue_empty,
        }
    }

    /// Validate parameter ranges.
    pub fn validate(&self, _source: &SourceSchemaInfo) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Hnsw { m, ef_construction, .. } => {
                if *m < 2 {
                    return Err(ConfigError::OutOfRange {
                        param: "m",
                        detail: "must be at least 2".into(),
                    });
                }
                if *ef_construction == 0 {
                    return Err(ConfigError::OutOfRange {
                        param: "ef_construction",
                        detail: "must be greater than zero".into(),
                    });
                }
                Ok(())
            }
            Self::Diskann { storage_layout, num_neighbors, search_list_size, alpha, .. } => {
                if storage_layout != "memory_optimized" && storage_layout != "plain" {
                    return Err(ConfigError::OutOfRange {
                        param: "storage_layout",
                        detail: format!("unknown layout {storage_layout:?}"),
                    });
                }
                if *num_neighbors == 0 {
                    return Err(ConfigError::OutOfRange {
                        param: "num_neighbors",
                        detail: "must be greater than zero".into(),
                    });
                }
                if *search_list_size == 0 {
                    return Err(ConfigError::OutOfRange {
                        param: "search_list_size",
                        detail: "must be greater than zero".into(),
                    });
                }
                if *alpha < 1.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "alpha",
                        detail: format!("must be at least 1.0, got {alpha}"),
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceSchemaInfo {
        SourceSchemaInfo { table: "t".into(), columns: vec![] }
    }

    #[test]
    fn default_is_none() {
        let cfg = IndexingConfig::default();
        assert_eq!(cfg, IndexingConfig::None);
        assert!(cfg.min_rows().is_none());
        assert!(cfg.validate(&source()).is_ok());
    }

    #[test]
    fn hnsw_defaults() {
        let json = r#"{"implementation":"hnsw"}"#;
        let cfg: IndexingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.min_rows(), Some(100_000));
        assert!(cfg.create_when_queue_empty());
        assert!(cfg.validate(&source()).is_ok());
    }

    #[test]
    fn hnsw_small_m_rejected() {
        let cfg = IndexingConfig::Hnsw {
            min_rows: 0,
            m: 1,
            ef_construction: 64,
            create_when_queue_empty: true,
        };
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn diskann_alpha_range() {
        let json = r#"{"implementation":"diskann","alpha":0.5}"#;
        let cfg: IndexingConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(
            cfg.validate(&source()),
            Err(ConfigError::OutOfRange { param: "alpha", .. })
        ));
    }

    #[test]
    fn diskann_unknown_layout_rejected() {
        let json = r#"{"implementation":"diskann","storage_layout":"zipped"}"#;
        let cfg: IndexingConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn min_rows_zero_is_legal() {
        let cfg = IndexingConfig::Hnsw {
            min_rows: 0,
            m: 16,
            ef_construction: 64,
            create_when_queue_empty: false,
        };
        assert!(cfg.validate(&source()).is_ok());
    }
}
