//! Persisted vectorizer definition types.

use serde::{Deserialize, Serialize};
use vecsync_config::{
    ChunkingConfig, ConfigError, DestinationConfig, EmbeddingConfig, FormattingConfig,
    IndexingConfig, LoadingConfig, ParsingConfig, ProcessingConfig, SchedulingConfig,
};
use vecsync_core::{PrimaryKeyDescriptor, SourceSchemaInfo};

use crate::errors::Result;

/// Full pipeline configuration for one vectorizer, persisted as JSON in
/// the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Where the document content comes from.
    pub loading: LoadingConfig,
    /// How raw bytes become text.
    #[serde(default)]
    pub parsing: ParsingConfig,
    /// How text is split into chunks.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// How each chunk is rendered before embedding.
    #[serde(default)]
    pub formatting: FormattingConfig,
    /// Which embedding model produces vectors.
    pub embedding: EmbeddingConfig,
    /// Where embeddings are written.
    #[serde(default)]
    pub destination: DestinationConfig,
    /// Vector index policy for the target table.
    #[serde(default)]
    pub indexing: IndexingConfig,
    /// How work is scheduled.
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    /// Batch size, concurrency, and retry limits.
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl VectorizerConfig {
    /// Validate every stage against the source relation's live columns.
    ///
    /// Pure and order-independent: no stage validation depends on
    /// another stage having run first. The one cross-stage rule
    /// (destination/chunking compatibility) is checked here.
    pub fn validate(&self, schema: &SourceSchemaInfo) -> Result<()> {
        self.loading.validate(schema)?;
        self.chunking.validate(schema)?;
        self.formatting.validate(schema)?;
        self.embedding.validate(schema)?;
        self.destination.validate(schema)?;
        // Column mode stores one embedding per source row, so the
        // document must stay a single chunk.
        if matches!(self.destination, DestinationConfig::Column { .. })
            && !matches!(self.chunking, ChunkingConfig::None)
        {
            return Err(ConfigError::OutOfRange {
                param: "destination",
                detail: "column destination requires chunking \"none\"".into(),
            }
            .into());
        }
        self.indexing.validate(schema)?;
        self.scheduling.validate(schema)?;
        self.processing.validate(schema)?;
        Ok(())
    }
}

/// A registered vectorizer: identity, generated object names, resolved
/// key shape, and the pipeline config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorizerDefinition {
    /// Monotonic registry sequence number; generated object names embed
    /// it so they stay short and collision-free.
    pub seq: i64,
    /// Stable external ID (`vec-<uuid>`).
    pub id: String,
    /// Unique human-readable name.
    pub name: String,
    /// Source relation the vectorizer watches.
    pub source_table: String,
    /// Generated embedding-store table; `None` in column-destination
    /// mode, where embeddings live on the source table itself.
    pub target_table: Option<String>,
    /// Generated join view; `None` in column-destination mode.
    pub view_name: Option<String>,
    /// Generated change-queue table.
    pub queue_table: String,
    /// Base name of the generated trigger pair.
    pub trigger_name: String,
    /// Principal that created the vectorizer; lifecycle operations are
    /// restricted to it.
    pub owner: String,
    /// Whether the worker loop should process this vectorizer.
    pub enabled: bool,
    /// The source primary key as resolved at creation time.
    pub source_pk: PrimaryKeyDescriptor,
    /// Pipeline configuration.
    pub config: VectorizerConfig,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}
