//! Document loading and parsing collaborators.
//!
//! URI fetching and rich-document parsing (PDF, HTML, …) live outside
//! the engine; the pipeline only depends on these trait shapes. The
//! built-in parser handles the common case of UTF-8 text payloads.

use async_trait::async_trait;

use crate::errors::{Result, WorkerError};

/// Fetches document bytes for `uri` loading configs.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Fetch the document at `uri`.
    async fn load(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Converts raw document bytes into embeddable text.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse `bytes` into text.
    async fn parse(&self, bytes: &[u8]) -> Result<String>;
}

/// Built-in parser: accepts UTF-8 text, rejects everything else.
pub struct PassthroughParser;

#[async_trait]
impl DocumentParser for PassthroughParser {
    async fn parse(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| WorkerError::Parse("payload is not valid UTF-8 text".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_accepts_utf8() {
        let parsed = PassthroughParser.parse("héllo".as_bytes()).await.unwrap();
        assert_eq!(parsed, "héllo");
    }

    #[tokio::test]
    async fn passthrough_rejects_binary() {
        let err = PassthroughParser.parse(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(matches!(err, WorkerError::Parse(_)));
    }
}
