//! JSON-lines event log reader, optionally LZ4 frame compressed.

use super::{EventSource, EventSourceError};
use crate::domain::RawEvent;
use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One `RawEvent` JSON object per line. A `.lz4` suffix selects LZ4 frame
/// decompression.
#[derive(Debug, Clone)]
pub struct JsonLinesEventSource {
    path: PathBuf,
}

impl JsonLinesEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_compressed(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("lz4"))
            .unwrap_or(false)
    }
}

pub fn decompress_lz4_frame(lz4_bytes: &[u8]) -> Result<Vec<u8>, EventSourceError> {
    let mut decoder = lz4_flex::frame::FrameDecoder::new(lz4_bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| EventSourceError::Lz4(e.to_string()))?;
    Ok(out)
}

/// Parse JSON lines. Blank lines are skipped; unparseable lines are logged
/// and skipped since without an id they cannot be journaled.
pub fn parse_json_lines(bytes: &[u8]) -> Vec<RawEvent> {
    let text = String::from_utf8_lossy(bytes);
    let mut events = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping unparseable event line");
            }
        }
    }
    events
}

#[async_trait]
impl EventSource for JsonLinesEventSource {
    async fn fetch_events(&self) -> Result<Vec<RawEvent>, EventSourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| EventSourceError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        let bytes = if self.is_compressed() {
            decompress_lz4_frame(&bytes)?
        } else {
            bytes
        };

        let events = parse_json_lines(&bytes);
        debug!(path = %self.path.display(), count = events.len(), "Read event log");
        Ok(events)
    }
}
