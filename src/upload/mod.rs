//! In-memory reassembly of chunked uploads.
//!
//! Fragments are keyed by upload id and held until every index in
//! `0..total` has arrived. The completed upload is removed from the map
//! when it is handed out, so a failed transcription never leaves it behind.
//! Nothing is persisted; fragments sent to a different process are lost.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Default file name when the client sends none.
pub const DEFAULT_FILENAME: &str = "audio.mp3";

/// Upper bound on `totalChunks` for a single upload.
pub const MAX_CHUNKS: usize = 10_000;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ChunkError {
    #[error("chunk index {index} is out of range for {total} chunks")]
    IndexOutOfRange { index: usize, total: usize },
    #[error("upload {upload_id} was started with {expected} chunks, got {got}")]
    TotalMismatch {
        upload_id: String,
        expected: usize,
        got: usize,
    },
    #[error("total chunk count must be at least 1")]
    EmptyUpload,
    #[error("an upload may have at most {max} chunks, got {total}")]
    TooManyChunks { total: usize, max: usize },
}

/// One fragment as received from the client.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub upload_id: String,
    pub index: usize,
    pub total: usize,
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub user_id: Option<String>,
}

/// A fully reassembled upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledUpload {
    pub upload_id: String,
    pub filename: String,
    pub user_id: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkProgress {
    Pending { received: usize, total: usize },
    Complete(AssembledUpload),
}

#[derive(Debug)]
struct PendingUpload {
    total: usize,
    chunks: BTreeMap<usize, Vec<u8>>,
    filename: String,
    user_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct ChunkAssembler {
    uploads: Mutex<HashMap<String, PendingUpload>>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingUpload>> {
        match self.uploads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Store a fragment. A repeated index replaces the earlier fragment.
    ///
    /// Filename and user id are taken from the first fragment of an upload.
    pub fn add_chunk(&self, chunk: Chunk) -> Result<ChunkProgress, ChunkError> {
        if chunk.total == 0 {
            return Err(ChunkError::EmptyUpload);
        }
        if chunk.total > MAX_CHUNKS {
            return Err(ChunkError::TooManyChunks {
                total: chunk.total,
                max: MAX_CHUNKS,
            });
        }
        if chunk.index >= chunk.total {
            return Err(ChunkError::IndexOutOfRange {
                index: chunk.index,
                total: chunk.total,
            });
        }

        let mut uploads = self.lock();
        let pending = uploads
            .entry(chunk.upload_id.clone())
            .or_insert_with(|| PendingUpload {
                total: chunk.total,
                chunks: BTreeMap::new(),
                filename: chunk
                    .filename
                    .clone()
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
                user_id: chunk.user_id.clone().filter(|u| !u.is_empty()),
            });

        if pending.total != chunk.total {
            return Err(ChunkError::TotalMismatch {
                upload_id: chunk.upload_id,
                expected: pending.total,
                got: chunk.total,
            });
        }

        pending.chunks.insert(chunk.index, chunk.data);
        let received = pending.chunks.len();
        tracing::debug!(
            upload_id = %chunk.upload_id,
            received,
            total = chunk.total,
            "chunk stored"
        );

        if received < chunk.total {
            return Ok(ChunkProgress::Pending {
                received,
                total: chunk.total,
            });
        }

        let Some(done) = uploads.remove(&chunk.upload_id) else {
            return Ok(ChunkProgress::Pending {
                received,
                total: chunk.total,
            });
        };
        let data: Vec<u8> = done.chunks.into_values().flatten().collect();
        tracing::info!(
            upload_id = %chunk.upload_id,
            bytes = data.len(),
            "upload reassembled"
        );
        Ok(ChunkProgress::Complete(AssembledUpload {
            upload_id: chunk.upload_id,
            filename: done.filename,
            user_id: done.user_id,
            data,
        }))
    }

    /// Number of uploads still waiting for fragments.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}
