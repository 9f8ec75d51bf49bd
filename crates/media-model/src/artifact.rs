//! Intermediate streams and output artifacts.

/// One encoded chunk emitted by an encoder sink during recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Encoded bytes.
    pub data: Vec<u8>,

    /// Monotonic sequence number assigned at emission.
    pub sequence: u64,
}

/// The concatenated encoded output of one recording.
///
/// Owned exclusively by the recorder until recording completes, then
/// moved to the orchestrator. Chunks are concatenated in arrival order;
/// reordering is never permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateStream {
    /// All chunk bytes, in arrival order.
    pub bytes: Vec<u8>,

    /// Declared MIME/container type of the encoded stream.
    pub mime_type: String,

    /// Number of chunks that were concatenated.
    pub chunk_count: usize,
}

impl IntermediateStream {
    /// Build a stream by concatenating chunks in the order given.
    pub fn from_chunks(chunks: Vec<EncodedChunk>, mime_type: impl Into<String>) -> Self {
        let chunk_count = chunks.len();
        let mut bytes = Vec::with_capacity(chunks.iter().map(|c| c.data.len()).sum());
        for chunk in chunks {
            bytes.extend_from_slice(&chunk.data);
        }
        Self {
            bytes,
            mime_type: mime_type.into(),
            chunk_count,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The final exported byte buffer handed back to the caller.
///
/// Created only on successful completion; the pipeline holds no cleanup
/// responsibility beyond dropping its own temporary buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Delivery-format bytes.
    pub bytes: Vec<u8>,

    /// Delivery MIME type.
    pub mime_type: String,

    /// Size of `bytes`.
    pub size_bytes: u64,
}

impl OutputArtifact {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            bytes,
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_concatenate_in_arrival_order() {
        let chunks = vec![
            EncodedChunk {
                data: vec![1, 2],
                sequence: 0,
            },
            EncodedChunk {
                data: vec![3],
                sequence: 1,
            },
            EncodedChunk {
                data: vec![4, 5, 6],
                sequence: 2,
            },
        ];
        let stream = IntermediateStream::from_chunks(chunks, "video/webm");
        assert_eq!(stream.bytes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(stream.chunk_count, 3);
        assert_eq!(stream.size_bytes(), 6);
    }

    #[test]
    fn test_empty_stream() {
        let stream = IntermediateStream::from_chunks(vec![], "video/mp4");
        assert!(stream.is_empty());
        assert_eq!(stream.chunk_count, 0);
    }

    #[test]
    fn test_artifact_size_matches_bytes() {
        let artifact = OutputArtifact::new(vec![0u8; 1234], "video/mp4");
        assert_eq!(artifact.size_bytes, 1234);
        assert_eq!(artifact.mime_type, "video/mp4");
    }
}
