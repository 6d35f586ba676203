use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tracing::debug;

/// A timestamped slice of encoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Encoder-assigned sequence number (0-indexed)
    pub sequence: u64,
    /// Capture time of the chunk relative to the encoder start
    pub offset: Duration,
    pub data: Bytes,
}

impl AudioChunk {
    pub fn new(sequence: u64, offset: Duration, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            offset,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Finalized recording: every chunk concatenated in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub mime_type: String,
    pub data: Bytes,
    pub chunk_count: usize,
}

impl Payload {
    pub fn empty(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Bytes::new(),
            chunk_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// MIME type without parameters (`audio/webm;codecs=opus` -> `audio/webm`)
    pub fn essence(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Upload file name derived from the MIME type
    pub fn file_name(&self) -> String {
        let ext = match self.essence() {
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/mpeg" => "mp3",
            "audio/mp4" => "m4a",
            "audio/pcm" => "pcm",
            _ => "bin",
        };
        format!("recording.{}", ext)
    }

    /// Reads a `key=value` MIME parameter (`rate`, `channels`)
    pub fn mime_param(&self, key: &str) -> Option<&str> {
        self.mime_type.split(';').skip(1).find_map(|param| {
            let (k, v) = param.split_once('=')?;
            (k.trim() == key).then(|| v.trim())
        })
    }
}

/// Ordered chunk accumulation, exclusively owned until finalization
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<AudioChunk>,
    bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk in arrival order; empty chunks are skipped
    pub fn push(&mut self, chunk: AudioChunk) {
        if chunk.is_empty() {
            return;
        }
        if let Some(last) = self.chunks.last() {
            if chunk.sequence <= last.sequence {
                debug!(
                    "Chunk {} arrived after chunk {}; keeping arrival order",
                    chunk.sequence, last.sequence
                );
            }
        }
        self.bytes += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.bytes
    }

    /// Concatenate every chunk into one payload tagged with `mime_type`
    pub fn finalize(self, mime_type: impl Into<String>) -> Payload {
        let mut data = BytesMut::with_capacity(self.bytes);
        for chunk in &self.chunks {
            data.extend_from_slice(&chunk.data);
        }

        Payload {
            mime_type: mime_type.into(),
            data: data.freeze(),
            chunk_count: self.chunks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_preserves_arrival_order() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(AudioChunk::new(0, Duration::ZERO, &b"ab"[..]));
        buffer.push(AudioChunk::new(1, Duration::from_secs(1), &b"cd"[..]));
        buffer.push(AudioChunk::new(2, Duration::from_secs(2), &b"e"[..]));

        assert_eq!(buffer.total_bytes(), 5);
        let payload = buffer.finalize("audio/webm");
        assert_eq!(&payload.data[..], b"abcde");
        assert_eq!(payload.chunk_count, 3);
    }

    #[test]
    fn test_empty_buffer_finalizes_to_valid_payload() {
        let payload = ChunkBuffer::new().finalize("audio/webm;codecs=opus");
        assert!(payload.is_empty());
        assert_eq!(payload.chunk_count, 0);
        assert_eq!(payload.essence(), "audio/webm");
    }

    #[test]
    fn test_empty_chunks_are_skipped() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(AudioChunk::new(0, Duration::ZERO, Bytes::new()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_file_name_and_params() {
        let payload = Payload::empty("audio/pcm;rate=48000;channels=1");
        assert_eq!(payload.file_name(), "recording.pcm");
        assert_eq!(payload.mime_param("rate"), Some("48000"));
        assert_eq!(payload.mime_param("channels"), Some("1"));
        assert_eq!(payload.mime_param("bits"), None);

        assert_eq!(Payload::empty("audio/webm").file_name(), "recording.webm");
        assert_eq!(Payload::empty("application/x-unknown").file_name(), "recording.bin");
    }
}
