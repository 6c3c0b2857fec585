//! Streaming transport: an append-only byte channel bridging the producer
//! and consumer processes, plus an out-of-band session-active marker.
//!
//! Single writer, single reader. The writer only ever appends; the reader
//! only ever reads from its own cursor and observes growth through an
//! atomic file-size read, so no locking is needed between the two sides.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use livecap_foundation::AudioError;
use tracing::{debug, info};

use crate::format::SourceFormatRecord;

/// Flat, unframed canonical sample stream.
pub const STREAM_FILE: &str = "stream.pcm";
/// Presence = capture session active.
pub const ACTIVE_MARKER: &str = "session.active";
/// Fallback side channel: source format for consumer-side conversion.
pub const FORMAT_RECORD_FILE: &str = "source_format.json";

/// Producer side of the transport.
pub struct TransportWriter {
    dir: PathBuf,
    stream: File,
    bytes_appended: u64,
}

impl TransportWriter {
    /// Create the channel and assert the session-active marker. The marker
    /// appears only after the (empty) stream file exists, so a consumer
    /// that sees the marker can always open the stream.
    pub fn create(dir: &Path) -> Result<Self, AudioError> {
        fs::create_dir_all(dir)?;
        let stream = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dir.join(STREAM_FILE))?;
        fs::write(dir.join(ACTIVE_MARKER), b"")?;
        info!(target: "audio", dir = %dir.display(), "transport session started");
        Ok(Self {
            dir: dir.to_path_buf(),
            stream,
            bytes_appended: 0,
        })
    }

    /// Publish the source format for the consumer-side conversion fallback.
    pub fn write_format_record(&self, record: &SourceFormatRecord) -> Result<(), AudioError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| AudioError::Conversion(e.to_string()))?;
        fs::write(self.dir.join(FORMAT_RECORD_FILE), json)?;
        Ok(())
    }

    /// Append one canonical buffer at the channel's current end. No
    /// framing: the stream stays a flat sequence of canonical samples.
    pub fn append(&mut self, buf: &[u8]) -> Result<(), AudioError> {
        self.stream.write_all(buf)?;
        self.stream.flush()?;
        self.bytes_appended += buf.len() as u64;
        Ok(())
    }

    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended
    }

    /// Clear the session-active marker. Unread stream bytes become
    /// irrelevant; the file itself is left for diagnostics.
    pub fn finish(self) -> Result<(), AudioError> {
        fs::remove_file(self.dir.join(ACTIVE_MARKER))?;
        info!(
            target: "audio",
            bytes = self.bytes_appended,
            "transport session stopped"
        );
        Ok(())
    }
}

/// Consumer side of the transport. Owns the monotonic read cursor.
pub struct TransportReader {
    dir: PathBuf,
    cursor: u64,
}

impl TransportReader {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            cursor: 0,
        }
    }

    pub fn session_active(&self) -> bool {
        self.dir.join(ACTIVE_MARKER).exists()
    }

    pub fn read_format_record(&self) -> Option<SourceFormatRecord> {
        let bytes = fs::read(self.dir.join(FORMAT_RECORD_FILE)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Cursor lives for one capture session only.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Read everything appended since the last poll. `Ok(None)` covers
    /// both "no growth" and "file not created yet" — a read race is a
    /// skipped tick, never an error.
    pub fn poll(&mut self) -> Result<Option<Vec<u8>>, AudioError> {
        let path = self.dir.join(STREAM_FILE);
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(None),
        };
        if len <= self.cursor {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(self.cursor))?;
        let mut buf = vec![0u8; (len - self.cursor) as usize];
        let mut read = 0usize;
        while read < buf.len() {
            match file.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(read);
        if buf.is_empty() {
            return Ok(None);
        }

        self.cursor += buf.len() as u64;
        debug!(target: "audio", bytes = buf.len(), cursor = self.cursor, "transport delta read");
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatDescriptor;
    use tempfile::tempdir;

    #[test]
    fn marker_tracks_session_lifecycle() {
        let dir = tempdir().unwrap();
        let reader = TransportReader::new(dir.path());
        assert!(!reader.session_active());

        let writer = TransportWriter::create(dir.path()).unwrap();
        assert!(reader.session_active());

        writer.finish().unwrap();
        assert!(!reader.session_active());
    }

    #[test]
    fn poll_reads_exactly_the_appended_delta() {
        let dir = tempdir().unwrap();
        let mut writer = TransportWriter::create(dir.path()).unwrap();
        let mut reader = TransportReader::new(dir.path());

        assert!(reader.poll().unwrap().is_none());

        writer.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(reader.poll().unwrap().unwrap(), vec![1, 2, 3, 4]);
        assert!(reader.poll().unwrap().is_none());

        writer.append(&[5, 6]).unwrap();
        writer.append(&[7]).unwrap();
        assert_eq!(reader.poll().unwrap().unwrap(), vec![5, 6, 7]);
        assert_eq!(reader.cursor(), 7);
    }

    #[test]
    fn poll_before_stream_exists_is_a_silent_no_op() {
        let dir = tempdir().unwrap();
        let mut reader = TransportReader::new(dir.path());
        assert!(reader.poll().unwrap().is_none());
        assert_eq!(reader.cursor(), 0);
    }

    #[test]
    fn format_record_round_trips_through_side_channel() {
        let dir = tempdir().unwrap();
        let writer = TransportWriter::create(dir.path()).unwrap();
        let record: SourceFormatRecord = FormatDescriptor::canonical().into();
        writer.write_format_record(&record).unwrap();

        let reader = TransportReader::new(dir.path());
        assert_eq!(reader.read_format_record().unwrap(), record);
    }

    #[test]
    fn cursor_reset_rereads_from_start() {
        let dir = tempdir().unwrap();
        let mut writer = TransportWriter::create(dir.path()).unwrap();
        let mut reader = TransportReader::new(dir.path());

        writer.append(&[9, 9]).unwrap();
        assert_eq!(reader.poll().unwrap().unwrap(), vec![9, 9]);
        reader.reset();
        assert_eq!(reader.poll().unwrap().unwrap(), vec![9, 9]);
    }
}
