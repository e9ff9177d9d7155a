//! Streaming multipart/form-data body encoder.
//!
//! Builds a request body out of named text fields and file attachments
//! without loading the attachments into memory. Text parts are encoded up
//! front; file parts keep an open handle and are read on demand while the
//! body is streamed.
//!
//! # Wire Format
//!
//! Lines are terminated with a bare `\n`, which is what the crash collection
//! endpoint expects:
//!
//! ```text
//! \n--BOUNDARY\nContent-Disposition: form-data; name="FIELD"\n\nVALUE
//! \n--BOUNDARY\nContent-Disposition: form-data; name="FILE"; filename="NAME"\nContent-Type: application/octet-stream\n\n<raw bytes>
//! \n--BOUNDARY--\n
//! ```
//!
//! Names, values and file names are written verbatim. Callers must keep the
//! boundary, quotes and control characters out of them.
//!
//! # Example
//!
//! ```no_run
//! use breakpad_upload::MultipartBody;
//!
//! let mut body = MultipartBody::new();
//! body.add_field("version", "42")?;
//! body.add_file("symbol_file", "crash.dmp", "/tmp/crash.dmp")?;
//! body.finish()?;
//!
//! let length = body.content_length();
//! let mut stream = body.open_stream()?;
//! let mut sink = Vec::new();
//! assert_eq!(stream.write_to(&mut sink)?, length);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Cursor, Read, Take, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Size of the chunks used when copying a body into a sink.
pub const CHUNK_SIZE: usize = 2048;

/// Content type of every file attachment.
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised while assembling or streaming a multipart body.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("multipart body is already finished")]
    AlreadyFinished,

    #[error("multipart body must be finished before it is streamed")]
    NotFinished,

    #[error("multipart body was already streamed; reset it first")]
    Consumed,

    #[error("can't use input file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Lifecycle of a [`MultipartBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    /// Parts may be added.
    Open,
    /// Closing boundary written; length is frozen.
    Finished,
    /// Segments were moved into a [`BodyStream`].
    Consumed,
}

/// One contiguous source of body bytes.
#[derive(Debug)]
enum Segment {
    Memory(Cursor<Vec<u8>>),
    File { path: PathBuf, reader: Take<File> },
}

impl Segment {
    fn file(path: &Path) -> io::Result<(Self, u64)> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let len = metadata.len();
        let segment = Segment::File {
            path: path.to_path_buf(),
            reader: file.take(len),
        };
        Ok((segment, len))
    }
}

impl Read for Segment {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Segment::Memory(cursor) => cursor.read(buf),
            Segment::File { path, reader } => {
                let n = reader.read(buf)?;
                // A file shorter than its size at add time would silently
                // break the declared Content-Length.
                if n == 0 && !buf.is_empty() && reader.limit() > 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "{} ended {} bytes early",
                            path.display(),
                            reader.limit()
                        ),
                    ));
                }
                Ok(n)
            }
        }
    }
}

/// A multipart/form-data body assembled from ordered segments.
///
/// Parts are written in the order they are added. The total length is
/// tracked as parts are added so it can be sent as `Content-Length` before
/// any byte of the body is produced.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    segments: Vec<Segment>,
    total_length: u64,
    parts: usize,
    state: BodyState,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    /// Creates an empty body with a random UUID v4 boundary.
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().to_string())
    }

    /// Creates an empty body with the given boundary token.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            segments: Vec::with_capacity(5),
            total_length: 0,
            parts: 0,
            state: BodyState::Open,
        }
    }

    /// Boundary token separating the parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BodyState {
        self.state
    }

    /// Whether the closing boundary has been written and the body can be streamed.
    pub fn is_finished(&self) -> bool {
        self.state == BodyState::Finished
    }

    /// Number of fields and files added so far.
    pub fn part_count(&self) -> usize {
        self.parts
    }

    /// Exact number of bytes the body streams.
    pub fn content_length(&self) -> u64 {
        self.total_length
    }

    /// Value for the `Content-Type` request header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Adds a text field.
    ///
    /// Fails only when the body is no longer open.
    pub fn add_field(&mut self, name: &str, value: &str) -> Result<(), MultipartError> {
        self.ensure_open()?;

        let mut data = self.part_header(name);
        data.push_str("\"\n\n");
        data.push_str(value);

        tracing::debug!(name, bytes = data.len(), "added multipart field");
        self.push_memory(data.into_bytes());
        self.parts += 1;
        Ok(())
    }

    /// Adds a file attachment read from `path` while streaming.
    ///
    /// The file is opened and sized immediately. If that fails the body is
    /// left unchanged and the I/O error is returned.
    pub fn add_file(
        &mut self,
        name: &str,
        file_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), MultipartError> {
        self.ensure_open()?;
        let path = path.as_ref();

        let (segment, file_len) = Segment::file(path).map_err(|source| {
            tracing::error!(file_name, path = %path.display(), error = %source, "can't use input file");
            MultipartError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut data = self.part_header(name);
        data.push_str("\"; filename=\"");
        data.push_str(file_name);
        data.push_str("\"\nContent-Type: ");
        data.push_str(FILE_CONTENT_TYPE);
        data.push_str("\n\n");

        tracing::debug!(name, file_name, bytes = file_len, "added multipart file");
        self.push_memory(data.into_bytes());
        self.segments.push(segment);
        self.total_length += file_len;
        self.parts += 1;
        Ok(())
    }

    /// Appends the closing boundary and freezes the body.
    ///
    /// A second call is rejected with [`MultipartError::AlreadyFinished`] and
    /// leaves the body untouched.
    pub fn finish(&mut self) -> Result<(), MultipartError> {
        self.ensure_open()?;

        let data = format!("\n--{}--\n", self.boundary);
        self.push_memory(data.into_bytes());
        self.state = BodyState::Finished;
        Ok(())
    }

    /// Moves the segments into a read-once stream.
    ///
    /// The body is left in [`BodyState::Consumed`] until [`reset`](Self::reset).
    pub fn open_stream(&mut self) -> Result<BodyStream, MultipartError> {
        match self.state {
            BodyState::Open => return Err(MultipartError::NotFinished),
            BodyState::Consumed => return Err(MultipartError::Consumed),
            BodyState::Finished => {}
        }

        self.state = BodyState::Consumed;
        Ok(BodyStream {
            segments: std::mem::take(&mut self.segments).into(),
            content_length: self.total_length,
            content_type: self.content_type(),
        })
    }

    /// Drops every segment, closing open files, and reopens the body.
    pub fn reset(&mut self) {
        self.segments.clear();
        self.total_length = 0;
        self.parts = 0;
        self.state = BodyState::Open;
    }

    fn ensure_open(&self) -> Result<(), MultipartError> {
        match self.state {
            BodyState::Open => Ok(()),
            BodyState::Finished | BodyState::Consumed => Err(MultipartError::AlreadyFinished),
        }
    }

    fn part_header(&self, name: &str) -> String {
        format!(
            "\n--{}\nContent-Disposition: form-data; name=\"{}",
            self.boundary, name
        )
    }

    fn push_memory(&mut self, data: Vec<u8>) {
        self.total_length += data.len() as u64;
        self.segments.push(Segment::Memory(Cursor::new(data)));
    }
}

/// Sequential reader over a finished [`MultipartBody`].
///
/// Each segment is dropped as soon as it is exhausted, so file handles are
/// released while the rest of the body is still streaming. Dropping the
/// stream early releases whatever is left.
#[derive(Debug)]
pub struct BodyStream {
    segments: VecDeque<Segment>,
    content_length: u64,
    content_type: String,
}

impl BodyStream {
    /// Total bytes this stream produces.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Value for the `Content-Type` request header.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Copies the rest of the stream into `sink` in [`CHUNK_SIZE`] chunks.
    ///
    /// Returns the number of bytes written. Read errors, including a file
    /// that shrank after it was added, are returned instead of truncating
    /// the output.
    pub fn write_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<u64> {
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = match self.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            sink.write_all(&buffer[..n])?;
            written += n as u64;
        }
        sink.flush()?;
        Ok(written)
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(segment) = self.segments.front_mut() {
            let n = segment.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.segments.pop_front();
        }
        Ok(0)
    }
}
