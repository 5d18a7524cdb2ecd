//! Chunk file production for the extract side of a copy run.
//!
//! Incoming bytes are reassembled into newline-delimited records, normalized,
//! and appended to a rolling series of gzip files. Every finalized file is
//! announced on a channel so uploads can start while extraction continues.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use pgshift_common::{PgShiftError, Result};

pub(crate) const CHUNK_FILE_PREFIX: &str = "chunk_";
pub(crate) const CHUNK_FILE_SUFFIX: &str = ".gz";

/// Collapse every run of backslashes that sits directly before a double
/// quote down to a single backslash.
///
/// The COPY text protocol doubles backslashes, so a JSON `\"` leaves the
/// source as `\\"`, which the warehouse JSON parser rejects. Backslash runs
/// not followed by a quote are left alone.
pub(crate) fn collapse_quote_escapes(line: &[u8]) -> Cow<'_, [u8]> {
    if !line.contains(&b'\\') {
        return Cow::Borrowed(line);
    }

    let mut out = Vec::with_capacity(line.len());
    let mut run = 0usize;
    for &byte in line {
        match byte {
            b'\\' => run += 1,
            b'"' => {
                if run > 0 {
                    out.push(b'\\');
                    run = 0;
                }
                out.push(b'"');
            }
            other => {
                for _ in 0..run {
                    out.push(b'\\');
                }
                run = 0;
                out.push(other);
            }
        }
    }
    for _ in 0..run {
        out.push(b'\\');
    }

    Cow::Owned(out)
}

/// Reassembles complete records from a stream of arbitrary byte slices.
///
/// Newlines terminate records and may fall anywhere in the incoming slices.
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Feed one slice, invoking `on_line` for every record completed by it.
    /// Lines are passed without their trailing newline.
    pub(crate) fn feed<F>(&mut self, chunk: &[u8], mut on_line: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos);
            if self.pending.is_empty() {
                on_line(line)?;
            } else {
                self.pending.extend_from_slice(line);
                on_line(&self.pending)?;
                self.pending.clear();
            }
            rest = &tail[1..];
        }
        self.pending.extend_from_slice(rest);
        Ok(())
    }

    /// Hand back the unterminated final record, if the stream ended without
    /// a trailing newline.
    pub(crate) fn finish(self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending)
        }
    }
}

/// Counters for a completed extraction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkStats {
    pub files: usize,
    pub records: u64,
}

struct OpenChunk {
    encoder: GzEncoder<BufWriter<File>>,
    path: PathBuf,
    bytes: u64,
}

/// A rolling series of gzip chunk files under one scratch directory.
///
/// A file rolls over once appending the next record would push its
/// uncompressed size past `max_bytes`; a single record larger than the bound
/// still gets a file of its own. Finalized file paths are sent on `notify`
/// in creation order, and dropping the set closes the channel.
pub(crate) struct ChunkFileSet {
    dir: PathBuf,
    max_bytes: u64,
    index: usize,
    current: Option<OpenChunk>,
    files_written: usize,
    records_written: u64,
    notify: UnboundedSender<PathBuf>,
}

impl ChunkFileSet {
    pub(crate) fn new(
        dir: impl Into<PathBuf>,
        max_bytes: u64,
        notify: UnboundedSender<PathBuf>,
    ) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            index: 0,
            current: None,
            files_written: 0,
            records_written: 0,
            notify,
        }
    }

    /// Append one record, rolling to a new chunk file when the current one
    /// would overflow.
    pub(crate) fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let needed = line.len() as u64 + 1;

        if self
            .current
            .as_ref()
            .is_some_and(|chunk| chunk.bytes > 0 && chunk.bytes + needed > self.max_bytes)
        {
            self.finalize_current()?;
        }

        if self.current.is_none() {
            self.open_next()?;
        }

        if let Some(chunk) = self.current.as_mut() {
            chunk.encoder.write_all(line)?;
            chunk.encoder.write_all(b"\n")?;
            chunk.bytes += needed;
        }
        self.records_written += 1;

        Ok(())
    }

    /// Finalize the open chunk file and report the totals. An extraction
    /// that produced no records leaves no files behind.
    pub(crate) fn finish(mut self) -> Result<ChunkStats> {
        self.finalize_current()?;
        Ok(ChunkStats {
            files: self.files_written,
            records: self.records_written,
        })
    }

    fn open_next(&mut self) -> Result<()> {
        let filename = format!("{}{:05}{}", CHUNK_FILE_PREFIX, self.index, CHUNK_FILE_SUFFIX);
        let path = self.dir.join(filename);
        let file = File::create(&path)?;

        debug!(path = %path.display(), "Opened chunk file");

        self.current = Some(OpenChunk {
            encoder: GzEncoder::new(BufWriter::new(file), Compression::default()),
            path,
            bytes: 0,
        });
        self.index += 1;

        Ok(())
    }

    fn finalize_current(&mut self) -> Result<()> {
        if let Some(chunk) = self.current.take() {
            let mut writer = chunk.encoder.finish()?;
            writer.flush()?;
            drop(writer);
            self.files_written += 1;

            debug!(
                path = %chunk.path.display(),
                uncompressed_bytes = chunk.bytes,
                "Finalized chunk file"
            );

            self.notify.send(chunk.path).map_err(|_| {
                PgShiftError::extraction("upload worker stopped before extraction finished")
            })?;
        }
        Ok(())
    }
}
