//! Capture-only load context: owns bytes, never binds.

use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::{HostError, HostResult};

use super::{ArtifactLoadContext, CaptureResult, CapturedArtifact};

/// Load context that captures compiled output instead of executing it.
///
/// No parsing occurs, so a malformed binary can never fail here; the only
/// failure mode is an I/O error on the caller-supplied streams. The
/// process's execution context is untouched.
#[derive(Debug, Default)]
pub struct CapturingLoadContext {
    source_path: Option<PathBuf>,
}

impl CapturingLoadContext {
    /// A fresh context with no recorded source path.
    pub fn new() -> Self {
        Self::default()
    }

    /// The originating path recorded so far, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

impl ArtifactLoadContext for CapturingLoadContext {
    fn load_by_name(&mut self, _name: &str) -> HostResult<CaptureResult> {
        // Loading by identity alone would silently bind; refuse instead.
        Err(HostError::Unsupported {
            operation: "load by name",
            context: "capturing",
        })
    }

    fn load_file(&mut self, path: &Path) -> HostResult<CaptureResult> {
        // Only the origin is recorded; the file itself is never read.
        self.source_path = Some(path.to_path_buf());
        Ok(CaptureResult::Captured(CapturedArtifact {
            bytes: Vec::new(),
            symbol_bytes: None,
            source_path: self.source_path.clone(),
        }))
    }

    fn load_stream(
        &mut self,
        binary: &mut dyn Read,
        symbols: Option<&mut dyn Read>,
    ) -> HostResult<CaptureResult> {
        let mut bytes = Vec::new();
        binary
            .read_to_end(&mut bytes)
            .map_err(|e| HostError::io("reading binary stream", e))?;

        let symbol_bytes = match symbols {
            Some(stream) => {
                let mut buf = Vec::new();
                stream
                    .read_to_end(&mut buf)
                    .map_err(|e| HostError::io("reading symbol stream", e))?;
                Some(buf)
            }
            None => None,
        };

        debug!(
            "captured {} binary bytes, {} symbol bytes",
            bytes.len(),
            symbol_bytes.as_ref().map_or(0, Vec::len)
        );
        Ok(CaptureResult::Captured(CapturedArtifact {
            bytes,
            symbol_bytes,
            source_path: self.source_path.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn captures_streams_byte_for_byte() {
        let mut ctx = CapturingLoadContext::new();
        let binary = vec![0x4d, 0x5a, 0x90, 0x00];
        let symbols = vec![0x42, 0x53, 0x4a, 0x42, 0x01];

        let result = ctx
            .load_stream(&mut Cursor::new(&binary), Some(&mut Cursor::new(&symbols)))
            .unwrap();

        let artifact = result.captured().expect("capture variant");
        assert_eq!(artifact.bytes, binary);
        assert_eq!(artifact.symbol_bytes.as_deref(), Some(symbols.as_slice()));
        assert_eq!(artifact.source_path, None);
    }

    #[test]
    fn missing_symbol_stream_stays_absent() {
        let mut ctx = CapturingLoadContext::new();
        let artifact = ctx
            .load_stream(&mut Cursor::new(b"binary".as_slice()), None)
            .unwrap()
            .captured()
            .unwrap();
        assert_eq!(artifact.bytes, b"binary");
        assert!(artifact.symbol_bytes.is_none());
    }

    #[test]
    fn load_file_records_the_path_without_reading() {
        let mut ctx = CapturingLoadContext::new();
        // Deliberately nonexistent: the capture path must not touch disk.
        let artifact = ctx
            .load_file(Path::new("/nonexistent/out/app.bin"))
            .unwrap()
            .captured()
            .unwrap();
        assert_eq!(
            artifact.source_path.as_deref(),
            Some(Path::new("/nonexistent/out/app.bin"))
        );
        assert!(artifact.bytes.is_empty());
    }

    #[test]
    fn recorded_path_rides_along_with_a_later_stream_capture() {
        let mut ctx = CapturingLoadContext::new();
        ctx.load_file(Path::new("out/app.bin")).unwrap();

        let artifact = ctx
            .load_stream(&mut Cursor::new(b"bytes".as_slice()), None)
            .unwrap()
            .captured()
            .unwrap();
        assert_eq!(artifact.source_path.as_deref(), Some(Path::new("out/app.bin")));
    }

    #[test]
    fn load_by_name_is_unsupported() {
        let mut ctx = CapturingLoadContext::new();
        let err = ctx.load_by_name("System.Runtime").unwrap_err();
        assert!(matches!(err, HostError::Unsupported { .. }));
    }

    #[test]
    fn io_failure_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "stream torn down",
                ))
            }
        }

        let mut ctx = CapturingLoadContext::new();
        let err = ctx.load_stream(&mut Broken, None).unwrap_err();
        assert!(matches!(err, HostError::Io(..)));
    }
}
