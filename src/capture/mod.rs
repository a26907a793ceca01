//! Artifact capture: obtaining compiled binary output with or without
//! binding it into the host process.
//!
//! The capture strategy exists so a long-lived host can hand build output
//! to inspection or transport without the side effects of loading it:
//! file locks, identity-conflict crashes, and the memory growth of
//! accumulating loaded modules across many compilations.

mod executing;
mod non_loading;

pub use executing::{BinaryLoader, ExecutingLoadContext, LiveHandle};
pub use non_loading::CapturingLoadContext;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::HostResult;

/// How compiled output is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureStrategy {
    /// Bind the binary into the current process and hand back a live
    /// handle.
    Execute,
    /// Own the raw bytes without loading anything.
    Capture,
}

/// Outcome of a load operation. Exactly one variant is populated per
/// operation; a consumer never has to inspect both branches for emptiness.
#[derive(Debug)]
pub enum CaptureResult {
    /// The binary is bound into the process.
    Executed(LiveHandle),
    /// The binary's bytes were captured without loading.
    Captured(CapturedArtifact),
}

impl CaptureResult {
    /// The captured bytes, if this is the capture variant.
    pub fn captured(self) -> Option<CapturedArtifact> {
        match self {
            CaptureResult::Captured(artifact) => Some(artifact),
            CaptureResult::Executed(_) => None,
        }
    }

    /// The live handle, if this is the execute variant.
    pub fn executed(self) -> Option<LiveHandle> {
        match self {
            CaptureResult::Executed(handle) => Some(handle),
            CaptureResult::Captured(_) => None,
        }
    }
}

/// Raw compiled output plus optional debug symbols, ready for inspection
/// or transport to a client tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedArtifact {
    /// The binary output, byte for byte.
    pub bytes: Vec<u8>,
    /// The debug-symbol output, if a symbol stream was supplied.
    pub symbol_bytes: Option<Vec<u8>>,
    /// Where the binary would have been written, if a path was supplied.
    pub source_path: Option<PathBuf>,
}

/// A load context turns compiled output into a [`CaptureResult`] according
/// to its strategy.
///
/// Calls are stateless with respect to each other apart from the recorded
/// source path; contexts are safe for unlimited concurrent use through
/// `&mut` handles on separate instances.
pub trait ArtifactLoadContext: Send {
    /// Resolve a capability purely by name, without bytes. Structurally
    /// unsupported under the capture strategy.
    fn load_by_name(&mut self, name: &str) -> HostResult<CaptureResult>;

    /// Load from a file on disk.
    fn load_file(&mut self, path: &Path) -> HostResult<CaptureResult>;

    /// Load from a binary stream and an optional debug-symbol stream.
    fn load_stream(
        &mut self,
        binary: &mut dyn Read,
        symbols: Option<&mut dyn Read>,
    ) -> HostResult<CaptureResult>;
}

/// Build the load context for `strategy`.
///
/// The `loader` seam is only consulted by the execute strategy; the
/// capture strategy never binds anything.
pub fn load_context(
    strategy: CaptureStrategy,
    loader: Arc<dyn BinaryLoader>,
) -> Box<dyn ArtifactLoadContext> {
    match strategy {
        CaptureStrategy::Execute => Box::new(ExecutingLoadContext::new(loader)),
        CaptureStrategy::Capture => Box::new(CapturingLoadContext::new()),
    }
}
