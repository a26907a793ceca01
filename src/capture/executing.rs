//! Execute-strategy load context: binds binaries into the current process.

use std::any::Any;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use crate::errors::{HostError, HostResult};

use super::{ArtifactLoadContext, CaptureResult};

/// Collaborator seam for the actual binding step.
///
/// The surrounding host supplies the implementation that knows how to bind
/// compiled output into the running process and what a bound binary is for
/// its runtime. [`ExecutingLoadContext`] layers identity bookkeeping on
/// top, so loaders only report faults for malformed binaries and version
/// mismatches.
pub trait BinaryLoader: Send + Sync {
    /// Bind a binary the runtime already knows by name.
    fn bind_by_name(&self, name: &str) -> HostResult<LiveHandle>;

    /// Bind a binary from a file on disk.
    fn bind_file(&self, path: &Path) -> HostResult<LiveHandle>;

    /// Bind a binary from a stream, with optional debug symbols.
    fn bind_stream(
        &self,
        binary: &mut dyn Read,
        symbols: Option<&mut dyn Read>,
    ) -> HostResult<LiveHandle>;
}

/// A binary bound into the current process's execution context.
///
/// The `token` is whatever the loader's runtime uses to address the bound
/// binary; the core never inspects it. Debug symbols, when supplied, ride
/// along for diagnostics.
#[derive(Clone)]
pub struct LiveHandle {
    identity: String,
    token: Arc<dyn Any + Send + Sync>,
    symbol_bytes: Option<Arc<[u8]>>,
}

impl LiveHandle {
    /// A handle for the binary known to the runtime as `identity`.
    pub fn new(identity: impl Into<String>, token: Arc<dyn Any + Send + Sync>) -> Self {
        LiveHandle {
            identity: identity.into(),
            token,
            symbol_bytes: None,
        }
    }

    /// Associate debug symbols with the handle.
    pub fn with_symbols(mut self, symbols: Vec<u8>) -> Self {
        self.symbol_bytes = Some(symbols.into());
        self
    }

    /// The identity the binary was bound under.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The debug symbols associated with this handle, if any.
    pub fn symbol_bytes(&self) -> Option<&[u8]> {
        self.symbol_bytes.as_deref()
    }

    /// The loader's token for the bound binary, downcast to its concrete
    /// runtime type.
    pub fn token<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.token.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveHandle")
            .field("identity", &self.identity)
            .field(
                "symbol_bytes",
                &self.symbol_bytes.as_ref().map(|s| s.len()),
            )
            .finish()
    }
}

/// Load context that binds binaries through a [`BinaryLoader`] and tracks
/// loaded identities for the lifetime of the context.
///
/// Loading a stream or file whose identity is already bound is a
/// [`HostError::Load`]; loading by name is idempotent and returns the
/// existing handle.
pub struct ExecutingLoadContext {
    loader: Arc<dyn BinaryLoader>,
    loaded: DashMap<String, LiveHandle>,
}

impl ExecutingLoadContext {
    /// A context that binds through `loader`, with nothing loaded yet.
    pub fn new(loader: Arc<dyn BinaryLoader>) -> Self {
        ExecutingLoadContext {
            loader,
            loaded: DashMap::new(),
        }
    }

    /// Identities currently bound through this context.
    pub fn loaded_identities(&self) -> Vec<String> {
        self.loaded.iter().map(|e| e.key().clone()).collect()
    }

    fn admit(&self, handle: LiveHandle) -> HostResult<CaptureResult> {
        if self.loaded.contains_key(handle.identity()) {
            return Err(HostError::Load {
                identity: handle.identity().to_string(),
                reason: "already loaded under a conflicting identity".to_string(),
            });
        }
        debug!("bound binary `{}`", handle.identity());
        self.loaded
            .insert(handle.identity().to_string(), handle.clone());
        Ok(CaptureResult::Executed(handle))
    }
}

impl ArtifactLoadContext for ExecutingLoadContext {
    fn load_by_name(&mut self, name: &str) -> HostResult<CaptureResult> {
        if let Some(existing) = self.loaded.get(name) {
            return Ok(CaptureResult::Executed(existing.clone()));
        }
        let handle = self.loader.bind_by_name(name)?;
        self.admit(handle)
    }

    fn load_file(&mut self, path: &Path) -> HostResult<CaptureResult> {
        let handle = self.loader.bind_file(path)?;
        self.admit(handle)
    }

    fn load_stream(
        &mut self,
        binary: &mut dyn Read,
        symbols: Option<&mut dyn Read>,
    ) -> HostResult<CaptureResult> {
        let handle = self.loader.bind_stream(binary, symbols)?;
        self.admit(handle)
    }
}
