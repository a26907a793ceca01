//! Integration tests for artifact capture under both strategies.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use buildhost::{
    load_context, ArtifactLoadContext, BinaryLoader, CaptureStrategy, CapturingLoadContext,
    HostError, HostResult, LiveHandle,
};

/// Loader standing in for the host runtime in these tests.
struct RecordingLoader;

impl BinaryLoader for RecordingLoader {
    fn bind_by_name(&self, name: &str) -> HostResult<LiveHandle> {
        Ok(LiveHandle::new(name, Arc::new(())))
    }

    fn bind_file(&self, path: &Path) -> HostResult<LiveHandle> {
        Ok(LiveHandle::new(path.display().to_string(), Arc::new(())))
    }

    fn bind_stream(
        &self,
        binary: &mut dyn Read,
        _symbols: Option<&mut dyn Read>,
    ) -> HostResult<LiveHandle> {
        let mut bytes = Vec::new();
        binary
            .read_to_end(&mut bytes)
            .map_err(|e| HostError::io("reading binary stream", e))?;
        Ok(LiveHandle::new("stream", Arc::new(bytes)))
    }
}

#[test]
fn capture_preserves_exact_sizes() {
    let binary = vec![0xAAu8; 4096];
    let symbols = vec![0x55u8; 931];

    let mut ctx = CapturingLoadContext::new();
    let artifact = ctx
        .load_stream(&mut Cursor::new(&binary), Some(&mut Cursor::new(&symbols)))
        .unwrap()
        .captured()
        .expect("capture strategy never yields a live handle");

    assert_eq!(artifact.bytes.len(), 4096);
    assert_eq!(artifact.bytes, binary);
    assert_eq!(artifact.symbol_bytes.as_ref().map(Vec::len), Some(931));
}

#[test]
fn capture_works_from_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let bin_path = dir.path().join("out.bin");
    let pdb_path = dir.path().join("out.pdb");
    std::fs::write(&bin_path, [1u8, 2, 3, 4, 5]).unwrap();
    std::fs::write(&pdb_path, [9u8, 8]).unwrap();

    let mut ctx = CapturingLoadContext::new();
    ctx.load_file(&bin_path).unwrap();

    let mut binary = File::open(&bin_path).unwrap();
    let mut symbols = File::open(&pdb_path).unwrap();
    let artifact = ctx
        .load_stream(&mut binary, Some(&mut symbols))
        .unwrap()
        .captured()
        .unwrap();

    assert_eq!(artifact.bytes, [1, 2, 3, 4, 5]);
    assert_eq!(artifact.symbol_bytes.as_deref(), Some([9u8, 8].as_slice()));
    assert_eq!(artifact.source_path.as_deref(), Some(bin_path.as_path()));
}

#[test]
fn execute_strategy_yields_a_handle_and_no_buffers() {
    let mut ctx = load_context(CaptureStrategy::Execute, Arc::new(RecordingLoader));
    let result = ctx
        .load_stream(&mut Cursor::new(vec![7u8; 128]), None)
        .unwrap();

    let handle = result.executed().expect("execute yields a live handle");
    assert_eq!(handle.identity(), "stream");
    // The loader's token carries the bound bytes; the capture buffers stay
    // empty because no CapturedArtifact exists at all on this path.
    assert_eq!(handle.token::<Vec<u8>>().unwrap().len(), 128);
}

#[test]
fn strategy_selection_controls_the_by_name_behavior() {
    let loader: Arc<dyn BinaryLoader> = Arc::new(RecordingLoader);

    let mut executing = load_context(CaptureStrategy::Execute, loader.clone());
    assert!(executing.load_by_name("System.Runtime").is_ok());

    let mut capturing = load_context(CaptureStrategy::Capture, loader);
    let err = capturing.load_by_name("System.Runtime").unwrap_err();
    assert!(matches!(
        err,
        HostError::Unsupported {
            operation: "load by name",
            ..
        }
    ));
}

#[test]
fn captured_artifacts_round_trip_through_serde() {
    let mut ctx = CapturingLoadContext::new();
    ctx.load_file(Path::new("out/app.bin")).unwrap();
    let artifact = ctx
        .load_stream(
            &mut Cursor::new(b"payload".as_slice()),
            Some(&mut Cursor::new(b"symbols".as_slice())),
        )
        .unwrap()
        .captured()
        .unwrap();

    // The transport collaborator ships artifacts to the client tool.
    let encoded = toml::to_string(&artifact).unwrap();
    let decoded: buildhost::CapturedArtifact = toml::from_str(&encoded).unwrap();
    assert_eq!(decoded, artifact);
}

#[test]
fn capture_failure_reports_which_stream_broke() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer vanished",
            ))
        }
    }

    let mut ctx = CapturingLoadContext::new();
    let err = ctx
        .load_stream(&mut Cursor::new(b"ok".as_slice()), Some(&mut Broken))
        .unwrap_err();
    assert!(err.to_string().contains("symbol stream"));
}
