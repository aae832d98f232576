//! Drives [`MmdcRenderer`] through real processes using fake `mmdc` scripts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use mmbake_lib::{
    BakeConfig, Baker, DiagramId, DiagramStore, MmdcRenderer, RenderGateway, RenderOutcome,
    RenderStatus,
};
use serial_test::serial;

/// Writes an executable shell script named `mmdc` into `dir`.
fn fake_mmdc(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("mmdc");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Parses `-o <dest>` and writes a fake image there; logs its arguments.
const WRITES_OUTPUT: &str = r#"echo "$@" > "$(dirname "$0")/args.txt"
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
  esac
  shift
done
printf 'PNG' > "$out""#;

fn gateway(program: &Path, timeout: Duration) -> RenderGateway<MmdcRenderer> {
    RenderGateway::new(
        MmdcRenderer::with_program(program.to_string_lossy()),
        timeout,
    )
}

fn source_file(dir: &Path) -> (PathBuf, PathBuf) {
    let source = dir.join("d.mmd");
    std::fs::write(&source, "graph TD; A-->B;").unwrap();
    (source, dir.join("d.png"))
}

#[tokio::test]
#[serial]
async fn test_successful_render() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(bin.path(), WRITES_OUTPUT);
    let (source, dest) = source_file(out.path());

    let status = gateway(&program, Duration::from_secs(10))
        .render(&source, &dest)
        .await;

    assert_eq!(status, RenderStatus::Rendered);
    assert_eq!(std::fs::read(&dest).unwrap(), b"PNG");
}

#[tokio::test]
#[serial]
async fn test_config_options_reach_the_process() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(bin.path(), WRITES_OUTPUT);
    let (source, dest) = source_file(out.path());
    let config = BakeConfig::default()
        .with_renderer(program.to_string_lossy())
        .with_theme(mmbake_lib::MermaidTheme::Neutral)
        .with_background("transparent");

    let status = RenderGateway::new(MmdcRenderer::from_config(&config), config.timeout())
        .render(&source, &dest)
        .await;

    assert_eq!(status, RenderStatus::Rendered);
    let args = std::fs::read_to_string(bin.path().join("args.txt")).unwrap();
    let args: Vec<&str> = args.split_whitespace().collect();
    assert_eq!(args[..3], ["-i", &*source.to_string_lossy(), "-o"]);
    // mmdc writes into a staging directory beside the destination.
    assert!(args[3].starts_with(&*out.path().to_string_lossy()));
    assert!(args[3].ends_with("/d.png"));
    assert_eq!(args[4..], ["--theme", "neutral", "--backgroundColor", "transparent"]);
}

#[tokio::test]
#[serial]
async fn test_non_zero_exit_is_failure_with_stderr() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(
        bin.path(),
        "echo 'Error: Parse error on line 1' >&2\nexit 1",
    );
    let (source, dest) = source_file(out.path());

    let status = gateway(&program, Duration::from_secs(10))
        .render(&source, &dest)
        .await;

    match status {
        RenderStatus::Failed { reason } => {
            assert!(reason.contains("Parse error on line 1"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn test_unstartable_renderer_is_failure() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = bin.path().join("mmdc");
    std::fs::write(&program, "#!/nonexistent/interpreter\n").unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    let (source, dest) = source_file(out.path());

    let status = gateway(&program, Duration::from_secs(10))
        .render(&source, &dest)
        .await;

    match status {
        RenderStatus::Failed { reason } => assert!(reason.contains("failed to run"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn test_non_executable_renderer_is_failure() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(bin.path(), WRITES_OUTPUT);
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o644)).unwrap();
    let (source, dest) = source_file(out.path());

    let status = gateway(&program, Duration::from_secs(10))
        .render(&source, &dest)
        .await;

    match status {
        RenderStatus::Failed { reason } => assert!(reason.contains("failed to run"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn test_zero_exit_without_image_is_failure() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(bin.path(), "exit 0");
    let (source, dest) = source_file(out.path());

    let status = gateway(&program, Duration::from_secs(10))
        .render(&source, &dest)
        .await;

    assert!(matches!(status, RenderStatus::Failed { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn test_hanging_renderer_is_abandoned() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(bin.path(), "exec sleep 30");
    let (source, dest) = source_file(out.path());

    let started = Instant::now();
    let status = gateway(&program, Duration::from_secs(1))
        .render(&source, &dest)
        .await;

    assert_eq!(
        status,
        RenderStatus::TimedOut {
            after: Duration::from_secs(1)
        }
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn test_bake_with_fake_mmdc() {
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let program = fake_mmdc(bin.path(), WRITES_OUTPUT);
    let store = DiagramStore::open(out.path()).unwrap();
    let baker = Baker::mmdc(BakeConfig::default().with_renderer(program.to_string_lossy()));

    let baked = baker
        .bake("Intro\n```mermaid\ngraph TD; A-->B;\n```\n", &store)
        .await
        .unwrap();

    let id = DiagramId::of("graph TD; A-->B;");
    assert_eq!(baked.text, format!("Intro\n![Diagram]({id}.png)\n"));
    assert_eq!(
        baked.blocks[0].outcome,
        RenderOutcome::Succeeded { reused: false }
    );
    assert!(store.has_image(&id));
}
