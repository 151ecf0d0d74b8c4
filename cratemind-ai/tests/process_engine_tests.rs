//! Child-process engine against small shell analyzers
#![cfg(unix)]

use cratemind_ai::engine::process::EngineMode;
use cratemind_ai::engine::{AnalysisEngine, EngineError, ProcessEngine, MISSING_RESULT};
use cratemind_ai::models::AnalysisRequest;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Echoes one result per request; paths containing "corrupt" fail, paths
/// containing "skip" are left out. Records the request file path in `seen`.
const BATCH_ANALYZER: &str = r#"
echo "$1" > "$(dirname "$0")/seen"
printf '{'
grep -o '"id":"[^"]*","filePath":"[^"]*"' "$1" | {
  sep=''
  while IFS= read -r entry; do
    id=$(echo "$entry" | cut -d'"' -f4)
    path=$(echo "$entry" | cut -d'"' -f8)
    case "$path" in
      *skip*) continue ;;
      *corrupt*) printf '%s"%s":{"error":"unreadable audio"}' "$sep" "$id" ;;
      *) printf '%s"%s":{"bpm":128.0,"energy":0.7,"halfTime":false}' "$sep" "$id" ;;
    esac
    sep=','
  done
}
printf '}'
"#;

const PER_FILE_ANALYZER: &str = r#"
case "$1" in
  *crash*) echo "segfault" >&2; exit 139 ;;
  *corrupt*) echo '{"error":"unreadable audio"}' ;;
  *) echo '{"tempo":140.0,"energy":0.8}' ;;
esac
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Run scripts through `sh` so the test never execs a freshly written file
fn shell_engine(script: &Path, mode: EngineMode) -> ProcessEngine {
    ProcessEngine::new("sh", mode)
        .with_args(vec![script.display().to_string()])
        .with_timeout(Duration::from_secs(10))
}

fn requests(paths: &[&str]) -> Vec<AnalysisRequest> {
    paths
        .iter()
        .enumerate()
        .map(|(i, p)| AnalysisRequest::new(format!("id-{}", i), *p))
        .collect()
}

#[tokio::test]
async fn test_batch_mode_maps_results_by_id() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", BATCH_ANALYZER);
    let engine = shell_engine(&script, EngineMode::Batch).with_temp_dir(dir.path());

    let output = engine
        .analyze(&requests(&["/in/a.mp3", "/in/corrupt.mp3", "/in/skip.mp3"]))
        .await
        .unwrap();

    assert_eq!(output.len(), 3);
    let ok = output["id-0"].as_ref().unwrap();
    assert_eq!(ok.tempo, 128.0);
    assert_eq!(ok.energy, Some(0.7));
    assert_eq!(output["id-1"].as_ref().unwrap_err(), "unreadable audio");
    assert_eq!(output["id-2"].as_ref().unwrap_err(), MISSING_RESULT);
}

#[tokio::test]
async fn test_batch_request_file_is_removed() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", BATCH_ANALYZER);
    let engine = shell_engine(&script, EngineMode::Batch).with_temp_dir(dir.path());

    engine.analyze(&requests(&["/in/a.mp3"])).await.unwrap();

    let seen = std::fs::read_to_string(dir.path().join("seen")).unwrap();
    let request_path = PathBuf::from(seen.trim());
    assert!(request_path.starts_with(dir.path()));
    assert!(!request_path.exists());
}

#[tokio::test]
async fn test_request_file_removed_after_failure() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "analyzer.sh",
        "echo \"$1\" > \"$(dirname \"$0\")/seen\"\necho 'model missing' >&2\nexit 3\n",
    );
    let engine = shell_engine(&script, EngineMode::Batch).with_temp_dir(dir.path());

    let err = engine.analyze(&requests(&["/in/a.mp3"])).await.unwrap_err();
    match err {
        EngineError::ExitStatus { code, stderr } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "model missing");
        }
        other => panic!("unexpected error: {other}"),
    }

    let seen = std::fs::read_to_string(dir.path().join("seen")).unwrap();
    assert!(!Path::new(seen.trim()).exists());
}

#[tokio::test]
async fn test_unparseable_output_is_wholesale() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", "echo 'not json'\n");
    let engine = shell_engine(&script, EngineMode::Batch).with_temp_dir(dir.path());

    let err = engine.analyze(&requests(&["/in/a.mp3"])).await.unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
}

#[tokio::test]
async fn test_timeout_kills_engine() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", "sleep 5\necho '{}'\n");
    let engine = shell_engine(&script, EngineMode::Batch)
        .with_temp_dir(dir.path())
        .with_timeout(Duration::from_millis(200));

    let err = engine.analyze(&requests(&["/in/a.mp3"])).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout(_)));
}

#[tokio::test]
async fn test_per_file_mode_keeps_item_errors() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", PER_FILE_ANALYZER);
    let engine = shell_engine(&script, EngineMode::PerFile).with_workers(2);

    let output = engine
        .analyze(&requests(&["/in/a.mp3", "/in/corrupt.mp3", "/in/b.mp3"]))
        .await
        .unwrap();

    assert_eq!(output.len(), 3);
    assert_eq!(output["id-0"].as_ref().unwrap().tempo, 140.0);
    assert_eq!(output["id-1"].as_ref().unwrap_err(), "unreadable audio");
    assert_eq!(output["id-2"].as_ref().unwrap().energy, Some(0.8));
}

#[tokio::test]
async fn test_per_file_crash_fails_whole_batch() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", PER_FILE_ANALYZER);
    let engine = shell_engine(&script, EngineMode::PerFile).with_workers(2);

    let err = engine
        .analyze(&requests(&["/in/a.mp3", "/in/crash.mp3", "/in/b.mp3"]))
        .await
        .unwrap_err();

    match err {
        EngineError::ExitStatus { code, stderr } => {
            assert_eq!(code, Some(139));
            assert_eq!(stderr, "segfault");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_per_file_unparseable_output_is_wholesale() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "analyzer.sh", "echo 'not json'\n");
    let engine = shell_engine(&script, EngineMode::PerFile);

    let err = engine.analyze(&requests(&["/in/a.mp3"])).await.unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
}
