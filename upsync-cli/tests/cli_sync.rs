use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// Nothing listens on the discard port, so manifest fetches fail fast and the
// engine starts from an empty history.
const UNREACHABLE_DOMAIN: &str = "http://127.0.0.1:9";

fn upsync(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("upsync").expect("upsync binary");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("dist/js")).unwrap();
    fs::create_dir_all(tmp.path().join("bucket")).unwrap();
    fs::write(tmp.path().join("dist/index.html"), "<html></html>").unwrap();
    fs::write(tmp.path().join("dist/js/app.3f9a.js"), "console.log(1)").unwrap();
    fs::write(
        tmp.path().join(".upsync.yaml"),
        format!("bucket_domain: {UNREACHABLE_DOMAIN}\nbucket_root: bucket\nupload_path: /static\n"),
    )
    .unwrap();
    tmp
}

#[test]
fn public_path_joins_domain_and_upload_path() {
    let tmp = project();
    upsync(tmp.path())
        .arg("public-path")
        .assert()
        .success()
        .stdout(format!("{UNREACHABLE_DOMAIN}/static/\n"));
}

#[test]
fn flags_override_config_file() {
    let tmp = project();
    upsync(tmp.path())
        .args(["public-path", "--bucket-domain", "//cdn.example.com", "--upload-path", "v2"])
        .assert()
        .success()
        .stdout("//cdn.example.com/v2/\n");
}

#[test]
fn invalid_options_report_every_problem() {
    let tmp = TempDir::new().unwrap();
    upsync(tmp.path())
        .args(["public-path", "--batch", "0"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("bucket_domain is required")
                .and(predicate::str::contains("batch must be a positive integer")),
        );
}

#[test]
fn sync_uploads_build_output_and_writes_manifest() {
    let tmp = project();
    upsync(tmp.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 uploaded"));

    let bucket = tmp.path().join("bucket/static");
    assert_eq!(
        fs::read_to_string(bucket.join("js/app.3f9a.js")).unwrap(),
        "console.log(1)"
    );
    let raw = fs::read_to_string(bucket.join("__upsync__manifest.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(manifest["prev"], serde_json::json!([]));
    assert_eq!(
        manifest["current"],
        serde_json::json!(["index.html", "js/app.3f9a.js"])
    );
    assert!(manifest["uploadTime"].as_str().is_some_and(|s| !s.is_empty()));
}

#[test]
fn sync_dry_run_touches_nothing() {
    let tmp = project();
    upsync(tmp.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]").and(predicate::str::contains("js/app.3f9a.js")));

    let mut entries = fs::read_dir(tmp.path().join("bucket")).unwrap();
    assert!(entries.next().is_none(), "dry-run must not write to the bucket");
}

#[test]
fn sync_without_bucket_root_fails() {
    let tmp = project();
    fs::write(
        tmp.path().join("custom.yaml"),
        format!("bucket_domain: {UNREACHABLE_DOMAIN}\n"),
    )
    .unwrap();
    upsync(tmp.path())
        .args(["sync", "--config", "custom.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bucket_root is required"));
}

#[test]
fn sync_with_missing_output_dir_fails() {
    let tmp = project();
    upsync(tmp.path())
        .args(["sync", "--output-dir", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sync of build failed"));
}

#[test]
fn plan_json_lists_uploads() {
    let tmp = project();
    let output = upsync(tmp.path())
        .args(["plan", "--json", "--delete-stale"])
        .output()
        .expect("run plan");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["selected"], 2);
    assert_eq!(
        plan["upload"],
        serde_json::json!(["index.html", "js/app.3f9a.js"])
    );
    assert_eq!(plan["delete"], serde_json::json!([]));
    assert_eq!(plan["delete_enabled"], true);
    assert_eq!(plan["manifest"]["uploadTime"], "");
}

#[test]
fn plan_table_names_remote_keys() {
    let tmp = project();
    upsync(tmp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("2 to upload")
                .and(predicate::str::contains("static/js/app.3f9a.js"))
                .and(predicate::str::contains("last sync never")),
        );
}
