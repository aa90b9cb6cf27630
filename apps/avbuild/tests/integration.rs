//! Integration tests for the avbuild CLI

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

const SCENE: &str = r#"{
  "version": 1,
  "roots": [
    {
      "name": "Avatar",
      "attachments": [{ "type": "avatar_descriptor" }],
      "children": [
        { "name": "Tools", "attachments": [{ "type": "editor_only" }] },
        { "name": "Body", "attachments": [{ "type": "ghost_script", "data": { "x": 1 } }] }
      ]
    }
  ]
}"#;

fn avbuild(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_avbuild"))
        .args(args)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("AVBUILD_OUTPUT")
        .env_remove("AVBUILD_OUTPUT_DIR")
        .env_remove("AVBUILD_TEMP_ROOT")
        .env_remove("AVBUILD_EXTENSION")
        .env_remove("AVBUILD_COMPRESSION")
        .env_remove("AVBUILD_COLOR")
        .output()
        .expect("Failed to execute avbuild")
}

fn workspace_with_scene() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Main.scene.json"), SCENE).unwrap();
    dir
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    let output = avbuild(home.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("build"));
    assert!(stdout.contains("inspect"));
}

#[test]
fn test_cli_invalid_command() {
    let home = tempfile::tempdir().unwrap();
    let output = avbuild(home.path(), &["invalid-command"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_name_uses_platform_and_extension() {
    let home = tempfile::tempdir().unwrap();
    let output = avbuild(home.path(), &["name", "--scene", "My Avatar", "--target", "android"]);

    assert!(output.status.success());
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(name.ends_with("-myavatar-android.avb"), "{name}");
}

#[test]
fn test_inspect_reports_tombstones() {
    let home = tempfile::tempdir().unwrap();
    let ws = workspace_with_scene();
    let root = ws.path().to_str().unwrap();
    let output = avbuild(home.path(), &["--json", "inspect", "--workspace", root, "--scene", "Main"]);

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["kind"], "inspect");
    assert_eq!(report["nodes"].as_array().unwrap().len(), 3);
    let tombstones = report["tombstones"].as_array().unwrap();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0]["path"], "Avatar/Body");
    assert_eq!(tombstones[0]["type_name"], "ghost_script");
}

#[test]
fn test_build_writes_bundle_and_keeps_scene() {
    let home = tempfile::tempdir().unwrap();
    let ws = workspace_with_scene();
    let root = ws.path().to_str().unwrap();
    let output = avbuild(
        home.path(),
        &[
            "--json", "build", "--workspace", root, "--scene", "Main", "--target", "windows",
            "--filename", "out.avb",
        ],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["kind"], "build");
    assert!(ws.path().join("Builds").join("out.avb").is_file());

    let saved = std::fs::read_to_string(ws.path().join("Main.scene.json")).unwrap();
    assert!(saved.contains("Tools"));
    assert!(saved.contains("ghost_script"));
}

#[test]
fn test_build_rejects_unknown_subject() {
    let home = tempfile::tempdir().unwrap();
    let ws = workspace_with_scene();
    let root = ws.path().to_str().unwrap();
    let output = avbuild(
        home.path(),
        &[
            "--json", "build", "--workspace", root, "--scene", "Main", "--target", "linux",
            "--subject", "Avatar/Nope",
        ],
    );

    assert!(!output.status.success());
    let report = stdout_json(&output);
    assert!(report["output_path"].is_null());
    assert!(!ws.path().join("Builds").exists());
}
