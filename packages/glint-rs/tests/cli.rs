//! Integration tests for the CLI commands

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_version_command() {
    let mut cmd = cargo_bin_cmd!("glint");
    cmd.arg("version");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("glint "));
}

#[test]
fn test_version_flag() {
    let mut cmd = cargo_bin_cmd!("glint");
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("glint "));
}

#[test]
fn test_version_short_flag() {
    let mut cmd = cargo_bin_cmd!("glint");
    cmd.arg("-V");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("glint "));
}

#[test]
fn test_batch_without_inputs_fails() {
    let output = tempfile::tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("glint");
    cmd.arg("batch").arg("--output-dir").arg(output.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No images to process"));
}

#[test]
fn test_batch_with_missing_helper_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = glint_rs::GlintConfig::default();
    config.engine.program = "/nonexistent/glint-helper".into();
    let config_path = dir.path().join("config.toml");
    glint_rs::save_config(&config, &config_path).unwrap();

    let mut cmd = cargo_bin_cmd!("glint");
    cmd.arg("batch")
        .arg("scan.png")
        .arg("--config")
        .arg(&config_path)
        .arg("--output-dir")
        .arg(dir.path().join("out"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to initialize OCR engine"));
}

#[cfg(unix)]
mod with_helper {
    use super::*;
    use std::path::Path;

    const HELPER: &str = r#"read cfg
echo '{"ready": true}'
while read line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  echo "{\"id\": $id, \"result\": [[[[4,4],[40,4],[40,20],[4,20]],[\"STOP\",0.98]]]}"
done"#;

    fn write_config(dir: &Path) -> std::path::PathBuf {
        let mut config = glint_rs::GlintConfig::default();
        config.engine.program = "sh".into();
        config.engine.args = vec!["-c".into(), HELPER.into()];
        let path = dir.join("config.toml");
        glint_rs::save_config(&config, &path).unwrap();
        path
    }

    #[test]
    fn test_batch_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("sign.png"), common::png_bytes(48, 24)).unwrap();
        std::fs::write(input.join("readme.txt"), b"skip me").unwrap();
        let config = write_config(dir.path());

        let mut cmd = cargo_bin_cmd!("glint");
        cmd.arg("batch")
            .arg("--input-dir")
            .arg(&input)
            .arg("--output-dir")
            .arg(&output)
            .arg("--config")
            .arg(&config);

        cmd.assert()
            .success()
            .stdout(predicate::str::contains("Successfully processed: 1"));

        assert!(output.join("sign_result.json").exists());
        assert!(output.join("sign_result.png").exists());
        assert!(!output.join("readme_result.json").exists());

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output.join("batch_summary.json")).unwrap()).unwrap();
        assert_eq!(summary["batch_info"]["total_images"], 1);
        assert_eq!(summary["individual_results"][0]["text_regions_found"], 1);
    }

    #[test]
    fn test_batch_exits_nonzero_when_nothing_processed() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");
        let config = write_config(dir.path());

        let mut cmd = cargo_bin_cmd!("glint");
        cmd.arg("batch")
            .arg(dir.path().join("missing.png"))
            .arg("--no-visualization")
            .arg("--output-dir")
            .arg(&output)
            .arg("--config")
            .arg(&config);

        cmd.assert()
            .failure()
            .stdout(predicate::str::contains("Failed:                 1"));
        assert!(output.join("batch_summary.json").exists());
    }
}
