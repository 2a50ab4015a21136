use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fewshot_cli"))
}

fn small_config_path(tag: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "fewshot_cli_{}_{}.json",
        tag,
        std::process::id()
    ));
    std::fs::write(
        &path,
        r#"{
            "classifier": { "top_k": 3, "squash_denominator": 10.0 },
            "extractor": { "input_width": 8, "input_height": 8, "channels": 3, "feature_len": 64, "seed": 5 },
            "scheduler": { "frame_interval_ms": 1, "readback": "latency_probe", "measure_every_n_ticks": 20, "offload_similarity": true },
            "classes": ["left", "right"]
        }"#,
    )
    .expect("write config");
    path
}

#[test]
fn session_classifies_every_scene() {
    let config = small_config_path("session");
    let output = cli()
        .arg("--config")
        .arg(&config)
        .args(["session", "--examples-per-class", "4"])
        .output()
        .expect("session command");
    let _ = std::fs::remove_file(&config);

    assert!(
        output.status.success(),
        "session exited with {:?}",
        output.status.code()
    );
    assert!(output.stdout.starts_with(b"{"), "stdout carries more than the report");
    let report: Value = serde_json::from_slice(&output.stdout).expect("session JSON");
    assert_eq!(report["classes"], serde_json::json!(["left", "right"]));
    assert_eq!(report["correct"], 2);
    assert_eq!(report["checks"][0]["result"]["prediction"]["k"], 3);
}

#[test]
fn dump_config_prints_defaults() {
    let output = cli().arg("dump-config").output().expect("dump-config command");
    assert!(output.status.success());

    let config: Value = serde_json::from_slice(&output.stdout).expect("config JSON");
    assert_eq!(config["classifier"]["top_k"], 10);
    assert_eq!(config["scheduler"]["measure_every_n_ticks"], 20);
}

#[test]
fn stream_prints_json_lines() {
    let config = small_config_path("stream");
    let output = cli()
        .arg("--config")
        .arg(&config)
        .args([
            "stream",
            "--examples-per-class",
            "3",
            "--scene",
            "1",
            "--duration-ms",
            "100",
        ])
        .output()
        .expect("stream command");
    let _ = std::fs::remove_file(&config);

    assert!(
        output.status.success(),
        "stream exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    let lines: Vec<&str> = stdout.lines().filter(|line| !line.trim().is_empty()).collect();
    assert!(!lines.is_empty(), "stream printed no predictions");
    for line in lines {
        let result: Value = serde_json::from_str(line)
            .unwrap_or_else(|err| panic!("stdout line {:?} is not JSON: {}", line, err));
        assert!(result.get("prediction").is_some(), "missing prediction in {}", line);
        assert!(result["tick"].is_u64());
    }
}
