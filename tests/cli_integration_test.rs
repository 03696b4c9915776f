use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wellness_cli"))
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wellness_cli_{}_{}", std::process::id(), name))
}

fn write_tone_wav(path: &PathBuf, amplitude: i16, secs: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let count = (secs * 16000.0) as usize;
    for i in 0..count {
        let sample = if i % 2 == 0 { amplitude } else { -amplitude };
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout UTF-8");
    serde_json::from_str(stdout.trim()).expect("JSON on stdout")
}

#[test]
fn simulate_reports_calibrated_summary() {
    let output = cli()
        .args(["simulate", "--frames", "400", "--slouch-after", "300"])
        .output()
        .expect("failed to run wellness_cli simulate");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let json = stdout_json(&output);
    assert_eq!(json["frames"], 400);
    let summary = &json["summary"];
    assert_eq!(summary["calibration_complete"], true);
    assert_eq!(summary["posture"]["negative_count"], 100);
    assert!(summary["eyes"]["negative_count"].as_u64().unwrap_or_default() > 0);
    assert_eq!(summary["breathing"], "idle");
}

#[test]
fn simulate_with_breathing_runs_sessions() {
    let output = cli()
        .args(["simulate", "--frames", "1800", "--breathing", "--transcript", "hello"])
        .output()
        .expect("failed to run wellness_cli simulate --breathing");
    assert!(output.status.success());

    let chant = &stdout_json(&output)["summary"]["chant"];
    assert!(chant["total_sessions"].as_u64().unwrap_or_default() >= 2);
    assert_eq!(chant["successful_detections"], 0);
    assert_eq!(chant["success_rate"], 0.0);
}

#[test]
fn chant_classifies_wav_file() {
    let path = temp_path("loud.wav");
    write_tone_wav(&path, 1200, 2.0);
    let output = cli()
        .args(["chant", "--wav", path.to_str().unwrap(), "--transcript", "Om"])
        .output()
        .expect("failed to run wellness_cli chant");
    let _ = std::fs::remove_file(&path);
    assert!(output.status.success());

    let outcome = &stdout_json(&output)["outcome"];
    assert_eq!(outcome["detected"], true);
    assert_eq!(outcome["duration_secs"], 2.0);
    assert_eq!(outcome["verdict"]["kind"], "keyword_matched");
}

#[test]
fn chant_rejects_silence() {
    let path = temp_path("quiet.wav");
    write_tone_wav(&path, 50, 1.0);
    let output = cli()
        .args(["chant", "--wav", path.to_str().unwrap(), "--transcript", "om"])
        .output()
        .expect("failed to run wellness_cli chant");
    let _ = std::fs::remove_file(&path);
    assert!(output.status.success());
    let outcome = &stdout_json(&output)["outcome"];
    assert_eq!(outcome["detected"], false);
    assert_eq!(outcome["verdict"]["kind"], "silent");
}

#[test]
fn chant_missing_file_fails() {
    let output = cli()
        .args(["chant", "--wav", "/nonexistent/chant.wav"])
        .output()
        .expect("failed to run wellness_cli chant");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn config_round_trips_through_validate() {
    let path = temp_path("config.json");
    let output = cli()
        .args(["config", "--output", path.to_str().unwrap()])
        .output()
        .expect("failed to run wellness_cli config");
    assert!(output.status.success());

    let output = cli()
        .args(["validate", "--config", path.to_str().unwrap()])
        .output()
        .expect("failed to run wellness_cli validate");
    let _ = std::fs::remove_file(&path);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration OK"));
}

#[test]
fn validate_reports_problems_with_exit_code_2() {
    let path = temp_path("bad_config.json");
    std::fs::write(
        &path,
        r#"{"breathing": {"default_interval_secs": 5, "min_interval_secs": 10,
            "max_interval_secs": 300, "inhale_secs": 4.0, "exhale_secs": 6.0,
            "max_listen_secs": 15.0, "poll_interval_ms": 100,
            "prompt_script_id": "om-breathing", "inhale_prompt": "Inhale...",
            "exhale_prompt": "Exhale...", "chant_prompt": "Begin chant Om..."}}"#,
    )
    .expect("write config");
    let output = cli()
        .args(["validate", "--config", path.to_str().unwrap()])
        .output()
        .expect("failed to run wellness_cli validate");
    let _ = std::fs::remove_file(&path);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Breathing interval too small"));
}

#[test]
fn config_prints_defaults_to_stdout() {
    let output = cli().arg("config").output().expect("failed to run config");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["posture"]["auto_calibration_frames"], 75);
    assert_eq!(json["chant"]["silence_threshold"], 300.0);
    assert_eq!(json["speech"]["rate_wpm"], 140);
}

#[test]
fn self_test_reports_components() {
    let output = cli()
        .args(["self-test", "--transcript", "testing"])
        .output()
        .expect("failed to run wellness_cli self-test");
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["microphone_ok"], true);
    assert_eq!(json["heard"], "testing");
    assert_eq!(json["speech_ok"], true);
}

#[test]
fn self_test_with_silent_microphone_exits_3() {
    let output = cli()
        .args(["self-test", "--silent"])
        .output()
        .expect("failed to run wellness_cli self-test --silent");
    assert_eq!(output.status.code(), Some(3));

    let json = stdout_json(&output);
    assert_eq!(json["microphone_ok"], false);
    assert_eq!(json["heard"], Value::Null);
}
