//! Test: the stepforge binary end to end

use crate::helpers::*;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

fn stepforge(workspace: &Workspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stepforge"))
        .args(args)
        .current_dir(workspace.path())
        .env("RUST_LOG", "warn")
        .output()
        .expect("run stepforge")
}

const PIPELINE: &str = r#"
name: "cli"
env:
  GREETING: hello
steps:
  - id: greet
    action: { type: shell, command: "echo $GREETING > greeting.txt" }
  - id: check
    depends_on: [greet]
    action: { type: shell, command: "grep -q hello greeting.txt" }
"#;

#[test]
fn test_run_succeeds_and_reports_json() {
    let workspace = Workspace::new();
    workspace.write("ci.yaml", PIPELINE);

    let output = stepforge(&workspace, &["run", "-f", "ci.yaml", "--json"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "Completed");
    assert_eq!(report["results"][1]["step_id"], "check");
    assert_eq!(workspace.read("greeting.txt"), "hello\n");
}

#[test]
fn test_var_override_can_fail_the_run() {
    let workspace = Workspace::new();
    workspace.write("ci.yaml", PIPELINE);

    let output = stepforge(
        &workspace,
        &["run", "-f", "ci.yaml", "--json", "--var", "GREETING=bye"],
    );

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "Failed");
    assert_eq!(report["results"][1]["outcome"], "Failed");
}

#[test]
fn test_validate_rejects_unknown_dependency() {
    let workspace = Workspace::new();
    workspace.write(
        "broken.json",
        r#"{"name": "broken", "steps": [
            {"id": "build", "depends_on": ["setup"], "action": {"type": "shell", "command": "true"}}
        ]}"#,
    );

    let output = stepforge(&workspace, &["validate", "-f", "broken.json"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unknown step 'setup'"));
}

#[test]
fn test_generate_writes_package() {
    let workspace = Workspace::new();
    workspace.write("ci.yaml", PIPELINE);

    let output = stepforge(&workspace, &["generate", "-f", "ci.yaml", "-o", "out"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[3/3] Generating program"));
    assert!(workspace.join("out/Cargo.toml").is_file());
    assert!(workspace.read("out/src/main.rs").contains("id: \"greet\""));
}

/// Ctrl-C in a terminal signals the whole foreground group; the running
/// step must finish and only the following waves are skipped.
#[cfg(unix)]
#[test]
fn test_terminal_interrupt_lets_running_step_finish() {
    use std::os::unix::process::CommandExt;

    let workspace = Workspace::new();
    workspace.write(
        "slow.yaml",
        r#"
name: "slow"
steps:
  - id: slow
    action: { type: shell, command: "sleep 2 && touch slow.done" }
  - id: next
    depends_on: [slow]
    action: { type: shell, command: "touch next.done" }
"#,
    );

    let child = Command::new(env!("CARGO_BIN_EXE_stepforge"))
        .args(["run", "-f", "slow.yaml", "--json"])
        .current_dir(workspace.path())
        .env("RUST_LOG", "warn")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .expect("spawn stepforge");

    std::thread::sleep(Duration::from_millis(700));
    let group = format!("-{}", child.id());
    let sent = Command::new("kill")
        .args(["-INT", "--", group.as_str()])
        .status()
        .expect("run kill");
    assert!(sent.success());

    let output = child.wait_with_output().expect("wait for stepforge");
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "Cancelled");
    assert_eq!(report["results"][0]["outcome"], "Success");
    assert_eq!(report["results"][1]["outcome"], "Skipped");
    assert_eq!(report["results"][1]["detail"], "run interrupted");
    assert!(workspace.join("slow.done").exists());
    assert!(!workspace.join("next.done").exists());
}
