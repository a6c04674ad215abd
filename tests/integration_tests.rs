use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::{tempdir, TempDir};

const SCENARIO_A: &str = "POST idx/_search\n{\n  \"a\":1\n}\n";

const STACKED: &str = "GET a/_search\n{}\n\nPOST b/_search\n{\n  \"size\": 1\n}\n";

const CARD: &str = r#"POST app-logs/_search
{
  "query": {
    "bool": {
      "filter": [
        { "range": { "createTime": { "gte": "{%$startTime%}", "lte": "{%$endTime%}" } } },
        { "term": { "level": "{%level=ERROR%}" } }
      ]
    }
  }
}"#;

const RESPONSE: &str = r#"{"hits":{"total":{"value":2},"hits":[
  {"_source":{"message":"disk full","host":"a"}},
  {"_source":{"message":"""retry "db" later""","host":"b"}}
]}}"#;

fn eslog_binary() -> String {
    env!("CARGO_BIN_EXE_eslog").to_string()
}

/// A command that never sees the user's own profile file.
fn eslog(config_dir: &TempDir) -> Command {
    let mut cmd = Command::new(eslog_binary());
    cmd.env("ESLOG_CONFIG", config_dir.path().join("eslog.ini"))
        .env_remove("ESLOG_LOG_LEVEL");
    cmd
}

fn run_with_stdin(mut cmd: Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn eslog");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("Failed to write to stdin");

    child.wait_with_output().expect("Failed to read stdout")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "eslog failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write file");
    path.to_str().unwrap().to_string()
}

#[test]
fn test_help_command() {
    let dir = tempdir().unwrap();
    let output = eslog(&dir).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Query templates and log projection"));
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_version_command() {
    let dir = tempdir().unwrap();
    let output = eslog(&dir).arg("--version").output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("eslog"));
}

#[test]
fn test_missing_subcommand() {
    let dir = tempdir().unwrap();
    let output = eslog(&dir).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_extract_from_stdin() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.args(["extract", "-l", "3"]);
    let block = stdout_json(&run_with_stdin(cmd, SCENARIO_A));

    assert_eq!(block["method"], "POST");
    assert_eq!(block["target"], "idx");
    assert_eq!(block["body_text"], "{\n  \"a\":1\n}");
}

#[test]
fn test_extract_from_file() {
    let dir = tempdir().unwrap();
    let buffer = write_file(dir.path(), "buffer.txt", STACKED);
    let output = eslog(&dir)
        .args(["extract", &buffer, "-l", "6"])
        .output()
        .unwrap();
    let block = stdout_json(&output);

    assert_eq!(block["target"], "b");
    assert_eq!(block["body_text"], "{\n  \"size\": 1\n}");
}

#[test]
fn test_extract_nothing_to_run() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.args(["extract", "-l", "2"]);
    let output = run_with_stdin(cmd, "some notes\n{\n  \"a\": 1\n");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing to run near line 2"));
}

#[test]
fn test_list_blocks() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.arg("list");
    let blocks = stdout_json(&run_with_stdin(cmd, STACKED));

    let blocks = blocks.as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["head_line"], 1);
    assert_eq!(blocks[0]["tail_line"], 2);
    assert_eq!(blocks[1]["head_line"], 4);
    assert_eq!(blocks[1]["tail_line"], 7);
    assert_eq!(blocks[1]["block"]["method"], "POST");
}

#[test]
fn test_vars() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.arg("vars");
    let output = run_with_stdin(cmd, CARD);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let start = stdout.find("$startTime").unwrap();
    let end = stdout.find("$endTime").unwrap();
    let level = stdout.find("\"level\": \"ERROR\"").unwrap();
    assert!(start < end && end < level);
}

#[test]
fn test_bind() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.args(["bind", "-s", "level=WARN", "-g", "$endTime=2024-10-20 00:00:00"]);
    let output = run_with_stdin(cmd, CARD);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#""level": "WARN""#));
    assert!(stdout.contains(r#""gte": "2024-10-13 00:00:00""#));
    assert!(stdout.contains(r#""lte": "2024-10-20 00:00:00""#));
    assert!(!stdout.contains("{%"));
}

#[test]
fn test_bind_rejects_global_without_prefix() {
    let dir = tempdir().unwrap();
    let output = eslog(&dir)
        .args(["bind", "-g", "endTime=x"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("must start with '$'"));
}

#[test]
fn test_project() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.args(["project", "-f", "message"]);
    let result = stdout_json(&run_with_stdin(cmd, RESPONSE));

    assert_eq!(result["total"], 2);
    assert_eq!(result["hits"][0]["message"], "disk full");
    assert_eq!(result["hits"][1]["message"], "retry \"db\" later");
    assert!(result["hits"][0].get("host").is_none());
}

#[test]
fn test_project_falls_back_to_previous() {
    let dir = tempdir().unwrap();
    let previous = write_file(
        dir.path(),
        "previous.json",
        r#"{"total": 1, "hits": [{"message": "kept", "host": "a"}]}"#,
    );
    let mut cmd = eslog(&dir);
    cmd.args(["project", "-f", "message,host", "--previous", &previous]);
    let result = stdout_json(&run_with_stdin(cmd, "<html>502 Bad Gateway</html>"));

    assert_eq!(result["total"], 1);
    assert_eq!(result["hits"][0]["message"], "kept");
    assert_eq!(result["hits"][0]["host"], "a");
}

#[test]
fn test_project_malformed_payload_is_empty() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.arg("project");
    let result = stdout_json(&run_with_stdin(cmd, "not json at all"));

    assert_eq!(result["total"], 0);
    assert_eq!(result["hits"].as_array().unwrap().len(), 0);
}

#[test]
fn test_run_template_dry_run() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.args(["run", "-t", "-s", "level=WARN", "--dry-run"]);
    let request = stdout_json(&run_with_stdin(cmd, CARD));

    assert_eq!(request["method"], "POST");
    assert_eq!(request["url"], "http://localhost:9200/app-logs/_search");
    let filter = &request["body"]["query"]["bool"]["filter"];
    assert_eq!(filter[0]["range"]["createTime"]["gte"], "2024-10-13 00:00:00");
    assert_eq!(filter[1]["term"]["level"], "WARN");
}

#[test]
fn test_run_with_profile_dry_run() {
    let dir = tempdir().unwrap();
    write_file(
        dir.path(),
        "eslog.ini",
        "[staging]\n\
         host=https://logs.staging:9200/\n\
         global.$startTime=2024-09-01 00:00:00\n\
         global.$endTime=2024-09-02 00:00:00\n",
    );
    let mut cmd = eslog(&dir);
    cmd.args(["-p", "staging", "run", "-t", "--dry-run"]);
    let request = stdout_json(&run_with_stdin(cmd, CARD));

    assert_eq!(request["url"], "https://logs.staging:9200/app-logs/_search");
    let filter = &request["body"]["query"]["bool"]["filter"];
    assert_eq!(filter[0]["range"]["createTime"]["gte"], "2024-09-01 00:00:00");
    assert_eq!(filter[0]["range"]["createTime"]["lte"], "2024-09-02 00:00:00");
    assert_eq!(filter[1]["term"]["level"], "ERROR");
}

#[test]
fn test_run_unknown_profile() {
    let dir = tempdir().unwrap();
    let mut cmd = eslog(&dir);
    cmd.args(["-p", "nope", "run", "-t", "--dry-run"]);
    let output = run_with_stdin(cmd, CARD);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Profile 'nope' not found"));
}

#[test]
fn test_run_requires_line_for_buffers() {
    let dir = tempdir().unwrap();
    let output = eslog(&dir).args(["run", "buffer.txt"]).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--line"));
}

#[test]
fn test_run_unreachable_host() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "eslog.ini", "[default]\nhost=http://127.0.0.1:9\n");
    let mut cmd = eslog(&dir);
    cmd.args(["run", "-l", "3"]);
    let output = run_with_stdin(cmd, SCENARIO_A);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to send request"));
}
