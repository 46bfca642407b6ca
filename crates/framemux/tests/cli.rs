#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/fmxcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

struct Server {
    child: Child,
    dir: PathBuf,
    sock_path: PathBuf,
}

impl Server {
    fn start(tag: &str) -> Self {
        let dir = unique_temp_dir(tag);
        let sock_path = dir.join("serve.sock");
        let child = Command::new(env!("CARGO_BIN_EXE_framemux"))
            .arg("--log-level")
            .arg("error")
            .arg("serve")
            .arg(&sock_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve command should start");
        wait_for_socket(&sock_path, Duration::from_secs(5));
        Self {
            child,
            dir,
            sock_path,
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn call(sock_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_framemux"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("call")
        .arg(sock_path)
        .args(args)
        .output()
        .expect("call should run")
}

#[test]
fn call_echo_prints_json_response() {
    let server = Server::start("echo");

    let output = call(&server.sock_path, &["echo/echo", "--data", "hello"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be json");
    assert_eq!(value["status"], 200);
    assert_eq!(value["payload"], "hello");
    assert_eq!(value["path"], "echo/echo");
}

#[test]
fn call_stateful_operation() {
    let server = Server::start("whoami");

    let output = call(&server.sock_path, &["echo/user-7/whoami"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"payload\":\"user-7\""));
}

#[test]
fn unknown_operation_exits_with_failure() {
    let server = Server::start("missing");

    let output = call(&server.sock_path, &["echo/missing"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"status\":404"));
}

#[test]
fn handler_failure_reports_500() {
    let server = Server::start("fail");

    let output = call(&server.sock_path, &["echo/fail", "--data", "broken"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"status\":500"));
    assert!(stdout.contains("\"payload\":\"broken\""));
}

#[test]
fn call_to_missing_socket_is_transport_error() {
    let dir = unique_temp_dir("nosock");
    let output = call(&dir.join("absent.sock"), &["echo/echo", "--timeout", "1s"]);
    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_operation_is_usage_error() {
    let dir = unique_temp_dir("usage");
    let output = call(&dir.join("absent.sock"), &["not-a-path"]);
    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}
