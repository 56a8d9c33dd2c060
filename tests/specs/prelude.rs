// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for black-box specs.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use predicates::Predicate;

/// Upper bound on polling for asynchronous effects
pub const SPEC_WAIT_MAX_MS: u64 = 5000;
const SPEC_POLL_MS: u64 = 20;

/// Three alerts, each with a start time so output is deterministic
pub const THREE_ALERTS: &str = r#"{
  "receiver": "maira",
  "status": "firing",
  "externalURL": "http://alertmanager.example.com:9093",
  "alerts": [
    {
      "labels": {"alertname": "HighCPU", "severity": "critical", "instance": "node-1"},
      "annotations": {"description": "CPU above 90%"},
      "startsAt": "2026-03-01T10:00:00Z"
    },
    {
      "labels": {"alertname": "DiskFull", "severity": "warning"},
      "annotations": {"description": "disk at 95%"},
      "startsAt": "2026-03-01T10:05:00Z"
    },
    {
      "labels": {"alertname": "NodeDown"},
      "startsAt": "2026-03-01T10:10:00Z"
    }
  ]
}"#;

/// Poll `check` until it returns true or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(SPEC_POLL_MS));
    }
    check()
}

/// Loopback address nothing is listening on (yet)
pub fn free_addr() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .unwrap()
}

/// Isolated working directory for one spec
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path().join(rel)).unwrap_or_default()
    }

    /// `em` run inside the project
    pub fn em(&self) -> CliBuilder {
        CliBuilder::new("em", self.path())
    }

    /// `emd` run inside the project
    pub fn emd(&self) -> CliBuilder {
        CliBuilder::new("emd", self.path())
    }
}

pub struct CliBuilder {
    cmd: Command,
    stdin: Option<String>,
}

impl CliBuilder {
    fn new(bin: &str, cwd: &Path) -> Self {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin(bin));
        cmd.current_dir(cwd)
            .env_remove("RUST_LOG")
            .env_remove("EM_WEBHOOK_URL");
        Self { cmd, stdin: None }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn stdin(mut self, input: &str) -> Self {
        self.stdin = Some(input.to_string());
        self
    }

    /// Start in the background (for the daemon)
    pub fn spawn(mut self) -> Daemon {
        let child = self
            .cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        Daemon { child: Some(child) }
    }

    fn output(self) -> Output {
        let mut cmd = assert_cmd::Command::from_std(self.cmd);
        if let Some(input) = self.stdin {
            cmd.write_stdin(input);
        }
        cmd.output().unwrap()
    }

    pub fn passes(self) -> RunAssert {
        let output = self.output();
        assert!(
            output.status.success(),
            "expected success, got {}\nstdout:\n{}\nstderr:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let output = self.output();
        assert!(
            !output.status.success(),
            "expected failure\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            predicates::str::contains(expected).eval(&stdout),
            "stdout missing {:?}:\n{}",
            expected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            predicates::str::contains(expected).eval(&stderr),
            "stderr missing {:?}:\n{}",
            expected,
            stderr
        );
        self
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }
}

/// A running `emd`, killed on drop if still alive
pub struct Daemon {
    child: Option<Child>,
}

impl Daemon {
    fn child(&mut self) -> &mut Child {
        self.child.as_mut().unwrap()
    }

    /// Wait until the webhook listener accepts connections
    pub fn wait_ready(&mut self, addr: SocketAddr) {
        let ready = wait_for(SPEC_WAIT_MAX_MS, || {
            if let Ok(Some(status)) = self.child().try_wait() {
                panic!("emd exited early with {}", status);
            }
            TcpStream::connect(addr).is_ok()
        });
        assert!(ready, "emd did not listen on {}", addr);
    }

    /// Send SIGTERM and wait for the process to exit
    pub fn terminate(mut self) -> Output {
        let pid = self.child().id().to_string();
        let status = Command::new("kill")
            .args(["-TERM", pid.as_str()])
            .status()
            .unwrap();
        assert!(status.success());
        self.wait_exit()
    }

    /// Wait for the process to exit on its own
    pub fn wait_exit(mut self) -> Output {
        let exited = wait_for(SPEC_WAIT_MAX_MS, || {
            matches!(self.child().try_wait(), Ok(Some(_)))
        });
        assert!(exited, "emd did not exit");
        self.child.take().unwrap().wait_with_output().unwrap()
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
