//! Time-bounded execution of submitted Python code.
//!
//! Each run gets its own temporary directory holding `main.py`; the directory
//! is removed when the run ends, whichever way it ends. The interpreter starts
//! in isolated mode with a cleared environment, no stdin, and in its own
//! process group, which is killed when the run ends so nothing it spawned
//! outlives it.
//!
//! This is process isolation only: there is no seccomp, namespace or cgroup
//! confinement, and the program can still touch the filesystem and network
//! with the service's privileges.

use std::{
  process::Stdio,
  time::{Duration, Instant},
};

use tokio::{io::AsyncReadExt, process::Command};
use tracing::{info, instrument, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, TutorError};
use crate::util::floor_char_boundary;

const SOURCE_FILE: &str = "main.py";

/// What the program did within its time budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOutcome {
  /// `None` when the process was ended by a signal.
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
  pub elapsed: Duration,
}

impl ExecutionOutcome {
  pub fn succeeded(&self) -> bool {
    self.exit_code == Some(0)
  }
}

#[derive(Clone, Debug)]
pub struct CodeRunner {
  interpreter: String,
  timeout: Duration,
  max_output_bytes: usize,
}

impl CodeRunner {
  pub fn new(cfg: &RunnerConfig) -> Self {
    Self {
      interpreter: cfg.interpreter.clone(),
      timeout: Duration::from_secs(cfg.timeout_secs),
      max_output_bytes: cfg.max_output_bytes,
    }
  }

  #[cfg(test)]
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn interpreter(&self) -> &str {
    &self.interpreter
  }

  /// Run `source` and collect exit status and output.
  ///
  /// A failing program is a normal outcome. Errors are reserved for the
  /// timeout (`Timeout`) and for not being able to run at all
  /// (`ExecutionFailure`).
  #[instrument(level = "info", skip(self, source), fields(source_len = source.len(), timeout_ms = self.timeout.as_millis() as u64))]
  pub async fn run(&self, source: &str) -> Result<ExecutionOutcome> {
    let workdir = tempfile::Builder::new()
      .prefix("tutor-run-")
      .tempdir()
      .map_err(|e| TutorError::ExecutionFailure(format!("diretório temporário: {e}")))?;
    let script = workdir.path().join(SOURCE_FILE);
    tokio::fs::write(&script, source)
      .await
      .map_err(|e| TutorError::ExecutionFailure(format!("gravação do código: {e}")))?;

    let path_env = std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string());

    let mut cmd = Command::new(&self.interpreter);
    cmd.arg("-I")
      .arg(SOURCE_FILE)
      .current_dir(workdir.path())
      .env_clear()
      .env("PATH", &path_env)
      .env("PYTHONIOENCODING", "utf-8")
      .env("PYTHONDONTWRITEBYTECODE", "1")
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = cmd
      .spawn()
      .map_err(|e| TutorError::ExecutionFailure(format!("não foi possível iniciar '{}': {e}", self.interpreter)))?;
    let pid = child.id();

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let cap = self.max_output_bytes;

    // Drain both pipes while waiting so a chatty program cannot block on a full pipe.
    let collected = tokio::time::timeout(self.timeout, async {
      let (out, err, status) = tokio::join!(
        read_capped(stdout.as_mut(), cap),
        read_capped(stderr.as_mut(), cap),
        child.wait(),
      );
      (out, err, status)
    })
    .await;

    let elapsed = start.elapsed();
    match collected {
      Ok((out, err, status)) => {
        // Detached children that let go of the pipes outlive the leader otherwise.
        kill_group(pid);
        let status = status.map_err(|e| TutorError::ExecutionFailure(e.to_string()))?;
        let outcome = ExecutionOutcome {
          exit_code: status.code(),
          stdout: out,
          stderr: err,
          elapsed,
        };
        info!(exit_code = ?outcome.exit_code, ?elapsed, stdout_len = outcome.stdout.len(), stderr_len = outcome.stderr.len(), "Submission finished");
        Ok(outcome)
      }
      Err(_) => {
        kill_group(pid);
        // Reap the leader; kill_on_drop covers the case where this fails.
        let _ = child.kill().await;
        warn!(?elapsed, "Submission timed out; process group killed");
        Err(TutorError::Timeout { secs: self.timeout.as_secs().max(1) })
      }
    }
    // `workdir` drops here and removes the directory on every path above.
  }
}

async fn read_capped<R: tokio::io::AsyncRead + Unpin>(pipe: Option<&mut R>, cap: usize) -> String {
  let Some(pipe) = pipe else { return String::new() };
  let mut buf = Vec::new();
  let mut chunk = [0u8; 8192];
  let mut truncated = false;
  loop {
    match pipe.read(&mut chunk).await {
      Ok(0) | Err(_) => break,
      Ok(n) => {
        // Keep reading past the cap so the writer never blocks; just drop the bytes.
        let room = cap.saturating_sub(buf.len());
        if n > room {
          truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
      }
    }
  }
  let mut text = String::from_utf8_lossy(&buf).into_owned();
  if truncated {
    text.truncate(floor_char_boundary(&text, cap));
    text.push_str("\n[saída truncada]");
  }
  text
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
  use nix::sys::signal::{killpg, Signal};
  use nix::unistd::Pid;

  if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
    // ESRCH just means the group is already gone.
    let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
  }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
  use super::*;

  fn runner() -> CodeRunner {
    CodeRunner::new(&RunnerConfig::default())
  }

  #[tokio::test]
  async fn captures_stdout_and_exit_code() {
    let out = runner().run("print('olá')").await.unwrap();
    assert!(out.succeeded());
    assert_eq!(out.stdout.trim(), "olá");
    assert!(out.stderr.is_empty());
  }

  #[tokio::test]
  async fn division_by_zero_reports_stderr() {
    let out = runner().run("print(1/0)").await.unwrap();
    assert_ne!(out.exit_code, Some(0));
    assert!(out.stderr.contains("ZeroDivisionError"), "stderr: {}", out.stderr);
  }

  #[tokio::test]
  async fn infinite_loop_times_out_promptly() {
    let r = runner().with_timeout(Duration::from_secs(1));
    let start = Instant::now();
    let res = r.run("while True:\n    pass\n").await;
    assert!(matches!(res, Err(TutorError::Timeout { secs: 1 })));
    assert!(start.elapsed() < Duration::from_secs(4));
  }

  #[tokio::test]
  async fn background_children_do_not_hold_the_caller() {
    let r = runner().with_timeout(Duration::from_secs(1));
    let start = Instant::now();
    let src = "import subprocess, sys\nsubprocess.Popen([sys.executable, '-c', 'import time; time.sleep(60)'])\nwhile True:\n    pass\n";
    let res = r.run(src).await;
    assert!(matches!(res, Err(TutorError::Timeout { .. })));
    assert!(start.elapsed() < Duration::from_secs(4));
  }

  #[cfg(target_os = "linux")]
  fn is_running(pid: i32) -> bool {
    // Killed orphans may linger as zombies until init reaps them.
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
      .map(|stat| {
        let state = stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next());
        !matches!(state, Some("Z") | Some("X"))
      })
      .unwrap_or(false)
  }

  #[cfg(target_os = "linux")]
  #[tokio::test]
  async fn detached_children_are_killed_after_a_clean_exit() {
    let src = "import subprocess, sys\np = subprocess.Popen([sys.executable, '-c', 'import time; time.sleep(30)'], stdout=subprocess.DEVNULL, stderr=subprocess.DEVNULL)\nprint(p.pid)\n";
    let out = runner().run(src).await.unwrap();
    assert!(out.succeeded(), "stderr: {}", out.stderr);
    let pid: i32 = out.stdout.trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while is_running(pid) && Instant::now() < deadline {
      tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!is_running(pid), "pid {pid} survived the run");
  }

  #[tokio::test]
  async fn concurrent_runs_are_isolated() {
    let r = runner();
    let a = "open('out.txt', 'w').write('A')\nimport time; time.sleep(0.3)\nprint(open('out.txt').read())";
    let b = "open('out.txt', 'w').write('B')\nimport time; time.sleep(0.3)\nprint(open('out.txt').read())";
    let (ra, rb) = tokio::join!(r.run(a), r.run(b));
    assert_eq!(ra.unwrap().stdout.trim(), "A");
    assert_eq!(rb.unwrap().stdout.trim(), "B");
  }

  #[tokio::test]
  async fn environment_is_cleared() {
    std::env::set_var("TUTOR_RUNNER_SECRET", "s3cr3t");
    let out = runner()
      .run("import os\nprint(os.environ.get('TUTOR_RUNNER_SECRET', 'none'))")
      .await
      .unwrap();
    assert_eq!(out.stdout.trim(), "none");
  }

  #[tokio::test]
  async fn large_output_is_truncated() {
    let mut cfg = RunnerConfig::default();
    cfg.max_output_bytes = 100;
    let out = CodeRunner::new(&cfg).run("print('x' * 100000)").await.unwrap();
    assert!(out.succeeded());
    assert!(out.stdout.ends_with("[saída truncada]"));
    assert!(out.stdout.len() < 200);
  }

  #[tokio::test]
  async fn missing_interpreter_is_execution_failure() {
    let mut cfg = RunnerConfig::default();
    cfg.interpreter = "definitely-not-a-python-binary".into();
    let res = CodeRunner::new(&cfg).run("print(1)").await;
    assert!(matches!(res, Err(TutorError::ExecutionFailure(_))));
  }
}
