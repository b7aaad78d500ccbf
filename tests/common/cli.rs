use assert_cmd::Command;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

#[derive(Debug)]
pub struct TqRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
    pub duration: Duration,
    pub log_path: PathBuf,
}

impl TqRun {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&extract_json_payload(&self.stdout)).unwrap_or_else(|err| {
            panic!(
                "stdout is not JSON ({err}), see {}:\n{}",
                self.log_path.display(),
                self.stdout
            )
        })
    }
}

pub struct TqWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub log_dir: PathBuf,
}

impl TqWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        let log_dir = root.join("logs");
        fs::create_dir_all(&log_dir).expect("log dir");
        Self {
            temp_dir,
            root,
            log_dir,
        }
    }

    /// Workspace with `tq init` run and the shared tracker fixture imported.
    pub fn with_tracker() -> Self {
        let workspace = Self::new();
        let init = run_tq(&workspace, ["init"], "setup_init");
        assert!(init.status.success(), "init failed: {}", init.stderr);

        let fixture = workspace.root.join("tracker.yaml");
        fs::write(&fixture, super::fixtures::TRACKER_YAML).expect("write fixture");
        let import = run_tq(&workspace, ["import", "tracker.yaml"], "setup_import");
        assert!(import.status.success(), "import failed: {}", import.stderr);
        workspace
    }
}

pub fn run_tq<I, S>(workspace: &TqWorkspace, args: I, label: &str) -> TqRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_tq_with_env(
        workspace,
        args,
        std::iter::empty::<(String, String)>(),
        label,
    )
}

pub fn run_tq_with_env<I, S, E, K, V>(
    workspace: &TqWorkspace,
    args: I,
    env_vars: E,
    label: &str,
) -> TqRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tq"));
    cmd.current_dir(&workspace.root);
    cmd.args(args);
    cmd.env_remove("TRAQ_DIR");
    cmd.env_remove("TRAQ_LOG_FORMAT");
    cmd.envs(env_vars);
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_LOG", "traq_rust=debug");
    cmd.env("RUST_BACKTRACE", "1");
    cmd.env("HOME", &workspace.root);

    let start = Instant::now();
    let output = cmd.output().expect("run tq");
    let duration = start.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_path = workspace.log_dir.join(format!("{label}.log"));
    let timestamp = SystemTime::now();
    let log_body = format!(
        "label: {label}\nstarted: {:?}\nduration: {:?}\nstatus: {}\nargs: {:?}\ncwd: {}\n\nstdout:\n{}\n\nstderr:\n{}\n",
        timestamp,
        duration,
        output.status,
        cmd.get_args().collect::<Vec<_>>(),
        workspace.root.display(),
        stdout,
        stderr
    );
    fs::write(&log_path, log_body).expect("write log");

    TqRun {
        stdout,
        stderr,
        status: output.status,
        duration,
        log_path,
    }
}

pub fn extract_json_payload(stdout: &str) -> String {
    let lines: Vec<&str> = stdout.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return lines[idx..].join("\n").trim().to_string();
        }
    }
    stdout.trim().to_string()
}
