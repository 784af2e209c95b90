#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CmdResult {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Parsed JSON lines from stdout (`--json` runs).
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("stdout line is JSON"))
            .collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e["event"].as_str().map(ToString::to_string))
            .collect()
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_linksweep") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "linksweep.exe"
    } else {
        "linksweep"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve linksweep binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_stdin(case_name, args, "")
}

/// Run the binary with `stdin` piped in (closed after writing).
pub fn run_cli_case_with_stdin(case_name: &str, args: &[&str], stdin: &str) -> CmdResult {
    let root = std::env::temp_dir().join("linksweep-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut child = Command::new(&bin_path)
        .args(args)
        .env_remove("LINKSWEEP_MEDIA_DIR")
        .env_remove("LINKSWEEP_LOG_DIR")
        .env_remove("LINKSWEEP_JSON_LOG")
        .env_remove("LINKSWEEP_MAX_DEPTH")
        .env_remove("LINKSWEEP_OUTPUT_FORMAT")
        .env("RUST_BACKTRACE", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn linksweep");
    {
        let mut pipe = child.stdin.take().expect("stdin piped");
        // The process may exit without reading; a broken pipe is fine.
        let _ = pipe.write_all(stdin.as_bytes());
    }
    let output = child.wait_with_output().expect("execute linksweep command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("stdin={stdin:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// A throwaway media library with one instance `ad1` and its mount directory.
pub struct Library {
    pub tmp: TempDir,
    pub media: PathBuf,
    pub mount: PathBuf,
    pub logs: PathBuf,
    pub config_path: PathBuf,
}

impl Library {
    pub fn new() -> Self {
        Self::with_config_extra("")
    }

    /// `extra` is appended to the generated config (e.g. a `[scan]` table).
    pub fn with_config_extra(extra: &str) -> Self {
        Self::build(extra, "")
    }

    /// `settings` are added to the `ad1` instance table (e.g. `category`).
    pub fn with_instance_settings(settings: &str) -> Self {
        Self::build("", settings)
    }

    fn build(extra: &str, settings: &str) -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let media = tmp.path().join("media");
        let mount = tmp.path().join("mnt").join("ad1");
        let logs = tmp.path().join("logs");
        fs::create_dir_all(&media).expect("create media dir");
        fs::create_dir_all(&mount).expect("create mount dir");

        let config_path = tmp.path().join("linksweep.toml");
        let config = format!(
            "media_dir = {media:?}\n\n[logging]\ndir = {logs:?}\n\n{extra}\n\n\
             [[instances]]\nname = \"ad1\"\nmount_path = {mount:?}\n{settings}\n",
            media = media.display().to_string(),
            logs = logs.display().to_string(),
            mount = mount.display().to_string(),
        );
        fs::write(&config_path, config).expect("write config");

        Self {
            tmp,
            media,
            mount,
            logs,
            config_path,
        }
    }

    pub fn config_arg(&self) -> String {
        self.config_path.display().to_string()
    }

    /// Create a symlink at `media/<rel>` pointing at `target`.
    #[cfg(unix)]
    pub fn link(&self, rel: &str, target: &Path) -> PathBuf {
        let path = self.media.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create link parent");
        }
        std::os::unix::fs::symlink(target, &path).expect("create symlink");
        path
    }

    /// Run with `--config` plus `args`.
    pub fn run(&self, case_name: &str, args: &[&str]) -> CmdResult {
        self.run_with_stdin(case_name, args, "")
    }

    pub fn run_with_stdin(&self, case_name: &str, args: &[&str], stdin: &str) -> CmdResult {
        let config = self.config_arg();
        let mut full = vec!["--config", config.as_str()];
        full.extend_from_slice(args);
        run_cli_case_with_stdin(case_name, &full, stdin)
    }
}

pub fn exists_as_link(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}
