//! Scripted stand-ins for the target device and the controlling host.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use pifab::config::PipelineConfig;
use pifab::executor::{LocalShell, RemoteShell};
use pifab::ssh::CommandOutput;
use tempfile::TempDir;

/// Files extracted from the source archive, relative to the staging dir.
const SOURCE_TREE: &[(&str, &str)] = &[
    ("source/run_tests.py", "tests"),
    ("source/scripts/rpio", "#!/usr/bin/env python"),
    ("source/scripts/rpio-curses", "#!/usr/bin/env python"),
    ("source/c_gpio/Makefile", "gpio"),
    ("source/c_pwm/Makefile", "pwm"),
    ("source/RPIO/__init__.py", ""),
    ("source/RPIO/PWM/__init__.py", ""),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    pub interpreter: String,
    /// Content of the neutral GPIO module when the suite ran.
    pub gpio: Option<String>,
}

/// In-memory device that understands the commands the pipeline issues.
pub struct FakeHost {
    files: RefCell<BTreeMap<String, String>>,
    dirs: RefCell<BTreeSet<String>>,
    commands: RefCell<Vec<String>>,
    uploads: RefCell<Vec<String>>,
    test_runs: RefCell<Vec<TestRun>>,
    eggs: RefCell<Vec<String>>,
    failing_suite: Option<String>,
    printed_version: String,
}

impl FakeHost {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/tmp".to_string());
        Self {
            files: RefCell::new(BTreeMap::new()),
            dirs: RefCell::new(dirs),
            commands: RefCell::new(Vec::new()),
            uploads: RefCell::new(Vec::new()),
            test_runs: RefCell::new(Vec::new()),
            eggs: RefCell::new(Vec::new()),
            failing_suite: None,
            printed_version: "0.10.0".to_string(),
        }
    }

    /// Make the test runner fail under `executable`.
    pub fn failing_suite_under(mut self, executable: &str) -> Self {
        self.failing_suite = Some(executable.to_string());
        self
    }

    /// Version printed by import checks; empty simulates a broken build.
    pub fn printing_version(mut self, version: &str) -> Self {
        self.printed_version = version.to_string();
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    pub fn files_under(&self, dir: &str) -> BTreeMap<String, String> {
        let prefix = format!("{}/", dir);
        self.files
            .borrow()
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{}/", path);
        self.dirs.borrow().contains(path)
            || self.files.borrow().keys().any(|f| f.starts_with(&prefix))
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.borrow().clone()
    }

    pub fn test_runs(&self) -> Vec<TestRun> {
        self.test_runs.borrow().clone()
    }

    pub fn eggs(&self) -> Vec<String> {
        self.eggs.borrow().clone()
    }

    fn write(&self, path: &str, content: &str) {
        let mut dirs = self.dirs.borrow_mut();
        let mut parent = parent_of(path);
        while let Some(dir) = parent {
            dirs.insert(dir.clone());
            parent = parent_of(&dir);
        }
        self.files
            .borrow_mut()
            .insert(path.to_string(), content.to_string());
    }

    fn remove_tree(&self, path: &str) {
        let prefix = format!("{}/", path);
        self.files
            .borrow_mut()
            .retain(|f, _| f != path && !f.starts_with(&prefix));
        self.dirs
            .borrow_mut()
            .retain(|d| d != path && !d.starts_with(&prefix));
    }

    fn copy(&self, cwd: &str, from: &str, to: &str, keep_source: bool) -> CommandOutput {
        let source = resolve(cwd, from);
        let Some(content) = self.file(&source) else {
            return CommandOutput::failed(1, format!("cannot stat '{}': No such file", from));
        };

        let mut dest = resolve(cwd, to);
        if self.is_dir(&dest) {
            dest = format!("{}/{}", dest, basename(&source));
        }
        match parent_of(&dest) {
            Some(parent) if self.is_dir(&parent) => {}
            _ => return CommandOutput::failed(1, format!("cannot create '{}'", to)),
        }

        if !keep_source {
            self.files.borrow_mut().remove(&source);
        }
        self.write(&dest, &content);
        CommandOutput::ok("")
    }

    fn extract(&self, cwd: &str, archive: &str) -> CommandOutput {
        let path = resolve(cwd, archive);
        if self.file(&path).is_none() {
            return CommandOutput::failed(2, format!("tar: {}: Cannot open", archive));
        }

        let name = basename(&path);
        if name == "rpio.tar.gz" {
            for (rel, content) in SOURCE_TREE {
                self.write(&format!("{}/{}", cwd, rel), content);
            }
        } else {
            let dir = name.trim_end_matches(".tar.gz");
            self.write(&format!("{}/{}/setup.py", cwd, dir), "setup");
        }
        CommandOutput::ok("")
    }

    fn make(&self, cwd: &str, target: &str) -> CommandOutput {
        let version = target.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        let (rel, content) = if target.starts_with("gpio") {
            ("build/_GPIO.so", format!("_GPIO {}", version))
        } else if target.starts_with("py") {
            ("_PWM.so", format!("_PWM {}", version))
        } else if target == "dirty" {
            ("pwm", "demo".to_string())
        } else {
            return CommandOutput::failed(2, format!("make: *** No rule to make target '{}'", target));
        };
        self.write(&format!("{}/{}", cwd, rel), &content);
        CommandOutput::ok("")
    }

    fn python(&self, cwd: &str, executable: &str, args: &[String]) -> CommandOutput {
        match args.first().map(String::as_str) {
            Some("-c") => {
                let snippet = args.get(1).cloned().unwrap_or_default();
                let module = snippet
                    .trim_start_matches("import ")
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                if self.file(&format!("{}/{}.so", cwd, module)).is_none() {
                    return CommandOutput::failed(1, format!("ImportError: No module named {}", module));
                }
                CommandOutput::ok(format!("{}\n", self.printed_version))
            }
            Some("setup.py") => {
                if self.file(&format!("{}/setup.py", cwd)).is_none() {
                    return CommandOutput::failed(2, "can't open file 'setup.py'");
                }
                self.eggs.borrow_mut().push(executable.to_string());
                CommandOutput::ok("")
            }
            Some(script) => {
                if self.file(&resolve(cwd, script)).is_none() {
                    return CommandOutput::failed(2, format!("can't open file '{}'", script));
                }
                self.test_runs.borrow_mut().push(TestRun {
                    interpreter: executable.to_string(),
                    gpio: self.file(&format!("{}/RPIO/_GPIO.so", cwd)),
                });
                if self.failing_suite.as_deref() == Some(executable) {
                    return CommandOutput::failed(1, "FAILED (failures=1)");
                }
                CommandOutput::ok("OK")
            }
            None => CommandOutput::failed(2, "interactive interpreter not supported"),
        }
    }

    fn dispatch(&self, cwd: &str, args: &[String]) -> CommandOutput {
        let args: Vec<String> = match args.first().map(String::as_str) {
            Some("sudo") => args[1..].to_vec(),
            _ => args.to_vec(),
        };
        let Some(program) = args.first() else {
            return CommandOutput::ok("");
        };
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        match program.as_str() {
            "test" if arg(1) == "-d" => {
                if self.is_dir(&resolve(cwd, &arg(2))) {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1, "")
                }
            }
            "rm" => {
                self.remove_tree(&resolve(cwd, &arg(2)));
                CommandOutput::ok("")
            }
            "cp" => self.copy(cwd, &arg(1), &arg(2), true),
            "mv" => self.copy(cwd, &arg(1), &arg(2), false),
            "tar" if arg(1) == "-xf" => self.extract(cwd, &arg(2)),
            "make" => self.make(cwd, &arg(1)),
            "./pwm" => {
                if self.file(&format!("{}/pwm", cwd)).is_none() {
                    return CommandOutput::failed(127, "./pwm: not found");
                }
                CommandOutput::ok("PWM demo finished")
            }
            p if p.starts_with("python") => self.python(cwd, p, &args[1..]),
            other => CommandOutput::failed(127, format!("{}: command not found", other)),
        }
    }
}

impl RemoteShell for FakeHost {
    fn host(&self) -> &str {
        "raspberry_dev_local"
    }

    fn execute(&self, command: &str) -> CommandOutput {
        self.commands.borrow_mut().push(command.to_string());

        let (cwd, rest) = match command.strip_prefix("cd ") {
            Some(tail) => match tail.split_once(" && ") {
                Some((dir, rest)) => {
                    let dir = split_args(dir).into_iter().next().unwrap_or_default();
                    (dir, rest)
                }
                None => return CommandOutput::ok(""),
            },
            None => ("/".to_string(), command),
        };

        if !self.is_dir(&cwd) && cwd != "/" {
            return CommandOutput::failed(2, format!("cd: can't cd to {}", cwd));
        }

        self.dispatch(&cwd, &split_args(rest))
    }

    fn upload_file(&self, local_path: &Path, remote_path: &str) -> CommandOutput {
        let Ok(content) = fs::read(local_path) else {
            return CommandOutput::failed(1, "local file unreadable");
        };
        match parent_of(remote_path) {
            Some(parent) if self.is_dir(&parent) => {}
            _ => return CommandOutput::failed(1, format!("{}: No such file or directory", remote_path)),
        }
        self.uploads.borrow_mut().push(remote_path.to_string());
        self.write(remote_path, &String::from_utf8_lossy(&content));
        CommandOutput::ok("")
    }
}

/// Controlling host: runs the packaging commands against a scratch project.
pub struct FakeLocal {
    commands: RefCell<Vec<String>>,
    dist_name: String,
}

impl FakeLocal {
    pub fn new(dist_name: &str) -> Self {
        Self {
            commands: RefCell::new(Vec::new()),
            dist_name: dist_name.to_string(),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl LocalShell for FakeLocal {
    fn execute(&self, command: &str, current_dir: Option<&Path>) -> CommandOutput {
        self.commands.borrow_mut().push(command.to_string());
        let cwd = current_dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let args = split_args(command);
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        match arg(0).as_str() {
            "tar" => {
                let archive = PathBuf::from(arg(2));
                if !cwd.join(arg(3)).is_dir() {
                    return CommandOutput::failed(2, "tar: source: Cannot stat");
                }
                match fs::write(&archive, b"rpio source archive") {
                    Ok(()) => CommandOutput::ok(""),
                    Err(e) => CommandOutput::failed(2, e.to_string()),
                }
            }
            "rm" => {
                let _ = fs::remove_dir_all(cwd.join(arg(2)));
                CommandOutput::ok("")
            }
            "python" if args.iter().any(|a| a == "sdist") => {
                let dist = cwd.join("dist");
                let written = fs::create_dir_all(&dist)
                    .and_then(|_| fs::write(dist.join(&self.dist_name), b"sdist"));
                match written {
                    Ok(()) => CommandOutput::ok("running sdist"),
                    Err(e) => CommandOutput::failed(1, e.to_string()),
                }
            }
            other => CommandOutput::failed(127, format!("{}: command not found", other)),
        }
    }
}

/// A scratch project with a `source/` tree, and a config pointing at it.
pub fn project() -> (TempDir, PipelineConfig) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("source/scripts")).unwrap();
    fs::write(dir.path().join("source/run_tests.py"), "tests").unwrap();

    let mut config = PipelineConfig::default();
    config.local.project_root = dir.path().to_path_buf();
    config.local.archive_path = dir.path().join("rpio.tar.gz");
    (dir, config)
}

fn split_args(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' if quoted => quoted = false,
            '\'' => {
                quoted = true;
                in_arg = true;
            }
            '\\' if !quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_arg = true;
                }
            }
            c if c.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> Option<String> {
    let (parent, _) = path.rsplit_once('/')?;
    if parent.is_empty() {
        None
    } else {
        Some(parent.to_string())
    }
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
