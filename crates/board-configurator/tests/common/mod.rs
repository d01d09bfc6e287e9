#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use board_configurator::config::ToolConfig;
use board_configurator::process::{CommandOutput, CommandSpec, ProcessRunner, RunStatus};
use board_configurator::workspace::{WorkspaceConfig, WorkspacePaths, resolve_paths};

type Handler = Box<dyn Fn(&CommandSpec) -> RunStatus>;

/// Records every invocation and lets the test decide what each one does.
pub struct FakeRunner {
    pub calls: RefCell<Vec<CommandSpec>>,
    handler: Handler,
    stdout: String,
}

impl FakeRunner {
    pub fn new(handler: impl Fn(&CommandSpec) -> RunStatus + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            handler: Box::new(handler),
            stdout: String::new(),
        }
    }

    /// Text returned as stdout from every captured-output call.
    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    pub fn ok() -> Self {
        Self::new(|_| RunStatus::exited(0))
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.program.clone()).collect()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, cmd: &CommandSpec) -> board_configurator::Result<RunStatus> {
        self.calls.borrow_mut().push(cmd.clone());
        Ok((self.handler)(cmd))
    }

    fn output(&self, cmd: &CommandSpec) -> board_configurator::Result<CommandOutput> {
        self.calls.borrow_mut().push(cmd.clone());
        Ok(CommandOutput {
            status: (self.handler)(cmd),
            stdout: self.stdout.clone(),
        })
    }
}

/// Stand-in merge evaluator: every file is read as `KEY=value` lines, later
/// files win, output keeps first-seen key order.
pub fn fake_merge(cmd: &CommandSpec) -> RunStatus {
    let base = PathBuf::from(&cmd.args[0]);
    let output = PathBuf::from(&cmd.args[1]);
    let mut files = vec![base];
    files.extend(cmd.args[2..].iter().map(PathBuf::from));

    let mut merged: Vec<(String, String)> = Vec::new();
    for f in files {
        let Ok(text) = fs::read_to_string(&f) else {
            return RunStatus::exited(1);
        };
        for line in text.lines() {
            let Some((k, v)) = line.split_once('=') else {
                continue;
            };
            match merged.iter_mut().find(|(key, _)| key == k) {
                Some(slot) => slot.1 = v.to_string(),
                None => merged.push((k.to_string(), v.to_string())),
            }
        }
    }
    let text: String = merged.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
    match fs::write(output, text) {
        Ok(()) => RunStatus::exited(0),
        Err(_) => RunStatus::exited(1),
    }
}

pub fn tool_config() -> ToolConfig {
    let mut cfg = ToolConfig::default();
    cfg.tools.merge = vec!["fake-merge".into()];
    cfg.tools.editor = vec!["fake-editor".into()];
    cfg.tools.generator = vec!["fake-genconfig".into()];
    cfg.provisioning.command = vec!["fake-setup".into()];
    cfg.provisioning.dir = "provisioning".into();
    cfg.provisioning.endpoint_lookup = Vec::new();
    cfg
}

/// `<root>/tool` is the tool directory, `<root>/sdk` the SDK tree.
pub fn workspace(root: &Path) -> WorkspacePaths {
    let cfg = WorkspaceConfig {
        root_dir: root.join("tool").display().to_string(),
        sdk_root: root.join("sdk").display().to_string(),
        ..WorkspaceConfig::default()
    };
    let ws = resolve_paths(root, &cfg).expect("resolve workspace");
    fs::create_dir_all(&ws.root).expect("mkdir tool");
    fs::create_dir_all(ws.root.join("provisioning")).expect("mkdir provisioning");
    fs::create_dir_all(ws.final_header.parent().expect("header dir")).expect("mkdir header dir");
    ws
}

pub fn write(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir parent");
    }
    fs::write(path, text).expect("write fixture");
}
