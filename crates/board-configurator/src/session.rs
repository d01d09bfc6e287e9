use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ToolConfig;
use crate::credentials::{self, CredentialKey, CredentialValues};
use crate::discovery;
use crate::error::{Error, Result};
use crate::header;
use crate::merge;
use crate::process::{CommandSpec, ProcessRunner, ensure_success};
use crate::provision::{self, Provisioner};
use crate::records::{BoardIdentity, RecordStore, ThingName};
use crate::state;
use crate::workspace::WorkspacePaths;

#[derive(Debug, Clone, Serialize)]
pub struct StateEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub board: Option<BoardIdentity>,
    pub thing: Option<ThingName>,
    pub state_file: PathBuf,
    pub state_entries: Vec<StateEntry>,
    pub final_header: PathBuf,
    pub final_header_exists: bool,
}

/// One operator session against a working directory. All disk-backed
/// "current choice" state goes through the two record stores.
pub struct Session<'a> {
    pub cfg: &'a ToolConfig,
    pub ws: &'a WorkspacePaths,
    runner: &'a dyn ProcessRunner,
    boards: &'a dyn RecordStore<BoardIdentity>,
    things: &'a dyn RecordStore<ThingName>,
}

impl<'a> Session<'a> {
    pub fn new(
        cfg: &'a ToolConfig,
        ws: &'a WorkspacePaths,
        runner: &'a dyn ProcessRunner,
        boards: &'a dyn RecordStore<BoardIdentity>,
        things: &'a dyn RecordStore<ThingName>,
    ) -> Self {
        Self {
            cfg,
            ws,
            runner,
            boards,
            things,
        }
    }

    pub fn current_board(&self) -> Result<Option<BoardIdentity>> {
        self.boards.load()
    }

    pub fn current_thing(&self) -> Result<Option<ThingName>> {
        self.things.load()
    }

    fn require_board(&self) -> Result<BoardIdentity> {
        self.current_board()?
            .ok_or_else(|| Error::msg("no board selected yet; choose a board first"))
    }

    fn provisioner(&self) -> Result<Provisioner<'a>> {
        Provisioner::new(&self.cfg.provisioning, self.ws, self.runner)
    }

    pub fn discover(&self, board: &BoardIdentity) -> Result<Vec<PathBuf>> {
        discovery::discover(self.ws, &self.cfg.discovery, &board.vendor, &board.board)
    }

    /// Discover, merge, then remember the board. The record is only written
    /// once the merge succeeded.
    pub fn select_board(&self, board: &BoardIdentity) -> Result<Vec<PathBuf>> {
        let known = self
            .cfg
            .vendor(&board.vendor)
            .map(|v| v.boards.iter().any(|b| b == &board.board))
            .unwrap_or(false);
        if !known {
            warn!(%board, "board is not in the catalog; continuing anyway");
        }

        let files = self.discover(board)?;
        if files.is_empty() {
            warn!(%board, "no board definition files found; using shared defaults only");
        }
        merge::merge(
            self.runner,
            &self.cfg.tools.merge,
            &self.ws.base_definition,
            &self.ws.state_file,
            &files,
        )?;
        self.boards.save(board)?;
        info!(%board, files = files.len(), "board configuration merged");
        Ok(files)
    }

    /// Values to inject for the current thing. Missing certificate files only
    /// drop the certificate and key; the name and endpoint still go in.
    pub fn credential_values(&self, thing: &ThingName) -> Result<CredentialValues> {
        let endpoint = provision::resolve_endpoint(&self.cfg.provisioning, self.runner);
        if endpoint.is_none() {
            warn!(
                "no IoT endpoint available (set provisioning.endpoint or {}); leaving placeholder",
                provision::ENDPOINT_ENV
            );
        }
        match self.provisioner()?.identity(thing.as_str()) {
            Ok(id) => Ok(id.credential_values(endpoint.as_deref())),
            Err(e) => {
                warn!(thing = %thing, "certificate files unavailable: {e}");
                let mut values = CredentialValues::new();
                values.insert(CredentialKey::ThingName, thing.as_str().to_string());
                if let Some(ep) = endpoint {
                    values.insert(CredentialKey::Endpoint, ep);
                }
                Ok(values)
            }
        }
    }

    /// Inject, edit, generate, reset, correct.
    ///
    /// The reset runs no matter how the editor or generator ended, so the
    /// state file never keeps live credentials.
    pub fn configure(&self) -> Result<()> {
        let board = self.require_board()?;
        let state_file = &self.ws.state_file;
        if !state_file.is_file() {
            return Err(Error::msg(format!(
                "no configuration state at {}; choose a board first",
                state_file.display()
            )));
        }
        info!(%board, "configuring");

        let injected = match self.current_thing()? {
            Some(thing) => {
                let values = self.credential_values(&thing)?;
                credentials::inject_file(state_file, &values)
            }
            None => Ok(()),
        };

        let edited = injected
            .and_then(|()| self.run_editor())
            .and_then(|()| self.run_generator());
        credentials::reset_file(state_file)?;
        edited?;

        header::correct(
            &self.ws.raw_header,
            &self.ws.final_header,
            &self.cfg.header.function_tag,
        )
    }

    fn run_editor(&self) -> Result<()> {
        let spec = CommandSpec::from_argv(&self.cfg.tools.editor, Vec::<String>::new())?
            .in_dir(&self.ws.root)
            .interactive();
        ensure_success("editor", self.runner.run(&spec)?)
    }

    fn run_generator(&self) -> Result<()> {
        let arg = format!(
            "{}={}",
            self.cfg.tools.header_arg,
            self.ws.raw_header.display()
        );
        let spec = CommandSpec::from_argv(&self.cfg.tools.generator, [arg])?.in_dir(&self.ws.root);
        ensure_success("generator", self.runner.run(&spec)?)
    }

    pub fn build(&self) -> Result<()> {
        let board = self.require_board()?;
        if self.cfg.build.steps.is_empty() {
            return Err(Error::msg("no build steps configured"));
        }
        for step in &self.cfg.build.steps {
            let argv = step
                .command
                .iter()
                .map(|a| expand_board_template(a, &board))
                .collect::<Vec<_>>();
            let spec = CommandSpec::from_argv(&argv, Vec::<String>::new())?
                .in_dir(&self.ws.sdk_root)
                .interactive();
            info!(step = %step.label, "build step");
            ensure_success(&step.label, self.runner.run(&spec)?)?;
        }
        Ok(())
    }

    pub fn provision(&self, thing_name: &str) -> Result<ThingName> {
        let thing_name = thing_name.trim();
        if let Some(existing) = self.current_thing()? {
            return Err(Error::msg(format!(
                "thing '{existing}' already exists; clean it up first"
            )));
        }
        self.provisioner()?.create(thing_name)?;
        let thing = ThingName(thing_name.to_string());
        self.things.save(&thing)?;
        Ok(thing)
    }

    /// `Ok(None)` when there was nothing to clean up.
    pub fn cleanup(&self) -> Result<Option<ThingName>> {
        let Some(thing) = self.current_thing()? else {
            return Ok(None);
        };
        self.provisioner()?.delete(thing.as_str())?;
        self.things.clear()?;
        Ok(Some(thing))
    }

    pub fn status(&self) -> Result<Status> {
        let state_entries = if self.ws.state_file.is_file() {
            let text = fs::read_to_string(&self.ws.state_file).map_err(|e| {
                Error::msg(format!(
                    "failed to read state {}: {e}",
                    self.ws.state_file.display()
                ))
            })?;
            state::parse_entries(&text)
                .into_iter()
                .map(|(key, value)| StateEntry { key, value })
                .collect()
        } else {
            Vec::new()
        };
        Ok(Status {
            board: self.current_board()?,
            thing: self.current_thing()?,
            state_file: self.ws.state_file.clone(),
            state_entries,
            final_header: self.ws.final_header.clone(),
            final_header_exists: self.ws.final_header.is_file(),
        })
    }
}

pub fn expand_board_template(raw: &str, board: &BoardIdentity) -> String {
    raw.replace("{vendor}", &board.vendor)
        .replace("{board}", &board.board)
}
