use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ProvisioningConfig;
use crate::credentials::ThingIdentity;
use crate::error::{Error, Result};
use crate::process::{CommandSpec, ProcessRunner, ensure_success};
use crate::workspace::WorkspacePaths;

pub const ENDPOINT_ENV: &str = "BOARDCFG_IOT_ENDPOINT";

/// Configured endpoint first, then the environment (which may come from `.env`),
/// then the lookup command. A failed lookup is logged and yields `None`.
pub fn resolve_endpoint(cfg: &ProvisioningConfig, runner: &dyn ProcessRunner) -> Option<String> {
    let configured = cfg
        .endpoint
        .clone()
        .or_else(|| std::env::var(ENDPOINT_ENV).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if configured.is_some() {
        return configured;
    }
    match lookup_endpoint(cfg, runner) {
        Ok(ep) => ep,
        Err(e) => {
            warn!("IoT endpoint lookup failed: {e}");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeEndpoint {
    endpoint_address: String,
}

/// `Ok(None)` when no lookup command is configured.
pub fn lookup_endpoint(
    cfg: &ProvisioningConfig,
    runner: &dyn ProcessRunner,
) -> Result<Option<String>> {
    if cfg.endpoint_lookup.is_empty() {
        return Ok(None);
    }
    let spec = CommandSpec::from_argv(&cfg.endpoint_lookup, Vec::<String>::new())?;
    let out = runner.output(&spec)?;
    ensure_success("endpoint lookup", out.status)?;
    let ep = parse_endpoint(&out.stdout)?;
    debug!(endpoint = %ep, "looked up IoT endpoint");
    Ok(Some(ep))
}

/// Pull `endpointAddress` out of a describe-endpoint JSON reply.
pub fn parse_endpoint(stdout: &str) -> Result<String> {
    let reply: DescribeEndpoint = serde_json::from_str(stdout)
        .map_err(|e| Error::msg(format!("unexpected endpoint lookup output: {e}")))?;
    let ep = reply.endpoint_address.trim();
    if ep.is_empty() {
        return Err(Error::msg("endpoint lookup returned an empty address"));
    }
    Ok(ep.to_string())
}

pub fn validate_thing_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::msg("thing name must not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':'))
    {
        return Err(Error::msg(format!(
            "thing name '{name}' is invalid (allowed: a-zA-Z0-9_-:)"
        )));
    }
    Ok(())
}

/// Drives the out-of-process provisioning script.
pub struct Provisioner<'a> {
    cfg: &'a ProvisioningConfig,
    dir: PathBuf,
    runner: &'a dyn ProcessRunner,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        cfg: &'a ProvisioningConfig,
        ws: &WorkspacePaths,
        runner: &'a dyn ProcessRunner,
    ) -> Result<Self> {
        Ok(Self {
            cfg,
            dir: ws.resolve(&cfg.dir)?,
            runner,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn create(&self, thing_name: &str) -> Result<()> {
        validate_thing_name(thing_name)?;
        info!(thing = thing_name, "provisioning cloud resources");
        self.run_with_template("provision", thing_name, &self.cfg.create_arg)
    }

    /// Delete the cloud resources and whatever certificate files remain.
    pub fn delete(&self, thing_name: &str) -> Result<()> {
        validate_thing_name(thing_name)?;
        info!(thing = thing_name, "cleaning up cloud resources");
        self.run_with_template("cleanup", thing_name, &self.cfg.delete_arg)?;

        for p in [
            ThingIdentity::cert_path(&self.dir, thing_name),
            ThingIdentity::private_key_path(&self.dir, thing_name),
        ] {
            if p.exists() {
                fs::remove_file(&p)
                    .map_err(|e| Error::msg(format!("failed to remove {}: {e}", p.display())))?;
                debug!(path = %p.display(), "removed credential file");
            }
        }
        Ok(())
    }

    pub fn identity(&self, thing_name: &str) -> Result<ThingIdentity> {
        ThingIdentity::load(&self.dir, thing_name)
    }

    // The script reads the thing name from its template file. The template is
    // tracked in version control, so it is put back byte for byte afterwards,
    // whether or not the script succeeded.
    fn run_with_template(&self, step: &str, thing_name: &str, arg: &str) -> Result<()> {
        let template = self.dir.join(&self.cfg.template);
        let original = if template.is_file() {
            let text = fs::read_to_string(&template).map_err(|e| {
                Error::msg(format!("failed to read {}: {e}", template.display()))
            })?;
            write_text(
                &template,
                &text.replace(&self.cfg.template_token, thing_name),
            )?;
            Some(text)
        } else {
            warn!(path = %template.display(), "provisioning template not found; running without it");
            None
        };

        let spec = CommandSpec::from_argv(&self.cfg.command, [arg])?.in_dir(&self.dir);
        let status = self.runner.run(&spec);

        if let Some(text) = original {
            write_text(&template, &text)?;
        }
        ensure_success(step, status?)
    }
}

fn write_text(p: &Path, s: &str) -> Result<()> {
    fs::write(p, s).map_err(|e| Error::msg(format!("failed to write {}: {e}", p.display())))
}
