//! Placeholder-based credential injection for the persisted state.
//!
//! At rest the state only ever holds placeholder tokens for device identity
//! values. Live values are substituted right before an edit session and the
//! canonical placeholder lines are restored right after it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::state::{StateLine, classify, lines_with_endings, strip_terminator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CredentialKey {
    Endpoint,
    ThingName,
    Certificate,
    PrivateKey,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 4] = [
        CredentialKey::Endpoint,
        CredentialKey::ThingName,
        CredentialKey::Certificate,
        CredentialKey::PrivateKey,
    ];

    pub fn config_key(self) -> &'static str {
        match self {
            CredentialKey::Endpoint => "CONFIG_IOT_ENDPOINT",
            CredentialKey::ThingName => "CONFIG_THING_NAME",
            CredentialKey::Certificate => "CONFIG_THING_CERT",
            CredentialKey::PrivateKey => "CONFIG_THING_PRIVATE_KEY",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            CredentialKey::Endpoint => "<IOT_ENDPOINT>",
            CredentialKey::ThingName => "<THING_NAME>",
            CredentialKey::Certificate => "<THING_CERT>",
            CredentialKey::PrivateKey => "<THING_PRIVATE_KEY>",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.config_key() == key)
    }

    /// `KEY="<PLACEHOLDER>"`, the only form a credential line has at rest.
    pub fn canonical_line(self) -> String {
        format!("{}=\"{}\"", self.config_key(), self.placeholder())
    }
}

pub type CredentialValues = BTreeMap<CredentialKey, String>;

/// Replace every placeholder present in `values` with its live value, in a
/// single left-to-right pass. Absent placeholders are left untouched.
pub fn inject(state: &str, values: &CredentialValues) -> String {
    let tokens: Vec<(&str, &str)> = values
        .iter()
        .map(|(k, v)| (k.placeholder(), v.as_str()))
        .collect();

    let mut out = String::with_capacity(state.len());
    let mut rest = state;
    loop {
        let next = tokens
            .iter()
            .filter_map(|(tok, val)| rest.find(*tok).map(|at| (at, *tok, *val)))
            .min_by_key(|(at, _, _)| *at);
        let Some((at, tok, val)) = next else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..at]);
        out.push_str(val);
        rest = &rest[at + tok.len()..];
    }
    out
}

/// Rewrite every credential line to its canonical placeholder form, whatever
/// it currently holds. Keys are matched as whole tokens bounded by `=`, so
/// `CONFIG_THING_NAME_SUFFIX` is not a credential line.
pub fn reset(state: &str) -> String {
    let mut out = String::with_capacity(state.len());
    for line in lines_with_endings(state) {
        let key = match classify(line) {
            StateLine::Set { key, .. } | StateLine::Unset { key } => {
                CredentialKey::from_config_key(key)
            }
            StateLine::Other => None,
        };
        match key {
            Some(k) => {
                out.push_str(&k.canonical_line());
                out.push_str(strip_terminator(line).1);
            }
            None => out.push_str(line),
        }
    }
    out
}

pub fn inject_file(path: &Path, values: &CredentialValues) -> Result<()> {
    let text = read_state(path)?;
    let updated = inject(&text, values);
    debug!(path = %path.display(), injected = values.len(), "injected credentials");
    write_state(path, &updated)
}

pub fn reset_file(path: &Path) -> Result<()> {
    let text = read_state(path)?;
    let updated = reset(&text);
    if updated != text {
        write_state(path, &updated)?;
    }
    debug!(path = %path.display(), "restored credential placeholders");
    Ok(())
}

fn read_state(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read state {}: {e}", path.display())))
}

fn write_state(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)
        .map_err(|e| Error::msg(format!("failed to write state {}: {e}", path.display())))
}

/// Drop PEM armor lines and join the body into one scalar value.
pub fn flatten_pem(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("-----"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingIdentity {
    pub thing_name: String,
    pub certificate_text: String,
    pub private_key_text: String,
}

impl ThingIdentity {
    pub fn cert_path(dir: &Path, thing_name: &str) -> PathBuf {
        dir.join(format!("{thing_name}_cert_pem_file"))
    }

    pub fn private_key_path(dir: &Path, thing_name: &str) -> PathBuf {
        dir.join(format!("{thing_name}_private_key_pem_file"))
    }

    /// Read the files the provisioning script leaves behind.
    pub fn load(dir: &Path, thing_name: &str) -> Result<Self> {
        let read = |p: PathBuf| {
            fs::read_to_string(&p)
                .map_err(|e| Error::msg(format!("failed to read {}: {e}", p.display())))
        };
        Ok(Self {
            thing_name: thing_name.to_string(),
            certificate_text: flatten_pem(&read(Self::cert_path(dir, thing_name))?),
            private_key_text: flatten_pem(&read(Self::private_key_path(dir, thing_name))?),
        })
    }

    pub fn credential_values(&self, endpoint: Option<&str>) -> CredentialValues {
        let mut values = CredentialValues::new();
        values.insert(CredentialKey::ThingName, self.thing_name.clone());
        values.insert(CredentialKey::Certificate, self.certificate_text.clone());
        values.insert(CredentialKey::PrivateKey, self.private_key_text.clone());
        if let Some(ep) = endpoint {
            values.insert(CredentialKey::Endpoint, ep.to_string());
        }
        values
    }
}
