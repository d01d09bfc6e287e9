use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use toml::Value;

use crate::error::{Error, Result};
use crate::workspace::WorkspaceConfig;

pub const DEFAULT_CONFIG_FILE: &str = "boardcfg.toml";

#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<defaults>"),
            value: Value::Table(Default::default()),
        }
    }

    /// Deserialize the value at a dotted path; `None` when nothing is there.
    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let found = path
            .split('.')
            .filter(|seg| !seg.is_empty())
            .try_fold(&self.value, |cur, seg| cur.as_table()?.get(seg));
        found
            .map(|v| {
                v.clone().try_into::<T>().map_err(|e| {
                    Error::msg(format!(
                        "{}: invalid [{path}] section: {e}",
                        self.path.display()
                    ))
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub suffix: String,
    pub nested_dir: String,
    pub sort: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            suffix: "Kconfig".into(),
            nested_dir: "aws_demos/config_files".into(),
            sort: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub function_tag: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            function_tag: "FUNC".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub merge: Vec<String>,
    pub editor: Vec<String>,
    pub generator: Vec<String>,
    pub header_arg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            merge: vec!["python3".into(), "merge_config.py".into()],
            editor: vec!["guiconfig".into()],
            generator: vec!["genconfig".into()],
            header_arg: "--header-path".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub dir: String,
    pub command: Vec<String>,
    pub create_arg: String,
    pub delete_arg: String,
    pub template: String,
    pub template_token: String,
    pub endpoint: Option<String>,
    /// Asked for the endpoint when none is configured; empty disables the lookup.
    pub endpoint_lookup: Vec<String>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            dir: "../aws_config_quick_start".into(),
            command: vec!["python3".into(), "SetupAWS.py".into()],
            create_arg: "kconfig_setup".into(),
            delete_arg: "delete_prereq".into(),
            template: "configure.json".into(),
            template_token: "$thing_name".into(),
            endpoint: None,
            endpoint_lookup: [
                "aws",
                "iot",
                "describe-endpoint",
                "--endpoint-type",
                "iot:Data-ATS",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VendorEntry {
    pub vendor: String,
    pub boards: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildStep {
    pub label: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub steps: Vec<BuildStep>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let step = |label: &str, argv: &[&str]| BuildStep {
            label: label.into(),
            command: argv.iter().map(|a| (*a).to_string()).collect(),
        };
        Self {
            steps: vec![
                step(
                    "Generate build files",
                    &[
                        "cmake", "-D", "VENDOR={vendor}", "-D", "BOARD={board}", "-G", "Ninja",
                        "-S", ".", "-B", "build",
                    ],
                ),
                step("Build project", &["cmake", "--build", "build"]),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub workspace: WorkspaceConfig,
    pub discovery: DiscoveryConfig,
    pub header: HeaderConfig,
    pub tools: ToolsConfig,
    pub provisioning: ProvisioningConfig,
    pub catalog: Vec<VendorEntry>,
    pub build: BuildConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            discovery: DiscoveryConfig::default(),
            header: HeaderConfig::default(),
            tools: ToolsConfig::default(),
            provisioning: ProvisioningConfig::default(),
            catalog: default_catalog(),
            build: BuildConfig::default(),
        }
    }
}

impl ToolConfig {
    pub fn from_doc(doc: &ConfigDoc) -> Result<Self> {
        let catalog: Vec<VendorEntry> = doc
            .deserialize_path("catalog")?
            .unwrap_or_else(default_catalog);
        if catalog.is_empty() {
            return Err(Error::msg("catalog must list at least one vendor"));
        }
        for entry in &catalog {
            if entry.vendor.trim().is_empty() {
                return Err(Error::msg("catalog entry has an empty vendor"));
            }
            if entry.boards.is_empty() {
                return Err(Error::msg(format!(
                    "catalog vendor '{}' lists no boards",
                    entry.vendor
                )));
            }
        }

        let cfg = Self {
            workspace: doc.deserialize_path("workspace")?.unwrap_or_default(),
            discovery: doc.deserialize_path("discovery")?.unwrap_or_default(),
            header: doc.deserialize_path("header")?.unwrap_or_default(),
            tools: doc.deserialize_path("tools")?.unwrap_or_default(),
            provisioning: doc.deserialize_path("provisioning")?.unwrap_or_default(),
            catalog,
            build: doc.deserialize_path("build")?.unwrap_or_default(),
        };

        for (name, cmd) in [
            ("tools.merge", &cfg.tools.merge),
            ("tools.editor", &cfg.tools.editor),
            ("tools.generator", &cfg.tools.generator),
            ("provisioning.command", &cfg.provisioning.command),
        ] {
            if cmd.is_empty() {
                return Err(Error::msg(format!("{name} must name a program")));
            }
        }
        Ok(cfg)
    }

    // The default file is optional; an explicitly named one is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let doc = match explicit {
            Some(p) => load(p)?,
            None => {
                let p = Path::new(DEFAULT_CONFIG_FILE);
                if p.is_file() { load(p)? } else { ConfigDoc::empty() }
            }
        };
        Self::from_doc(&doc)
    }

    pub fn vendor(&self, name: &str) -> Option<&VendorEntry> {
        self.catalog.iter().find(|v| v.vendor == name)
    }
}

pub fn default_catalog() -> Vec<VendorEntry> {
    [
        (
            "cypress",
            &["CY8CKIT_064S0S2_4343W", "CYW943907AEVAL1F", "CYW954907AEVAL1F"][..],
        ),
        ("espressif", &["esp32"][..]),
        (
            "infineon",
            &["xmc4800_iotkit", "xmc4800_plus_optiga_trust_x"][..],
        ),
        ("marvell", &["mw300_rd"][..]),
        ("mediatek", &["mt7697hx-dev-kit"][..]),
        (
            "microchip",
            &["curiosity_pic32mzef", "ecc608a_plus_winsim"][..],
        ),
        ("nordic", &["nrf52840-dk"][..]),
        ("nuvoton", &["numaker_iot_m487_wifi"][..]),
        ("nxp", &["lpc54018iotmodule"][..]),
        ("pc", &["linux", "windows"][..]),
        ("renesas", &["rx65n-rsk"][..]),
        ("st", &["stm32l475_discovery"][..]),
        ("ti", &["cc3220_launchpad"][..]),
        ("xilinx", &["microzed"][..]),
    ]
    .iter()
    .map(|(vendor, boards)| VendorEntry {
        vendor: (*vendor).to_string(),
        boards: boards.iter().map(|b| (*b).to_string()).collect(),
    })
    .collect()
}

/// Lay `upper` over `lower`: tables merge key by key, anything else is replaced.
fn overlay(lower: &mut Value, upper: Value) {
    let Value::Table(upper) = upper else {
        *lower = upper;
        return;
    };
    if !lower.is_table() {
        *lower = Value::Table(upper);
        return;
    }
    let Some(lower) = lower.as_table_mut() else {
        return;
    };
    for (key, value) in upper {
        match lower.get_mut(&key) {
            Some(slot) => overlay(slot, value),
            None => {
                lower.insert(key, value);
            }
        }
    }
}

/// `path` followed by every file it (transitively) extends.
fn extends_chain(path: &Path) -> Result<Vec<Value>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(path.to_path_buf());

    while let Some(file) = next.take() {
        let key = file.canonicalize().unwrap_or_else(|_| file.clone());
        if !visited.insert(key) {
            return Err(Error::msg(format!(
                "tool config {} extends itself (via {})",
                path.display(),
                file.display()
            )));
        }

        let text = fs::read_to_string(&file)
            .map_err(|e| Error::msg(format!("failed to read {}: {e}", file.display())))?;
        let mut value: Value = toml::from_str(&text)
            .map_err(|e| Error::msg(format!("{}: {e}", file.display())))?;

        next = match value.as_table_mut().and_then(|t| t.remove("extends")) {
            None => None,
            Some(Value::String(parent)) => {
                let dir = file.parent().unwrap_or_else(|| Path::new("."));
                Some(dir.join(parent.trim()))
            }
            Some(_) => {
                return Err(Error::msg(format!(
                    "{}: extends must be a path",
                    file.display()
                )));
            }
        };
        chain.push(value);
    }
    Ok(chain)
}

/// Load a tool config. A root-level `extends = "<path>"` names a parent file
/// (relative to the extending one) whose settings apply first.
pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut value = Value::Table(Default::default());
    for layer in extends_chain(path)?.into_iter().rev() {
        overlay(&mut value, layer);
    }
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}
