//! Project configuration stored in `<project>/config.yaml`.
//!
//! The document is validated against a schema that accretes one entry per
//! enabled module: each action adds the schemas of the modules it reads
//! before touching the file. Every read and every write is validated; a write
//! that fails validation leaves the file untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::core::procedures::ActiveProcedures;
use crate::error::PipelineError;

/// A module schema shipped with the tool.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSchema {
    pub name: &'static str,
    pub schema: &'static str,
}

pub const BIDS_CONVERSION: ModuleSchema = ModuleSchema {
    name: "bids_conversion",
    schema: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../schemas/config/bids_conversion.schema.json"
    )),
};

pub const SUBJECT_FILE: ModuleSchema = ModuleSchema {
    name: "subject_file",
    schema: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../schemas/config/subject_file.schema.json"
    )),
};

pub const RSYNC: ModuleSchema = ModuleSchema {
    name: "rsync",
    schema: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../schemas/config/rsync.schema.json"
    )),
};

/// Explicitly constructed configuration handler, passed to whoever needs it.
#[derive(Debug, Clone)]
pub struct ConfigHandler {
    path: PathBuf,
    schema: Value,
}

impl ConfigHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema: json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Build a handler with the given shipped module schemas.
    pub fn with_modules(path: impl Into<PathBuf>, modules: &[ModuleSchema]) -> Result<Self> {
        let mut handler = Self::new(path);
        for module in modules {
            let schema: Value = serde_json::from_str(module.schema)
                .with_context(|| format!("parse {} schema", module.name))?;
            handler.add_schema(module.name, schema);
        }
        Ok(handler)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Require `module` and validate it against `schema`.
    pub fn add_schema(&mut self, module: &str, schema: Value) {
        self.schema["properties"][module] = schema;
        if let Some(required) = self.schema["required"].as_array_mut()
            && !required.iter().any(|name| name == module)
        {
            required.push(Value::String(module.to_string()));
        }
    }

    /// Validate a whole configuration document against the accreted schema.
    pub fn validate(&self, config: &Value) -> Result<()> {
        validate_against(config, &self.schema)
    }

    /// Validate a single module section against that module's schema.
    pub fn validate_module(&self, module: &str, value: &Value) -> Result<()> {
        let schema = self.schema["properties"].get(module).ok_or_else(|| {
            PipelineError::usage(format!("no schema registered for config module '{module}'"))
        })?;
        validate_against(value, schema)
    }

    /// Read and validate the configuration document.
    pub fn load(&self) -> Result<Value> {
        debug!(path = %self.path.display(), "loading config");
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let config: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("parse {}", self.path.display()))?;
        self.validate(&config)
            .with_context(|| format!("validate {}", self.path.display()))?;
        Ok(config)
    }

    /// Load the document and deserialize one module section.
    pub fn module<T: DeserializeOwned>(&self, module: &str) -> Result<T> {
        let mut config = self.load()?;
        let section = config
            .get_mut(module)
            .map(Value::take)
            .ok_or_else(|| anyhow!("config module '{module}' missing"))?;
        serde_json::from_value(section).with_context(|| format!("deserialize config '{module}'"))
    }

    /// Set `module.parameter = value` and persist the document.
    pub fn update_parameter(&self, module: &str, parameter: &str, value: Value) -> Result<()> {
        let mut config = self.load()?;
        let section = config
            .get_mut(module)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| anyhow!("config module '{module}' is not a mapping"))?;
        section.insert(parameter.to_string(), value);
        self.validate_module(module, &config[module])?;
        self.write(&config)
    }

    /// Validate and atomically write the whole document.
    pub fn write(&self, config: &Value) -> Result<()> {
        self.validate(config)
            .with_context(|| format!("refusing to write {}", self.path.display()))?;
        let buf = serde_yaml::to_string(config).context("serialize config yaml")?;
        write_atomic(&self.path, &buf)
    }
}

/// Validate a JSON instance against a JSON Schema (Draft 2020-12).
pub fn validate_against(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| anyhow!("invalid schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        return Ok(());
    }
    error!(errors = messages.len(), "config schema validation failed");
    Err(PipelineError::Config(messages.join("; ")).into())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// Settings for one of the two datasets (`source`, `bids`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSettings {
    pub dataset_name: String,
    #[serde(default)]
    pub setup_procedures: Vec<String>,
    #[serde(default)]
    pub patches: Vec<String>,
}

/// Typed view of the `bids_conversion` module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidsConversionConfig {
    #[serde(default)]
    pub active_procedures: ActiveProcedures,
    pub source: DatasetSettings,
    pub bids: DatasetSettings,
    pub default_procedure_dir: PathBuf,
    pub procedure_python_template: String,
    pub procedure_shell_template: String,
    pub rule_dir: PathBuf,
    pub rule_name: String,
    pub rule_template: String,
    pub validator_container_name: String,
    pub validator_image_url: String,
    #[serde(default = "default_validator_config_template")]
    pub validator_config_template: String,
    pub container_dir: PathBuf,
    #[serde(default = "default_container_runtime")]
    pub container_runtime: String,
    #[serde(default = "default_converter_container")]
    pub converter_container: PathBuf,
    pub config_acqid: String,
    pub config_anon_subject: String,
}

impl BidsConversionConfig {
    /// Rule file path relative to the source dataset.
    pub fn rule_file(&self) -> PathBuf {
        self.rule_dir.join(&self.rule_name)
    }
}

fn default_validator_config_template() -> String {
    "builtin:bids_validator_config.json".to_string()
}

fn default_container_runtime() -> String {
    "singularity".to_string()
}

fn default_converter_container() -> PathBuf {
    PathBuf::from("code/hirni-toolbox/converters/heudiconv/heudiconv.simg")
}

/// One side of an rsync transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsyncEndpoint {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    pub path: String,
}

/// Typed view of the `rsync` module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsyncConfig {
    pub src: RsyncEndpoint,
    pub dest: RsyncEndpoint,
}
