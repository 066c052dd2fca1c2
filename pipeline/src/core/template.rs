//! Placeholder rendering for user-supplied strings (tarball paths, procedure
//! parameters, rsync paths, patch paths).

use std::borrow::Cow;

use anyhow::{Context, Result};
use minijinja::Environment;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::PipelineError;

/// Values a placeholder string may reference.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Placeholders<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_subject: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acqid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<&'a str>,
}

/// Names a placeholder may use.
const NAMES: [&str; 3] = ["anon_subject", "acqid", "project_dir"];

/// Render `{{ name }}` placeholders. The single-brace form `{name}` is
/// accepted for the known names. Unknown names are a usage error.
pub fn render(template: &str, values: &Placeholders<'_>) -> Result<String> {
    let template = double_braces(template)?;
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(template.into_owned());
    }
    let mut env = Environment::new();
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.render_str(&template, values)
        .map_err(|err| PipelineError::usage(format!("render '{template}': {err}")).into())
}

fn double_braces(template: &str) -> Result<Cow<'_, str>> {
    if !template.contains('{') {
        return Ok(Cow::Borrowed(template));
    }
    let re = Regex::new(r"\{\{.*?\}\}|\{(\w+)\}").context("compile placeholder pattern")?;
    let rendered = re.replace_all(template, |caps: &Captures<'_>| match caps.get(1) {
        Some(name) if NAMES.contains(&name.as_str()) => format!("{{{{ {} }}}}", name.as_str()),
        _ => caps[0].to_string(),
    });
    Ok(Cow::Owned(rendered.into_owned()))
}
