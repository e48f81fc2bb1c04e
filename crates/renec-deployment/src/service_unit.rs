use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use thiserror::Error;

pub const START_COMMAND_PLACEHOLDER: &str = "start_command";
pub const VALIDATOR_SERVICE: &str = "renec";
pub const SYS_TUNER_SERVICE: &str = "renec-sys-tuner";
pub const SYS_INFO_SERVICE: &str = "renec-sys-info";

const ALLOWED_PLACEHOLDERS: [&str; 1] = [START_COMMAND_PLACEHOLDER];

const VALIDATOR_TEMPLATE_FILE: &str = "renec.service.j2";
const SYS_TUNER_TEMPLATE_FILE: &str = "renec-sys-tuner.service.j2";
const SYS_INFO_TEMPLATE_FILE: &str = "renec-sys-info.service.j2";

const EMBEDDED_VALIDATOR_TEMPLATE: &str = include_str!("../templates/renec.service.j2");
const EMBEDDED_SYS_TUNER_TEMPLATE: &str = include_str!("../templates/renec-sys-tuner.service.j2");
const EMBEDDED_SYS_INFO_TEMPLATE: &str = include_str!("../templates/renec-sys-info.service.j2");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read unit template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unit template '{template}' references unsupported placeholder '{placeholder}'")]
    UnsupportedPlaceholder {
        template: String,
        placeholder: String,
    },
    #[error("unit template '{template}' was given unsupported substitution '{name}'")]
    UnsupportedSubstitution { template: String, name: String },
    #[error("failed to render unit template '{template}': {source}")]
    Template {
        template: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Renders `template` with named substitutions. Only `start_command` is a
/// valid name, both in the template and in `substitutions`.
pub fn render_unit_template(
    name: &str,
    template: &str,
    substitutions: &BTreeMap<&str, String>,
) -> Result<String, RenderError> {
    for key in substitutions.keys() {
        if !ALLOWED_PLACEHOLDERS.contains(key) {
            return Err(RenderError::UnsupportedSubstitution {
                template: name.to_string(),
                name: (*key).to_string(),
            });
        }
    }

    let template_error = |source: minijinja::Error| RenderError::Template {
        template: name.to_string(),
        source,
    };
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_template(name, template).map_err(template_error)?;
    let compiled = env.get_template(name).map_err(template_error)?;

    let mut placeholders: Vec<String> = compiled.undeclared_variables(false).into_iter().collect();
    placeholders.sort();
    if let Some(unsupported) = placeholders
        .into_iter()
        .find(|placeholder| !ALLOWED_PLACEHOLDERS.contains(&placeholder.as_str()))
    {
        return Err(RenderError::UnsupportedPlaceholder {
            template: name.to_string(),
            placeholder: unsupported,
        });
    }

    compiled.render(substitutions).map_err(template_error)
}

/// One unit to install: name, command and the template it is rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnitSpec {
    pub service_name: String,
    pub start_command: String,
    pub template_source: String,
}

impl ServiceUnitSpec {
    pub fn unit_file_name(&self) -> String {
        unit_file_name(&self.service_name)
    }

    pub fn render(&self) -> Result<String, RenderError> {
        let substitutions =
            BTreeMap::from([(START_COMMAND_PLACEHOLDER, self.start_command.clone())]);
        render_unit_template(&self.unit_file_name(), &self.template_source, &substitutions)
    }
}

pub fn unit_file_name(service_name: &str) -> String {
    format!("{service_name}.service")
}

/// Template sources for the three units a validator host carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplates {
    pub validator: String,
    pub sys_tuner: String,
    pub sys_info: String,
}

impl UnitTemplates {
    pub fn embedded() -> Self {
        Self {
            validator: EMBEDDED_VALIDATOR_TEMPLATE.to_string(),
            sys_tuner: EMBEDDED_SYS_TUNER_TEMPLATE.to_string(),
            sys_info: EMBEDDED_SYS_INFO_TEMPLATE.to_string(),
        }
    }

    /// Templates found in `dir` override the embedded ones file by file.
    pub fn load(dir: Option<&Path>) -> Result<Self, RenderError> {
        let Some(dir) = dir else {
            return Ok(Self::embedded());
        };
        Ok(Self {
            validator: load_override(dir, VALIDATOR_TEMPLATE_FILE, EMBEDDED_VALIDATOR_TEMPLATE)?,
            sys_tuner: load_override(dir, SYS_TUNER_TEMPLATE_FILE, EMBEDDED_SYS_TUNER_TEMPLATE)?,
            sys_info: load_override(dir, SYS_INFO_TEMPLATE_FILE, EMBEDDED_SYS_INFO_TEMPLATE)?,
        })
    }
}

fn load_override(dir: &Path, file_name: &str, embedded: &str) -> Result<String, RenderError> {
    let path = dir.join(file_name);
    if !path.is_file() {
        return Ok(embedded.to_string());
    }
    tracing::debug!(path = %path.display(), "loading unit template override");
    std::fs::read_to_string(&path).map_err(|source| RenderError::Read { path, source })
}
