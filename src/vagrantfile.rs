//! Vagrantfile rendering with Tera (Jinja2-style templates).

use std::error::Error;
use std::path::{Path, PathBuf};

use tera::{Context, Tera};

use crate::error::VmAgentError;

/// Built-in template, compiled into the binary.
pub static DEFAULT_TEMPLATE: &str = include_str!("templates/Vagrantfile.j2");

const TEMPLATE_NAME: &str = "vagrantfile";

/// Values substituted into the Vagrantfile template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VagrantfileContext {
    pub name: String,
    pub number: u32,
    pub memory: u32,
    pub cpus: u32,
}

impl VagrantfileContext {
    fn to_tera(&self) -> Context {
        let mut ctx = Context::new();
        ctx.insert("name", &self.name);
        ctx.insert("number", &self.number);
        ctx.insert("memory", &self.memory);
        ctx.insert("cpus", &self.cpus);
        ctx
    }
}

pub struct VagrantfileRenderer {
    tera: Tera,
    source: String,
}

impl VagrantfileRenderer {
    pub fn from_embedded() -> Result<Self, VmAgentError> {
        Self::from_source(DEFAULT_TEMPLATE, "(embedded)".into())
    }

    /// Load a user-supplied template from disk.
    pub fn from_file(path: &Path) -> Result<Self, VmAgentError> {
        let content = std::fs::read_to_string(path).map_err(|source| VmAgentError::Io {
            context: format!("reading Vagrantfile template {}", path.display()),
            source,
        })?;
        Self::from_source(&content, path.display().to_string())
    }

    /// Built-in template unless `custom` is given.
    pub fn load(custom: Option<&Path>) -> Result<Self, VmAgentError> {
        match custom {
            Some(path) => Self::from_file(path),
            None => Self::from_embedded(),
        }
    }

    fn from_source(content: &str, source: String) -> Result<Self, VmAgentError> {
        let mut tera = Tera::default();
        // Vagrantfiles are Ruby, never HTML
        tera.autoescape_on(vec![]);
        tera.add_raw_template(TEMPLATE_NAME, content)
            .map_err(|e| VmAgentError::Template {
                template: source.clone(),
                message: render_chain(&e),
            })?;
        tracing::debug!(template = %source, "loaded Vagrantfile template");
        Ok(Self { tera, source })
    }

    pub fn render(&self, ctx: &VagrantfileContext) -> Result<String, VmAgentError> {
        self.tera
            .render(TEMPLATE_NAME, &ctx.to_tera())
            .map_err(|e| VmAgentError::Template {
                template: self.source.clone(),
                message: render_chain(&e),
            })
    }

    /// Render and write to `output`, replacing any existing file.
    pub fn render_to_file(
        &self,
        ctx: &VagrantfileContext,
        output: &Path,
    ) -> Result<PathBuf, VmAgentError> {
        let rendered = self.render(ctx)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| VmAgentError::Io {
                context: format!("creating directory {}", parent.display()),
                source,
            })?;
        }

        std::fs::write(output, rendered).map_err(|source| VmAgentError::Io {
            context: format!("writing {}", output.display()),
            source,
        })?;

        tracing::info!(path = %output.display(), vms = ctx.number, "rendered Vagrantfile");
        Ok(output.to_path_buf())
    }
}

/// Tera hides the useful detail in the error's source chain.
fn render_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
