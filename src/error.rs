use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VmAgentError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {command}")]
    #[diagnostic(help("is `{command}` installed and on PATH? set [tools] in vmagent.toml to override"))]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template {template}: {message}")]
    Template { template: String, message: String },
}
