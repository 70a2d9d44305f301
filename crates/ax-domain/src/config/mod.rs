mod audit;
mod channels;
mod delegation;
mod ipc;
mod llm;
mod sandbox;
mod scheduler;
mod server;
mod sessions;
mod taint;

pub use audit::*;
pub use channels::*;
pub use delegation::*;
pub use ipc::*;
pub use llm::*;
pub use sandbox::*;
pub use scheduler::*;
pub use server::*;
pub use sessions::*;
pub use taint::*;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub taint: TaintConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Sub-agent delegation limits, keyed by agent id.
    #[serde(default)]
    pub agents: HashMap<String, DelegationConfig>,
}

impl Config {
    /// Load from a TOML file, falling back to defaults if the file does not
    /// exist. An existing file with malformed TOML is an error.
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    /// Validate the configuration and return a list of issues. An empty
    /// vec means the config is safe to run with.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins".into(),
            });
        }

        if self.ipc.socket_path.as_os_str().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ipc.socket_path".into(),
                message: "socket_path must not be empty".into(),
            });
        }
        if self.ipc.max_frame_bytes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ipc.max_frame_bytes".into(),
                message: "max_frame_bytes must be greater than 0".into(),
            });
        }

        if self.sessions.max_turns == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sessions.max_turns".into(),
                message: "max_turns must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.taint.threshold_for(TaintProfile::Paranoid))
            || !(0.0..=1.0).contains(&self.taint.threshold_for(TaintProfile::Balanced))
            || !(0.0..=1.0).contains(&self.taint.threshold_for(TaintProfile::Yolo))
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "taint".into(),
                message: "taint thresholds must be within [0.0, 1.0]".into(),
            });
        }

        if self.sandbox.timeout_sec == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sandbox.timeout_sec".into(),
                message: "timeout_sec must be greater than 0".into(),
            });
        }
        if self.sandbox.command.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sandbox.command".into(),
                message: "command must not be empty".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!("duplicate provider id \"{}\"", provider.id),
                });
            }
        }
        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        for (agent_id, limits) in &self.agents {
            if limits.max_depth == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{agent_id}.max_depth"),
                    message: "max_depth must be greater than 0".into(),
                });
            }
            if limits.max_concurrent == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{agent_id}.max_concurrent"),
                    message: "max_concurrent must be greater than 0".into(),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                port: 8089,
                host: "127.0.0.1".into(),
                ..ServerConfig::default()
            },
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth_env: Some("OPENAI_API_KEY".into()),
                    default_model: None,
                }],
                ..LlmConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.cors.allowed_origins").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn no_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.providers.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn sandbox_empty_command_is_error() {
        let mut cfg = valid_config();
        cfg.sandbox.command.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "sandbox.command").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn load_or_default_missing_file_returns_default() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/ax.toml")).unwrap();
        assert_eq!(cfg.server.port, ServerConfig::default().port);
    }
}
