use std::fmt;
use std::fs;
use std::time::Duration;

/// Which wire protocol new connections speak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    /// Pass bytes through untouched
    Raw,
    /// RFC 854 telnet with option negotiation and line buffering
    Telnet,
}

impl ProtocolMode {
    /// Protocol-table name for this mode
    pub fn name(self) -> &'static str {
        match self {
            ProtocolMode::Raw => "raw",
            ProtocolMode::Telnet => "telnet",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeaportConfig {
    pub server: ServerConfig,
    pub buffers: BufferConfig,
    pub timeouts: TimeoutConfig,
    pub policy: PolicyConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub mode: ProtocolMode,
}

#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Bytes requested from the socket per read attempt
    pub recv_buffer_size: usize,
    /// Longest line buffered before the client gets a notice and the
    /// buffer is cleared
    pub max_line_length: usize,
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Connections idle longer than this are closed; zero disables
    pub idle_timeout: Duration,
    /// Upper bound on one readiness wait, so periodic work always runs
    pub poll_interval: Duration,
    /// Pre-negotiation window for legacy policy-file probes; zero disables
    pub grace_window: Duration,
}

/// Legacy cross-domain policy support (old Flash-era clients probe with a
/// literal request string before speaking any real protocol)
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub request: String,
    pub response: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub welcome: String,
}

impl Default for SeaportConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 4000,
                mode: ProtocolMode::Telnet,
            },
            buffers: BufferConfig {
                recv_buffer_size: 2048,
                max_line_length: 1024,
            },
            timeouts: TimeoutConfig {
                idle_timeout: Duration::from_secs(1800), // 30 minutes
                poll_interval: Duration::from_millis(100),
                grace_window: Duration::ZERO, // disabled
            },
            policy: PolicyConfig {
                request: "<policy-file-request/>".to_string(),
                response: concat!(
                    "<?xml version=\"1.0\"?>",
                    "<cross-domain-policy>",
                    "<allow-access-from domain=\"*\" to-ports=\"*\" />",
                    "</cross-domain-policy>\0"
                )
                .to_string(),
            },
            service: ServiceConfig {
                name: "Seaport".to_string(),
                welcome: "Welcome aboard. Type something and press enter.".to_string(),
            },
        }
    }
}

impl SeaportConfig {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_config(&content),
            Err(_) => {
                // Create default config file if it doesn't exist
                let default_config = Self::default();
                let config_content = default_config.to_config_file_format();
                if let Err(e) = fs::write(path, config_content) {
                    log::warn!("could not create default config file: {}", e);
                }
                Ok(default_config)
            }
        }
    }

    fn parse_config(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Handle sections
            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].to_string();
                continue;
            }

            // Handle key-value pairs
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim().trim_matches('"');

                match current_section.as_str() {
                    "server" => config.parse_server_config(key, value)?,
                    "buffers" => config.parse_buffer_config(key, value)?,
                    "timeouts" => config.parse_timeout_config(key, value)?,
                    "policy" => config.parse_policy_config(key, value)?,
                    "service" => config.parse_service_config(key, value)?,
                    _ => return Err(ConfigError::UnknownSection(current_section.clone())),
                }
            }
        }

        Ok(config)
    }

    fn parse_server_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "bind_address" => {
                self.server.bind_address = value.to_string();
            }
            "port" => {
                self.server.port = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            "mode" => {
                self.server.mode = match value {
                    "raw" => ProtocolMode::Raw,
                    "telnet" => ProtocolMode::Telnet,
                    _ => {
                        return Err(ConfigError::InvalidValue(
                            key.to_string(),
                            value.to_string(),
                        ));
                    }
                };
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_buffer_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "recv_buffer_size" => {
                self.buffers.recv_buffer_size = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            "max_line_length" => {
                self.buffers.max_line_length = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_timeout_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let number: u64 = value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;

        match key {
            // Seconds; zero disables
            "idle_timeout" => self.timeouts.idle_timeout = Duration::from_secs(number),
            // Milliseconds
            "poll_interval_ms" => self.timeouts.poll_interval = Duration::from_millis(number),
            // Milliseconds; zero disables
            "grace_window_ms" => self.timeouts.grace_window = Duration::from_millis(number),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_policy_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "request" => self.policy.request = value.to_string(),
            "response" => self.policy.response = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_service_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "name" => self.service.name = value.to_string(),
            "welcome" => self.service.welcome = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn to_config_file_format(&self) -> String {
        format!(
            r#"# Seaport Configuration File
# Lines starting with # are comments

[server]
# Network configuration
bind_address = "{}"
port = {}
# Wire protocol for new connections: "telnet" or "raw"
mode = "{}"

[buffers]
# Bytes requested from a socket per read
recv_buffer_size = {}
# Longest buffered input line before the client is told off
max_line_length = {}

[timeouts]
# Idle timeout in seconds; 0 disables
idle_timeout = {}
# Readiness-wait bound in milliseconds
poll_interval_ms = {}
# Legacy policy-probe window in milliseconds; 0 disables
grace_window_ms = {}

[policy]
# Legacy cross-domain policy probe (pre-websocket Flash clients)
request = "{}"

[service]
# Demo chat service branding
name = "{}"
welcome = "{}"
"#,
            self.server.bind_address,
            self.server.port,
            self.server.mode.name(),
            self.buffers.recv_buffer_size,
            self.buffers.max_line_length,
            self.timeouts.idle_timeout.as_secs(),
            self.timeouts.poll_interval.as_millis(),
            self.timeouts.grace_window.as_millis(),
            self.policy.request,
            self.service.name,
            self.service.welcome,
        )
    }
}

/// Errors raised while loading or parsing the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownSection(String),
    UnknownKey(String),
    InvalidValue(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownSection(section) => write!(f, "Unknown section: [{}]", section),
            ConfigError::UnknownKey(key) => write!(f, "Unknown key: {}", key),
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
