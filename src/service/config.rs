use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

pub const DEFAULT_PORT: u16 = 1988;
pub const DEFAULT_CONFIG_FILE: &str = "framecat.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the server role binds to. IPv4 any by default.
    pub bind_ip: String,
    pub port: u16,
    pub listen_backlog: u32,
    /// Upper bound on a single wait for the first connection, so a stop
    /// request is noticed while nobody connects.
    pub accept_poll_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            bind_ip: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            listen_backlog: 20,
            accept_poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Largest payload a received length prefix may announce.
    pub max_message_len: usize,
    /// Largest chunk read from local input and sent as one message.
    pub send_buffer_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            max_message_len: crate::network::DEFAULT_MAX_MESSAGE_LEN,
            send_buffer_size: crate::network::DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Directory for the hourly rolling log file; stderr only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "warn".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    pub network: NetworkConfig,
    pub protocol: ProtocolConfig,
    pub log: LogConfig,
}

impl RelayConfig {
    /// Layers the built-in defaults, an optional config file and the command
    /// line port override, in that order.
    ///
    /// An explicitly named file must exist; the default `framecat.toml` is
    /// only read when present.
    pub fn set_up_config<P: AsRef<Path>>(
        path: Option<P>,
        port_override: Option<u16>,
    ) -> AppResult<RelayConfig> {
        let (path_str, required) = match &path {
            Some(path) => (
                path.as_ref()
                    .to_str()
                    .ok_or(AppError::InvalidValue(format!(
                        "config file path: {}",
                        path.as_ref().to_string_lossy()
                    )))?
                    .to_string(),
                true,
            ),
            None => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&RelayConfig::default())?)
            .add_source(config::File::with_name(&path_str).required(required));
        if let Some(port) = port_override {
            builder = builder.set_override("network.port", i64::from(port))?;
        }

        let relay_config: RelayConfig = builder.build()?.try_deserialize()?;
        relay_config.validate()?;
        Ok(relay_config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let protocol = &self.protocol;
        if protocol.max_message_len == 0 || protocol.max_message_len > i32::MAX as usize {
            return Err(AppError::InvalidValue(format!(
                "protocol.max_message_len {} out of range",
                protocol.max_message_len
            )));
        }
        if protocol.send_buffer_size == 0 {
            return Err(AppError::InvalidValue(
                "protocol.send_buffer_size must be greater than 0".to_string(),
            ));
        }
        // the peer runs with the same limits, so anything we send must fit
        // in what we would accept ourselves
        if protocol.send_buffer_size > protocol.max_message_len {
            return Err(AppError::InvalidValue(format!(
                "protocol.send_buffer_size {} exceeds protocol.max_message_len {}",
                protocol.send_buffer_size, protocol.max_message_len
            )));
        }
        if self.network.listen_backlog == 0 {
            return Err(AppError::InvalidValue(
                "network.listen_backlog must be greater than 0".to_string(),
            ));
        }
        if self.network.accept_poll_interval_ms == 0 {
            return Err(AppError::InvalidValue(
                "network.accept_poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
