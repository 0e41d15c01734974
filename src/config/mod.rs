//! Configuration management

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::remote::{RemoteSettings, DEFAULT_TEMPLATE};

#[derive(Debug, Deserialize)]
pub struct Config {
    /// API listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default)]
    pub foobar: Option<FoobarConfig>,
}

fn default_port() -> u16 {
    8089
}

fn default_poll_interval() -> u64 {
    5
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    /// The validated player section; a bridge without a player host is useless
    pub fn foobar(&self) -> Result<&FoobarConfig> {
        let foobar = self
            .foobar
            .as_ref()
            .ok_or_else(|| anyhow!("foobar.host is required (set FBB_FOOBAR__HOST or FOOBAR_HOST)"))?;

        if foobar.timeout == 0 {
            bail!("foobar.timeout must be at least 1 second");
        }
        if foobar.volume_step <= 0 {
            bail!("foobar.volume_step must be positive, got {}", foobar.volume_step);
        }
        Ok(foobar)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoobarConfig {
    pub host: String,
    #[serde(default = "default_foobar_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_volume_step")]
    pub volume_step: i64,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_template")]
    pub template: String,
    pub turn_on_action: Option<ActionConfig>,
    pub turn_off_action: Option<ActionConfig>,
}

fn default_foobar_port() -> u16 {
    8888
}

fn default_timeout() -> u64 {
    3
}

fn default_volume_step() -> i64 {
    5
}

fn default_name() -> String {
    crate::adapters::foobar::DEFAULT_NAME.to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl FoobarConfig {
    pub fn remote_settings(&self) -> RemoteSettings {
        RemoteSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone().filter(|u| !u.is_empty()),
            password: self.password.clone(),
            timeout: Duration::from_secs(self.timeout),
            template: self.template.clone(),
        }
    }
}

/// External turn-on / turn-off handler
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Run a local program with FOOBAR_ENTITY_ID set
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// POST `{"entity_id": ...}` to a URL
    Webhook { url: String },
}

/// Get config directory (XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FBB_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/foobar-bridge");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("foobar-bridge");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/foobar-bridge");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("foobar-bridge");
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("port", default_port() as i64)?
        .set_default("poll_interval", default_poll_interval() as i64)?
        // config.toml / config.json / config.yaml, if present
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // FBB_PORT, FBB_FOOBAR__HOST, etc.
        .add_source(
            ::config::Environment::with_prefix("FBB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Explicit precedence: FBB_PORT > PORT > config > default
    if let Ok(port) = std::env::var("FBB_PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    } else if let Ok(port) = std::env::var("PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    }

    // Short-form player address
    if let Ok(host) = std::env::var("FOOBAR_HOST") {
        builder = builder.set_override("foobar.host", host)?;
    }
    if let Ok(port) = std::env::var("FOOBAR_PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("foobar.port", port_num as i64)?;
        }
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
