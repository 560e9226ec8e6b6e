use serde::Deserialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::{MailError, Result};

pub const ENV_SMTP_SERVER: &str = "EMAIL_SMTP_SERVER";
pub const ENV_SMTP_PORT: &str = "EMAIL_SMTP_PORT";
pub const ENV_SMTP_STARTTLS: &str = "EMAIL_SMTP_STARTTLS";
pub const ENV_IMAP_SERVER: &str = "EMAIL_IMAP_SERVER";
pub const ENV_IMAP_PORT: &str = "EMAIL_IMAP_PORT";
pub const ENV_IMAP_STARTTLS: &str = "EMAIL_IMAP_STARTTLS";
pub const ENV_USER: &str = "EMAIL_USER";
pub const ENV_PASS: &str = "EMAIL_PASS";

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
const DEFAULT_IMAP_PORT: u16 = 993;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub imap: ServerConfig,
    pub smtp: ServerConfig,
    pub account: Account,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub starttls: bool,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .finish()
    }
}

fn mask(s: &str) -> &'static str {
    if s.is_empty() { "" } else { "********" }
}

/// On-disk layout. Every key is optional; the environment fills the gaps.
#[derive(Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub imap: FileServer,
    pub smtp: FileServer,
    pub account: FileAccount,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct FileServer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub starttls: Option<bool>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct FileAccount {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| MailError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&data)
            .map_err(|e| MailError::Config(format!("invalid {}: {e}", path.display())))
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailcli").join("config.toml"))
    }

    /// Loads the configuration from `path` (or the default location, when it
    /// exists) overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(FileConfig::read(p)?),
            None => match Self::default_path() {
                Some(p) if p.exists() => Some(FileConfig::read(&p)?),
                _ => None,
            },
        };

        Self::from_sources(file.unwrap_or_default(), |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let smtp = ServerConfig {
            host: var(ENV_SMTP_SERVER)
                .or(file.smtp.host)
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: match var(ENV_SMTP_PORT) {
                Some(v) => parse_port(ENV_SMTP_PORT, &v)?,
                None => file.smtp.port.unwrap_or(DEFAULT_SMTP_PORT),
            },
            starttls: match var(ENV_SMTP_STARTTLS) {
                Some(v) => parse_bool(ENV_SMTP_STARTTLS, &v)?,
                None => file.smtp.starttls.unwrap_or(true),
            },
        };

        let imap = ServerConfig {
            host: var(ENV_IMAP_SERVER)
                .or(file.imap.host)
                .unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string()),
            port: match var(ENV_IMAP_PORT) {
                Some(v) => parse_port(ENV_IMAP_PORT, &v)?,
                None => file.imap.port.unwrap_or(DEFAULT_IMAP_PORT),
            },
            starttls: match var(ENV_IMAP_STARTTLS) {
                Some(v) => parse_bool(ENV_IMAP_STARTTLS, &v)?,
                None => file.imap.starttls.unwrap_or(false),
            },
        };

        let present = |v: &String| !v.trim().is_empty();
        let username = var(ENV_USER).or(file.account.username.filter(present));
        let password = var(ENV_PASS).or(file.account.password.filter(present));

        let (Some(username), Some(password)) = (username, password) else {
            return Err(MailError::Config(format!(
                "{ENV_USER} and {ENV_PASS} environment variables must be set."
            )));
        };

        let cfg = Config {
            imap,
            smtp,
            account: Account {
                username,
                password,
            },
        };
        debug!(?cfg, "configuration loaded");
        Ok(cfg)
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| MailError::Config(format!("{key} must be a port number, got {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(MailError::Config(format!("{key} must be true or false, got {value:?}"))),
    }
}
