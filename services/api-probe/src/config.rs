//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are loaded from API_ACCESS_TOKEN / API_REFRESH_TOKEN or from the
//! files named in `[credentials]`, never stored in the TOML directly.

use common::Secret;
use credential::Credential;
use serde::Deserialize;
use session_client::ClientConfig;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Where the initial credential comes from and where it is persisted
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(skip)]
    pub access_token: Option<Secret<String>>,
    #[serde(skip)]
    pub refresh_token: Option<Secret<String>>,
    /// File containing the access token (alternative to API_ACCESS_TOKEN)
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,
    /// File containing the refresh token (alternative to API_REFRESH_TOKEN)
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
    /// JSON file the credential store reads at startup and rewrites after
    /// every refresh. When it exists it wins over the token sources above.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Token resolution order, for each token:
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        let credentials = &mut config.credentials;
        credentials.access_token =
            resolve_token("API_ACCESS_TOKEN", credentials.access_token_file.as_deref())?;
        credentials.refresh_token =
            resolve_token("API_REFRESH_TOKEN", credentials.refresh_token_file.as_deref())?;

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let client = &self.client;
        if !client.base_url.starts_with("http://") && !client.base_url.starts_with("https://") {
            return Err(common::Error::invalid(
                "client.base_url",
                format!("must start with http:// or https://, got: {}", client.base_url),
            ));
        }
        if client.timeout_ms == 0 {
            return Err(common::Error::invalid(
                "client.timeout_ms",
                "must be greater than 0",
            ));
        }
        if client.refresh_timeout_ms == Some(0) {
            return Err(common::Error::invalid(
                "client.refresh_timeout_ms",
                "must be greater than 0 when set",
            ));
        }
        if !client.refresh_endpoint_path.starts_with('/') {
            return Err(common::Error::invalid(
                "client.refresh_endpoint_path",
                "must start with /",
            ));
        }
        Ok(())
    }

    /// Credential to seed the store with.
    ///
    /// Without an access token this only succeeds if a persisted credential
    /// file already exists, since the store will load that instead.
    pub fn initial_credential(&self) -> common::Result<Credential> {
        let credentials = &self.credentials;
        let refresh = credentials
            .refresh_token
            .as_ref()
            .map(|t| t.expose_str().to_owned());

        match &credentials.access_token {
            Some(access) => Ok(Credential::new(access.expose_str(), refresh)),
            None if credentials
                .credentials_path
                .as_deref()
                .is_some_and(Path::exists) =>
            {
                Ok(Credential::new("", refresh))
            }
            None => Err(common::Error::MissingCredential(
                "set API_ACCESS_TOKEN or credentials.access_token_file".into(),
            )),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-client.toml")
    }
}

/// Env var takes precedence over file. Empty or whitespace-only values count
/// as absent.
fn resolve_token(env_var: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(token) = std::env::var(env_var) {
        let token = token.trim().to_owned();
        if !token.is_empty() {
            return Ok(Some(Secret::new(token)));
        }
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let token = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    let token = token.trim().to_owned();
    Ok((!token.is_empty()).then(|| Secret::new(token)))
}
