//! Application configuration structure
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Deployment-specific values, fixed at startup and shared read-only with
/// every consumer. The serialized field names are the contract the API
/// clients rely on, so the renames below are load-bearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub production: bool,
    pub api_server_url: String,
    pub auth0: Auth0Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth0Config {
    /// Identity-provider domain, e.g. `tenant.us.auth0.com`.
    pub url: String,
    /// Identifier of the protected resource tokens are scoped to.
    pub audience: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            production: false,
            api_server_url: "http://127.0.0.1:5000".to_string(),
            auth0: Auth0Config::default(),
        }
    }
}

impl Default for Auth0Config {
    fn default() -> Self {
        // Placeholders, replaced per deployment via the environment.
        Self {
            url: "dev-coffee-shop.us.auth0.com".to_string(),
            audience: "coffee_shop".to_string(),
            client_id: "REPLACE_WITH_AUTH0_CLIENT_ID".to_string(),
            callback_url: "http://localhost:8100".to_string(),
        }
    }
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with per-deployment overrides. The lookup is
    /// injected so tests never touch process globals.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = Self::default();
        if let Some(v) = lookup("PRODUCTION") {
            env.production = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("API_SERVER_URL") {
            env.api_server_url = v;
        }
        if let Some(v) = lookup("AUTH0_DOMAIN") {
            env.auth0.url = v;
        }
        if let Some(v) = lookup("API_AUDIENCE") {
            env.auth0.audience = v;
        }
        if let Some(v) = lookup("AUTH0_CLIENT_ID") {
            env.auth0.client_id = v;
        }
        if let Some(v) = lookup("AUTH0_CALLBACK_URL") {
            env.auth0.callback_url = v;
        }
        env
    }

    /// Every field must be non-empty for the configuration to be usable.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("apiServerUrl", &self.api_server_url),
            ("auth0.url", &self.auth0.url),
            ("auth0.audience", &self.auth0.audience),
            ("auth0.clientId", &self.auth0.client_id),
            ("auth0.callbackURL", &self.auth0.callback_url),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                bail!("{name} must not be empty");
            }
        }
        Ok(())
    }

    /// Bind address derived from `apiServerUrl`: the server listens on the
    /// host and port its clients are configured to call.
    pub fn listen_addr(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.api_server_url)
            .with_context(|| format!("Invalid apiServerUrl: {}", self.api_server_url))?;
        let host = url.host_str().context("apiServerUrl has no host")?;
        let port = url
            .port_or_known_default()
            .context("apiServerUrl has no port")?;
        Ok(format!("{host}:{port}"))
    }
}

impl Auth0Config {
    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.url)
    }

    /// Token issuer, with the trailing slash Auth0 puts in the `iss` claim.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.url)
    }

    /// Implicit-flow login URL the client opens to obtain an access token.
    pub fn authorize_url(&self) -> String {
        format!(
            "https://{}/authorize?audience={}&response_type=token&client_id={}&redirect_uri={}",
            self.url, self.audience, self.client_id, self.callback_url
        )
    }
}
