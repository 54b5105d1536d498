use std::fmt;
use std::time::Duration;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const REQUIRED_VARS: [&str; 4] = [
    "SHAREPOINT_SITE_ID",
    "SHAREPOINT_CLIENT_ID",
    "SHAREPOINT_CLIENT_SECRET",
    "SHAREPOINT_TENANT_ID",
];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// App registration used for the client-credentials grant.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
}

// Keep the secret out of logs and panic messages
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_id", &self.site_id)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub credentials: Credentials,
    pub graph_url: String,
    pub authority_url: String,
    pub http_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    // Testable inner function: accepts any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|var| get(*var).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |var: &str| get(var).unwrap_or_default();
        let credentials = Credentials {
            site_id: required("SHAREPOINT_SITE_ID"),
            client_id: required("SHAREPOINT_CLIENT_ID"),
            client_secret: required("SHAREPOINT_CLIENT_SECRET"),
            tenant_id: required("SHAREPOINT_TENANT_ID"),
        };

        let http_timeout = match get("SHAREPOINT_HTTP_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "SHAREPOINT_HTTP_TIMEOUT_SECS",
                        reason: format!("expected a positive number of seconds, got {raw:?}"),
                    })
                }
            },
        };

        Ok(Self {
            credentials,
            graph_url: base_url(get("SHAREPOINT_GRAPH_URL"), DEFAULT_GRAPH_URL),
            authority_url: base_url(get("SHAREPOINT_AUTHORITY_URL"), DEFAULT_AUTHORITY_URL),
            http_timeout,
        })
    }
}

fn base_url(value: Option<String>, default: &str) -> String {
    value
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
