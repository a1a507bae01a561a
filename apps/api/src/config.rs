use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Public origin of the frontend, used for verification links and
    /// post-auth redirects.
    pub app_base_url: String,
    /// Public origin of this API, used to build federated callback URLs.
    pub api_base_url: String,

    /// HS256 key for session tokens and for the perimeter/state cookie MACs.
    pub session_secret: String,
    pub session_ttl_hours: i64,
    /// When false the session issuer skips the per-request store lookup and
    /// serves the signed claims as-is.
    pub with_storage_enrichment: bool,

    /// Static shared credential for the perimeter gate.
    pub perimeter_user: String,
    pub perimeter_password: String,

    /// Production toggles the `Secure` attribute on minted cookies.
    pub production: bool,

    pub smtp: Option<SmtpConfig>,
    pub google: Option<OauthClient>,
    pub github: Option<OauthClient>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct OauthClient {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            session_secret: require_env("SESSION_SECRET")?,
            session_ttl_hours: std::env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| "720".to_string())
                .parse::<i64>()
                .context("SESSION_TTL_HOURS must be a number of hours")?,
            with_storage_enrichment: std::env::var("WITH_STORAGE_ENRICHMENT")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            perimeter_user: require_env("PERIMETER_USER")?,
            perimeter_password: require_env("PERIMETER_PASSWORD")?,
            production: std::env::var("ENVIRONMENT")
                .map(|v| v == "production")
                .unwrap_or(false),
            smtp: smtp_from_env()?,
            google: oauth_from_env("GOOGLE")?,
            github: oauth_from_env("GITHUB")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// SMTP is optional; without it verification mails are logged instead of sent.
fn smtp_from_env() -> Result<Option<SmtpConfig>> {
    let host = match std::env::var("SMTP_HOST") {
        Ok(h) => h,
        Err(_) => return Ok(None),
    };
    Ok(Some(SmtpConfig {
        host,
        port: std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .context("SMTP_PORT must be a valid port number")?,
        username: require_env("SMTP_USERNAME")?,
        password: require_env("SMTP_PASSWORD")?,
        from: require_env("SMTP_FROM")?,
    }))
}

/// A federated provider is only wired up when both halves of its client
/// credential are present.
fn oauth_from_env(prefix: &str) -> Result<Option<OauthClient>> {
    let id = std::env::var(format!("{prefix}_CLIENT_ID")).ok();
    let secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok();
    match (id, secret) {
        (Some(client_id), Some(client_secret)) => Ok(Some(OauthClient {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        _ => anyhow::bail!("{prefix}_CLIENT_ID and {prefix}_CLIENT_SECRET must be set together"),
    }
}
