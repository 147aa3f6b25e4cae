use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Sliding-window caps, counted per caller.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub general: usize,
    pub auth: usize,
    pub contact: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            general: 100,
            auth: 5,
            contact: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub frontend_url: Option<String>,
    pub static_dir: String,
    pub contact_list_requires_auth: bool,
    pub trust_proxy: bool,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "blogcraft".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "blogcraft-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24),
        };
        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", defaults.window_secs),
            general: env_parse("RATE_LIMIT_GENERAL", defaults.general),
            auth: env_parse("RATE_LIMIT_AUTH", defaults.auth),
            contact: env_parse("RATE_LIMIT_CONTACT", defaults.contact),
        };
        Ok(Self {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 20),
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 5000),
            frontend_url: std::env::var("FRONTEND_URL").ok().filter(|v| !v.is_empty()),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "dist".into()),
            contact_list_requires_auth: env_parse("CONTACT_LIST_REQUIRES_AUTH", false),
            trust_proxy: env_parse("TRUST_PROXY", false),
            rate_limit,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
