/// Notes API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Shared HS256 secret used to verify session tokens.
    pub jwt_secret: String,
    /// Redis connection string for the token denylist. When unset the
    /// denylist lives in process memory.
    pub redis_url: Option<String>,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Allowed CORS origin (`*` for any).
    pub frontend_url: String,
    /// Deployment environment name (`development`, `production`, ...).
    pub app_env: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            jwt_secret: required_var("JWT_SECRET"),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            frontend_url: std::env::var("FRONTEND_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "*".to_string()),
            app_env: std::env::var("APP_ENV")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "development".to_string()),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
