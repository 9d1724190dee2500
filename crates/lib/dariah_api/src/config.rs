//! API server configuration.

use std::str::FromStr;
use std::time::Duration;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Name of the cookie carrying the session token.
    pub session_cookie_name: String,
    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,
    /// Token bucket capacity per client IP.
    pub rate_limit_capacity: u32,
    /// Seconds to refill a full bucket.
    pub rate_limit_interval_secs: u64,
    /// Request header holding the client IP (first comma-separated entry wins).
    pub client_ip_header: String,
    /// Period of the expired-session and idle-bucket sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            pg_connection_url: "postgres://localhost:5432/dariah".into(),
            session_cookie_name: "dariah_session".into(),
            secure_cookies: false,
            rate_limit_capacity: 100,
            rate_limit_interval_secs: 1,
            client_ip_header: "x-forwarded-for".into(),
            sweep_interval_secs: 300,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                   | Default                             |
    /// |----------------------------|-------------------------------------|
    /// | `BIND_ADDR`                | `127.0.0.1:3100`                    |
    /// | `DATABASE_URL`             | `postgres://localhost:5432/dariah`  |
    /// | `SESSION_COOKIE_NAME`      | `dariah_session`                    |
    /// | `SECURE_COOKIES`           | `false`                             |
    /// | `RATE_LIMIT_CAPACITY`      | `100`                               |
    /// | `RATE_LIMIT_INTERVAL_SECS` | `1`                                 |
    /// | `CLIENT_IP_HEADER`         | `x-forwarded-for`                   |
    /// | `SWEEP_INTERVAL_SECS`      | `300`                               |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            pg_connection_url: env_or("DATABASE_URL", defaults.pg_connection_url),
            session_cookie_name: env_or("SESSION_COOKIE_NAME", defaults.session_cookie_name),
            secure_cookies: env_or("SECURE_COOKIES", defaults.secure_cookies),
            rate_limit_capacity: env_or("RATE_LIMIT_CAPACITY", defaults.rate_limit_capacity),
            rate_limit_interval_secs: env_or(
                "RATE_LIMIT_INTERVAL_SECS",
                defaults.rate_limit_interval_secs,
            ),
            client_ip_header: env_or("CLIENT_IP_HEADER", defaults.client_ip_header)
                .to_ascii_lowercase(),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
        }
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Parse `key` from the environment, falling back on absence or parse failure.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_key() {
        assert_eq!(env_or("DARIAH_TEST_SURELY_UNSET", 42u32), 42);
    }

    #[test]
    fn sweep_interval_is_never_zero() {
        let config = ApiConfig {
            sweep_interval_secs: 0,
            ..ApiConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
