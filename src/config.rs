//! Configuration module for uptrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "uptrail.db")
    pub db_path: String,
    /// Heartbeats older than this many days are deleted (default: 180)
    pub keep_days: u32,
    /// Notifications are posted here when set; otherwise they are logged.
    pub webhook_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "uptrail.db".to_string(),
            keep_days: 180,
            webhook_url: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT`: HTTP port (default: 8080)
    /// - `UPTRAIL_DB_PATH`: Database file path (default: "uptrail.db")
    /// - `UPTRAIL_KEEP_DAYS`: Heartbeat retention in days (default: 180)
    /// - `UPTRAIL_WEBHOOK_URL`: Notification webhook (default: unset)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port_str) = lookup("UPTRAIL_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Some(db_path) = lookup("UPTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(days_str) = lookup("UPTRAIL_KEEP_DAYS") {
            match days_str.parse::<u32>() {
                Ok(days) if days > 0 => cfg.keep_days = days,
                _ => tracing::warn!("Ignoring invalid UPTRAIL_KEEP_DAYS: {}", days_str),
            }
        }

        cfg.webhook_url = lookup("UPTRAIL_WEBHOOK_URL").filter(|url| !url.trim().is_empty());

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "uptrail.db");
        assert_eq!(cfg.keep_days, 180);
        assert!(cfg.webhook_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("UPTRAIL_HTTP_PORT", "9090"),
            ("UPTRAIL_DB_PATH", "/tmp/u.db"),
            ("UPTRAIL_KEEP_DAYS", "0"),
            ("UPTRAIL_WEBHOOK_URL", "http://hooks.local/x"),
        ]
        .into_iter()
        .collect();
        let cfg = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.db_path, "/tmp/u.db");
        // zero days is rejected
        assert_eq!(cfg.keep_days, 180);
        assert_eq!(cfg.webhook_url.as_deref(), Some("http://hooks.local/x"));
    }
}
