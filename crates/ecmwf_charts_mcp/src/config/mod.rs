use std::time::Duration;

use url::Url;

use crate::errors::{StartupError, StartupResult};

pub const DEFAULT_BASE_URL: &str = "https://charts.ecmwf.int/opencharts-api/v1/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Configuration derived from CLI arguments and environment
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenCharts API root, always ending with `/`
    pub base_url: Url,
    /// Bound on every outbound request
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy_url: Option<String>,
}

impl Config {
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: Option<String>,
        proxy_url: Option<String>,
    ) -> StartupResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: validate_timeout(timeout_secs)?,
            user_agent: user_agent.unwrap_or_else(default_user_agent),
            proxy_url: parse_proxy_url(proxy_url)?,
        })
    }
}

pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Parse the API root; a missing trailing slash would make relative joins drop the last segment
fn parse_base_url(raw: &str) -> StartupResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let url = Url::parse(&with_slash).map_err(|e| StartupError::InvalidBaseUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(StartupError::InvalidBaseUrl {
            url: raw.to_string(),
            message: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

fn parse_proxy_url(raw: Option<String>) -> StartupResult<Option<String>> {
    let Some(trimmed) = raw.map(|url| url.trim().to_string()).filter(|url| !url.is_empty()) else {
        return Ok(None);
    };

    Url::parse(&trimmed).map_err(|e| StartupError::InvalidProxy {
        url: trimmed.clone(),
        message: e.to_string(),
    })?;
    Ok(Some(trimmed))
}

fn validate_timeout(seconds: u64) -> StartupResult<Duration> {
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&seconds) {
        return Err(StartupError::InvalidTimeout {
            seconds,
            min: MIN_TIMEOUT_SECS,
            max: MAX_TIMEOUT_SECS,
        });
    }
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, None, None).unwrap();
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("mcp-server-ecmwf-charts/"));
        assert!(config.proxy_url.is_none());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = Config::new("http://localhost:8080/api/v1", 10, None, None).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8080/api/v1/");
        assert_eq!(
            config.base_url.join("products/x/").unwrap().as_str(),
            "http://localhost:8080/api/v1/products/x/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            Config::new("not a url", 10, None, None),
            Err(StartupError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            Config::new("ftp://charts.example/", 10, None, None),
            Err(StartupError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(matches!(
            Config::new(DEFAULT_BASE_URL, 0, None, None),
            Err(StartupError::InvalidTimeout { seconds: 0, .. })
        ));
        assert!(Config::new(DEFAULT_BASE_URL, 301, None, None).is_err());
        assert!(Config::new(DEFAULT_BASE_URL, 300, None, None).is_ok());
    }

    #[test]
    fn test_blank_proxy_is_ignored() {
        let config = Config::new(DEFAULT_BASE_URL, 30, None, Some("  ".to_string())).unwrap();
        assert!(config.proxy_url.is_none());
    }

    #[test]
    fn test_invalid_proxy() {
        assert!(matches!(
            Config::new(DEFAULT_BASE_URL, 30, None, Some("::not-a-proxy".to_string())),
            Err(StartupError::InvalidProxy { .. })
        ));
    }
}
