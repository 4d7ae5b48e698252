use std::time::Duration;

use reqwest::{Client, Proxy};

use crate::config::Config;
use crate::core::error::{ChartServerError, ChartServerResult};

/// Upper bound on establishing a connection, within the overall request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the reqwest client shared by all chart requests
pub fn build_client(config: &Config) -> ChartServerResult<Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
        .user_agent(config.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = Proxy::all(proxy_url).map_err(|e| ChartServerError::Client {
            message: format!("invalid proxy {}: {}", proxy_url, e),
        })?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| ChartServerError::Client {
        message: e.to_string(),
    })
}
