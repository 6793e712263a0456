//! Timeout enforcement for outbound HTTP.
//!
//! Every source request carries a connect deadline and a whole-request
//! deadline. A hung upstream surfaces as a transport error once the request
//! deadline passes; nothing else bounds it.

use std::time::Duration;

use crate::config::schema::HttpConfig;

pub fn build_http_client(config: &HttpConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(build_http_client(&HttpConfig::default()).is_ok());
    }
}
