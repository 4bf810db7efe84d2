use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

/// Transient failures (timeouts, 5xx, 429) are retried this many times.
const MAX_RETRIES: u32 = 3;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// HTTP client for market data requests, with exponential-backoff retries.
    pub fn create_client() -> ClientWithMiddleware {
        Self::create_client_with_timeout(Duration::from_secs(30))
    }

    pub fn create_client_with_timeout(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Appends `params` to `base_url` as a percent-encoded query string.
///
/// `reqwest-middleware` does not expose `.query()`, so the URL is built by hand.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return base_url.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k.as_ref()), encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base_url, separator, query)
}

/// RFC 3986 percent-encoding of everything but unreserved characters.
fn encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_encoding() {
        let url = build_url_with_query(
            "https://data.alpaca.markets/v2/stocks/bars",
            &[("symbols", "AAPL"), ("start", "2024-01-01T00:00:00+00:00")],
        );
        assert_eq!(
            url,
            "https://data.alpaca.markets/v2/stocks/bars?symbols=AAPL&start=2024-01-01T00%3A00%3A00%2B00%3A00"
        );
    }

    #[test]
    fn test_existing_query_is_extended() {
        let url = build_url_with_query("http://x/bars?feed=iex", &[("limit", "10")]);
        assert_eq!(url, "http://x/bars?feed=iex&limit=10");
    }

    #[test]
    fn test_no_params_leaves_url_untouched() {
        let params: [(&str, &str); 0] = [];
        assert_eq!(build_url_with_query("http://x", &params), "http://x");
    }
}
