// bndl-net/src/api.rs

use bndl_common::cache::{Cache, FORMULA_CACHE_FILE};
use bndl_common::config::Config;
use bndl_common::error::{BndlError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use tracing::{debug, error};

const USER_AGENT_STRING: &str = concat!("bndl/", env!("CARGO_PKG_VERSION"), " (Rust)");

fn build_api_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &config.github_api_token {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                debug!("Adding API token to request headers.");
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => error!("Failed to parse API token into header value: {}", e),
        }
    }

    Ok(Client::builder()
        .user_agent(USER_AGENT_STRING)
        .default_headers(headers)
        .build()?)
}

async fn fetch_raw_formulae_json(config: &Config, endpoint: &str) -> Result<String> {
    let url = format!("{}/{endpoint}", config.api_base_url);
    debug!("Fetching data from formulae API: {}", url);

    let client = build_api_client(config)?;
    let response = client.get(&url).send().await.map_err(|e| {
        error!("HTTP request failed for {}: {}", url, e);
        BndlError::from(e)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("(Failed to read response body: {e})"));
        error!(
            "HTTP request to {} returned non-success status: {}",
            url, status
        );
        return Err(BndlError::Api(format!(
            "HTTP status {status} from {url}. Response body: {body}"
        )));
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        error!("Response body for {} was empty.", url);
        return Err(BndlError::Api(format!(
            "Empty response body received from {url}"
        )));
    }
    Ok(body)
}

/// Fetch all formulas from the formulae API.
pub async fn fetch_all_formulas(config: &Config) -> Result<String> {
    fetch_raw_formulae_json(config, FORMULA_CACHE_FILE).await
}

/// Refreshes the cached `formula.json`.
pub async fn update_formula_cache(config: &Config, cache: &Cache) -> Result<()> {
    let raw_data = fetch_all_formulas(config).await?;
    cache.store_raw(FORMULA_CACHE_FILE, &raw_data)?;
    debug!(
        "Cached {} bytes of formula data in {}",
        raw_data.len(),
        cache.get_dir().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str, cache_dir: &Path, token: Option<&str>) -> Config {
        Config {
            prefix: cache_dir.join("prefix"),
            api_base_url: base.to_string(),
            cache_dir: cache_dir.to_path_buf(),
            home: cache_dir.to_path_buf(),
            github_api_token: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn update_stores_formula_json_in_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/formula.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"name":"jq"}]"#))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.uri(), dir.path(), None);
        let cache = Cache::new(&config).unwrap();

        update_formula_cache(&config, &cache).await.unwrap();
        assert_eq!(
            cache.load_raw(FORMULA_CACHE_FILE).unwrap(),
            r#"[{"name":"jq"}]"#
        );
    }

    #[tokio::test]
    async fn token_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/formula.json"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.uri(), dir.path(), Some("s3cret"));
        assert_eq!(fetch_all_formulas(&config).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/formula.json"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.uri(), dir.path(), None);
        match fetch_all_formulas(&config).await.unwrap_err() {
            BndlError::Api(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("maintenance"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/formula.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.uri(), dir.path(), None);
        let cache = Cache::new(&config).unwrap();
        assert!(matches!(
            update_formula_cache(&config, &cache).await,
            Err(BndlError::Api(_))
        ));
        assert!(!cache.exists(FORMULA_CACHE_FILE));
    }
}
