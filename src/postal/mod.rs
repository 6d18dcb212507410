use std::time::Duration;
use color_eyre::eyre::{bail, eyre};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info};
use reqwest::{Client, Url};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use crate::postal::model::DirectoryResponse;

pub mod model;

pub const BASE_URL: &str = "https://api.postalpincode.in";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const UA: &str = concat!("pincode-lookup/", env!("CARGO_PKG_VERSION"));

const LOOKUP_PATH: &str = "pincode";

/// Failures while talking to the postal directory.
///
/// A lookup that reaches the directory but matches nothing is not an error
/// here; it is a [`DirectoryResponse`] with a non-`Success` status.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("request to the postal directory failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("postal directory answered with HTTP {0}")]
    Status(u16),
    #[error("postal directory returned an empty payload")]
    EmptyPayload,
}

/// Something that can resolve a postal code into post office records
pub trait PostalDirectory {
    fn fetch<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<DirectoryResponse, DirectoryError>>;
}

/// Connection settings for [`PostalClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// applies to the whole request, connect through body
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: UA.to_string(),
        }
    }
}

/// HTTP client for the India Post pincode directory
pub struct PostalClient {
    client: Client,
    base_url: Url,
}

impl PostalClient {
    pub fn new(config: ClientConfig) -> color_eyre::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| eyre!("invalid base url [{}]: {}", config.base_url, e))?;
        if base_url.cannot_be_a_base() {
            bail!("base url [{}] cannot carry a lookup path", config.base_url);
        }
        Ok(
            Self {
                client: Client::builder()
                    .default_headers(Self::default_headers(&config.user_agent)?)
                    .timeout(config.timeout)
                    .build()?,
                base_url,
            }
        )
    }

    fn default_headers(user_agent: &str) -> color_eyre::Result<HeaderMap> {
        let mut map = HeaderMap::new();
        map.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
        Ok(map)
    }

    /// build `{base}/pincode/{code}`, the code is percent-encoded as a single segment
    fn endpoint(&self, code: &str) -> Url {
        let mut url = self.base_url.clone();
        // `new` only accepts base urls that can carry path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty()
                .push(LOOKUP_PATH)
                .push(code);
        }
        url
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn lookup(&self, code: &str) -> Result<DirectoryResponse, DirectoryError> {
        let url = self.endpoint(code);
        debug!("requesting [{}]", url);

        let resp = self.client
            .get(url)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        // the directory always answers with a one-element array
        let entries: Vec<DirectoryResponse> = resp.json().await?;
        let entry = entries.into_iter().next().ok_or(DirectoryError::EmptyPayload)?;
        info!("directory answered [{}] for [{}]: {}", entry.status(), code, entry.message().unwrap_or("-"));
        Ok(entry)
    }
}

impl PostalDirectory for PostalClient {
    fn fetch<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<DirectoryResponse, DirectoryError>> {
        self.lookup(code).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn spawn_directory(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: String) -> PostalClient {
        PostalClient::new(ClientConfig {
            base_url,
            ..Default::default()
        })
        .expect("client")
    }

    async fn echo_code(Path(code): Path<String>) -> Json<Value> {
        Json(json!([{
            "Message": "Number of pincode(s) found:1",
            "Status": "Success",
            "PostOffice": [
                { "Name": "Connaught Place", "Pincode": code, "District": "New Delhi", "State": "Delhi" }
            ]
        }]))
    }

    #[tokio::test]
    async fn fetch_decodes_first_entry() {
        let base = spawn_directory(Router::new().route("/pincode/:code", get(echo_code))).await;
        let client = client_for(base);

        let resp = client.fetch("110001").await.expect("lookup");
        assert!(resp.is_success());
        let offices = resp.into_post_offices();
        assert_eq!(offices.len(), 1);
        assert_eq!(offices[0].name(), "Connaught Place");
        assert_eq!(offices[0].pincode(), "110001");
        assert_eq!(offices[0].district(), "New Delhi");
        assert_eq!(offices[0].state(), "Delhi");
    }

    #[tokio::test]
    async fn fetch_keeps_base_path_prefix() {
        let base = spawn_directory(Router::new().route("/api/pincode/:code", get(echo_code))).await;
        let client = client_for(format!("{base}/api/"));

        let resp = client.fetch("560001").await.expect("lookup");
        assert_eq!(resp.into_post_offices()[0].pincode(), "560001");
    }

    #[tokio::test]
    async fn fetch_passes_not_found_status_through() {
        let app = Router::new().route(
            "/pincode/:code",
            get(|| async { Json(json!([{ "Message": "No records found", "Status": "Error", "PostOffice": null }])) }),
        );
        let client = client_for(spawn_directory(app).await);

        let resp = client.fetch("000000").await.expect("lookup");
        assert!(!resp.is_success());
        assert!(resp.into_post_offices().is_empty());
    }

    #[tokio::test]
    async fn fetch_maps_non_2xx_to_status_error() {
        let app = Router::new().route(
            "/pincode/:code",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = client_for(spawn_directory(app).await);

        let err = client.fetch("110001").await.expect_err("must fail");
        assert!(matches!(err, DirectoryError::Status(502)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn fetch_rejects_empty_array() {
        let app = Router::new().route("/pincode/:code", get(|| async { Json(json!([])) }));
        let client = client_for(spawn_directory(app).await);

        let err = client.fetch("110001").await.expect_err("must fail");
        assert!(matches!(err, DirectoryError::EmptyPayload), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn fetch_maps_malformed_body_to_request_error() {
        let app = Router::new().route("/pincode/:code", get(|| async { "<html>maintenance</html>" }));
        let client = client_for(spawn_directory(app).await);

        let err = client.fetch("110001").await.expect_err("must fail");
        assert!(matches!(err, DirectoryError::Request(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn fetch_times_out_on_hung_directory() {
        let app = Router::new().route(
            "/pincode/:code",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        );
        let client = PostalClient::new(ClientConfig {
            base_url: spawn_directory(app).await,
            timeout: Duration::from_millis(100),
            ..Default::default()
        })
        .expect("client");

        match client.fetch("110001").await {
            Err(DirectoryError::Request(e)) => assert!(e.is_timeout(), "expected timeout, got {e}"),
            other => panic!("expected request timeout, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_encodes_code_as_single_segment() {
        let client = client_for("http://localhost:8080".to_string());

        let url = client.endpoint("ab/c d");
        assert_eq!(url.as_str(), "http://localhost:8080/pincode/ab%2Fc%20d");
    }

    #[test]
    fn endpoint_replaces_trailing_slash() {
        let client = client_for("http://localhost:8080/api/".to_string());

        assert_eq!(client.endpoint("110001").as_str(), "http://localhost:8080/api/pincode/110001");
    }

    #[test]
    fn new_rejects_unusable_base_urls() {
        for base_url in ["not a url", "mailto:someone@example.com"] {
            let result = PostalClient::new(ClientConfig {
                base_url: base_url.to_string(),
                ..Default::default()
            });
            assert!(result.is_err(), "[{base_url}] should be rejected");
        }
    }
}
