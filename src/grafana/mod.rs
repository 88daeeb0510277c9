//! Read-only client of the [Grafana HTTP API](https://grafana.com/docs/grafana/latest/developers/http_api/).

mod search;

use std::fmt;
use std::time::Duration;

use derive_more::{Display, Error, From};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use url::Url;

use crate::config::redact;

pub use search::{DashboardSummary, DASHBOARD_TYPE, GENERAL_FOLDER};

const SEARCH_PATH: &str = "/api/search";
const DASHBOARDS_PATH: &str = "/api/dashboards";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Display, Error, From)]
/// Errors on requests against the [Grafana] API.
pub enum GrafanaError {
    /// The configured Grafana URL can't be parsed.
    #[display("Invalid Grafana URL: {_0}")]
    InvalidUrl(url::ParseError),
    /// The request didn't complete.
    #[display("Request to Grafana failed: {_0}")]
    #[from]
    Network(reqwest::Error),
    /// Grafana answered with a non-success status code.
    #[display("{url} responded with {status}")]
    Status { url: String, status: StatusCode },
    /// The response body doesn't match the expected shape.
    #[display("Decoding the Grafana response failed: {_0}")]
    #[from]
    Decode(serde_json::Error),
}

/// Source of the dashboards to back up.
pub trait DashboardSource {
    /// All hits of the search API, dashboards and folders alike.
    fn fetch_search(&self) -> Result<Vec<DashboardSummary>, GrafanaError>;

    /// Raw JSON document of the dashboard behind `summary`.
    fn fetch_dashboard(&self, summary: &DashboardSummary) -> Result<Vec<u8>, GrafanaError>;
}

/// A Grafana instance authenticated by an API key.
#[derive(Clone)]
pub struct Grafana {
    base_url: Url,
    api_key: String,
    client: Client,
}

impl fmt::Debug for Grafana {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grafana")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &redact(&self.api_key))
            .finish_non_exhaustive()
    }
}

impl Grafana {
    pub fn new(url: &str, api_key: &str) -> Result<Self, GrafanaError> {
        let base_url = Url::parse(url).map_err(GrafanaError::InvalidUrl)?;
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            client,
        })
    }

    /// Lists dashboards and folders using `GET /api/search`.
    pub fn search(&self) -> Result<Vec<DashboardSummary>, GrafanaError> {
        let body = self.get(SEARCH_PATH)?;
        let hits: Vec<DashboardSummary> = serde_json::from_slice(&body)?;
        log::debug!(target: "grafana", "Search returned {} hits", hits.len());

        Ok(hits)
    }

    /// Downloads a dashboard using `GET /api/dashboards/{uri}`.
    ///
    /// The body is returned as is, including the `meta` section.
    pub fn dashboard(&self, uri: &str) -> Result<Vec<u8>, GrafanaError> {
        self.get(&format!("{DASHBOARDS_PATH}/{uri}"))
    }

    /// Replaces the path of the base URL with `path`.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, GrafanaError> {
        let url = self.endpoint(path);
        log::info!(target: "grafana", "Request -> {url}");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(GrafanaError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}

impl DashboardSource for Grafana {
    fn fetch_search(&self) -> Result<Vec<DashboardSummary>, GrafanaError> {
        self.search()
    }

    fn fetch_dashboard(&self, summary: &DashboardSummary) -> Result<Vec<u8>, GrafanaError> {
        self.dashboard(&summary.dashboard_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_rejected() {
        let result = Grafana::new("", "token");
        assert!(matches!(result, Err(GrafanaError::InvalidUrl(_))));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let grafana = Grafana::new("https://grafana.example.com", "glsa_secret").unwrap();
        let debug = format!("{grafana:?}");

        assert!(!debug.contains("glsa_secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("grafana.example.com"));
    }

    #[test]
    fn endpoint_replaces_base_path() {
        let grafana = Grafana::new("https://grafana.example.com/ignored/", "token").unwrap();
        assert_eq!(
            grafana.endpoint("/api/search").as_str(),
            "https://grafana.example.com/api/search"
        );
    }

    #[test]
    fn search_sends_bearer_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/search")
            .match_header("authorization", "Bearer secret-token")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 3, "uid": "u3", "title": "CPU", "uri": "db/cpu", "type": "dash-db"}]"#)
            .create();

        let grafana = Grafana::new(&server.url(), "secret-token").unwrap();
        let hits = grafana.search().unwrap();

        mock.assert();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "CPU");
        assert!(hits[0].is_dashboard());
    }

    #[test]
    fn search_with_malformed_body_is_decode_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/api/search")
            .with_status(200)
            .with_body("<html>login</html>")
            .create();

        let grafana = Grafana::new(&server.url(), "token").unwrap();
        assert!(matches!(grafana.search(), Err(GrafanaError::Decode(_))));
    }

    #[test]
    fn unauthorized_is_status_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/api/search")
            .with_status(401)
            .with_body(r#"{"message": "invalid API key"}"#)
            .create();

        let grafana = Grafana::new(&server.url(), "wrong").unwrap();
        match grafana.search() {
            Err(GrafanaError::Status { status, .. }) => assert_eq!(status, StatusCode::UNAUTHORIZED),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn dashboard_body_is_returned_verbatim() {
        let body = r#"{"dashboard": {"title": "CPU", "panels": []}, "meta": {"slug": "cpu"}}"#;
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/dashboards/db/cpu")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_body(body)
            .create();

        let grafana = Grafana::new(&server.url(), "token").unwrap();
        let summary = DashboardSummary {
            uri: "db/cpu".into(),
            kind: DASHBOARD_TYPE.into(),
            ..Default::default()
        };
        let content = grafana.fetch_dashboard(&summary).unwrap();

        mock.assert();
        assert_eq!(content, body.as_bytes());
    }

    #[test]
    fn unreachable_server_is_network_error() {
        // nothing listens on the discard port
        let grafana = Grafana::new("http://127.0.0.1:9", "token").unwrap();
        assert!(matches!(grafana.search(), Err(GrafanaError::Network(_))));
    }
}
