// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP/JSON transport: one `request()` operation shared by the poll loop,
//! identify, and feedback calls. The bundle downloader (`crate::download`)
//! reuses the same underlying [`reqwest::Client`] but sets its own `Accept`
//! header and streams rather than buffering.

use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{AgentError, Result};

/// Fixed product string sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("hawkbit-agent/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed for both control-plane calls and downloads.
pub const MAX_REDIRECTS: usize = 8;

/// Wire verb. The uppercase variant name is the method sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Patch,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Build the process-wide pooled HTTP client from [`Config`].
///
/// Called once at init (§4.F); every request — control-plane and download —
/// reuses this client so TLS sessions and connections are pooled.
pub fn build_client(config: &Config) -> Result<Client> {
    let builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(!config.verify_tls)
        .danger_accept_invalid_hostnames(!config.verify_tls);
    builder.build().map_err(AgentError::Transport)
}

/// Thin wrapper over a shared [`Client`] implementing the single
/// `request()` operation described in §4.A.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    auth_header: Option<String>,
}

impl Transport {
    /// Construct a transport over an already-built client.
    #[must_use]
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            auth_header: config.auth_header(),
        }
    }

    /// Borrow the underlying client (used by [`crate::download`] to share
    /// connection pooling with the control-plane calls).
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Issue a request, optionally with a JSON body, optionally parsing the
    /// JSON response.
    ///
    /// - `request_body`: serialized as UTF-8 JSON with
    ///   `Content-Type: application/json;charset=UTF-8`.
    /// - `parse_response`: if true, the body is parsed as JSON and returned;
    ///   otherwise it is discarded and `Ok(None)` is returned on success.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        request_body: Option<&Value>,
        parse_response: bool,
    ) -> Result<Option<Value>> {
        let mut builder = self
            .client
            .request(method.into(), url)
            .header("Accept", "application/json;charset=UTF-8");

        if let Some(auth) = &self.auth_header {
            builder = builder.header("Authorization", auth);
        }

        if let Some(body) = request_body {
            builder = builder
                .header("Content-Type", "application/json;charset=UTF-8")
                .body(serde_json::to_vec(body).map_err(AgentError::JsonParse)?);
        }

        let response = builder.send().await.map_err(AgentError::Transport)?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, %url, "non-200 response");
            return Err(AgentError::Http {
                status: status.as_u16(),
                body,
            });
        }

        if !parse_response {
            // Drain the body so the connection can be reused.
            let _ = response.bytes().await;
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(AgentError::Transport)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&bytes).map_err(AgentError::JsonParse)?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_uri: &str, token: Option<crate::config::Token>) -> Config {
        let (host, tls) = server_uri
            .strip_prefix("http://")
            .map(|h| (h.to_string(), false))
            .unwrap_or_else(|| (server_uri.to_string(), true));
        Config {
            host,
            tenant_id: "DEFAULT".into(),
            controller_id: "dev-1".into(),
            tls,
            verify_tls: true,
            token,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            retry_wait: Duration::from_secs(30),
            bundle_download_location: std::env::temp_dir().join("hawkbit-bundle-test"),
            post_update_reboot: false,
            device: Default::default(),
            run_once: false,
        }
    }

    #[tokio::test]
    async fn get_parses_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let config = test_config(&server.uri().replace("http://", ""), None);
        let client = build_client(&config).unwrap();
        let transport = Transport::new(client, &config);

        let url = format!("{}/hello", server.uri());
        let value = transport
            .request(Method::Get, &url, None, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn target_token_takes_precedence_over_gateway_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth"))
            .and(header("Authorization", "TargetToken tgt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let config = test_config(
            &server.uri(),
            Some(crate::config::Token::Target("tgt".into())),
        );
        let client = build_client(&config).unwrap();
        let transport = Transport::new(client, &config);
        let url = format!("{}/auth", server.uri());
        let result = transport.request(Method::Get, &url, None, false).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_200_status_is_classified_as_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nope"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), None);
        let client = build_client(&config).unwrap();
        let transport = Transport::new(client, &config);
        let url = format!("{}/nope", server.uri());
        let err = transport
            .request(Method::Get, &url, None, true)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        match err {
            AgentError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_body_is_classified_as_json_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad-json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), None);
        let client = build_client(&config).unwrap();
        let transport = Transport::new(client, &config);
        let url = format!("{}/bad-json", server.uri());
        let err = transport
            .request(Method::Get, &url, None, true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::JsonParse);
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/configData"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), None);
        let client = build_client(&config).unwrap();
        let transport = Transport::new(client, &config);
        let url = format!("{}/configData", server.uri());
        let body = json!({"status": "ok"});
        let result = transport
            .request(Method::Put, &url, Some(&body), false)
            .await;
        assert!(result.is_ok());
    }
}
