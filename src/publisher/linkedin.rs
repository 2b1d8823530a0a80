//! LinkedIn Posts API publisher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::jobs::Visibility;
use crate::publisher::credentials::CredentialProvider;
use crate::publisher::{PRIMARY_REF_KEY, PublishResponse, Publisher, PublisherSource};

const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";
/// Header carrying the URN of a newly created post.
const RESTLI_ID_HEADER: &str = "x-restli-id";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes posts as a single LinkedIn member.
pub struct LinkedInPublisher {
    http: Client,
    config: PublisherConfig,
    access_token: SecretString,
    person_id: String,
}

impl LinkedInPublisher {
    pub fn new(
        config: PublisherConfig,
        access_token: SecretString,
        person_id: impl Into<String>,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            access_token,
            person_id: person_id.into(),
        })
    }

    fn author_urn(&self) -> String {
        format!("urn:li:person:{}", self.person_id)
    }

    fn post_body(&self, content: &str, url: Option<&str>, visibility: Visibility) -> serde_json::Value {
        let mut body = serde_json::json!({
            "author": self.author_urn(),
            "commentary": content,
            "visibility": visibility.as_str(),
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": []
            },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false
        });
        if let Some(url) = url {
            body["content"] = serde_json::json!({
                "article": { "source": url, "title": url }
            });
        }
        body
    }

    async fn send_post(&self, body: serde_json::Value) -> Result<PublishResponse, PublishError> {
        let url = format!("{}/rest/posts", self.config.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .header("LinkedIn-Version", &self.config.api_version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let restli_id = response
            .headers()
            .get(RESTLI_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let text = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let mut result = parse_body(&text)?;
        if let Some(urn) = restli_id {
            result.insert(
                PRIMARY_REF_KEY.to_string(),
                serde_json::Value::String(urn),
            );
        }
        debug!(status = status.as_u16(), "LinkedIn post created");
        Ok(result)
    }

    fn request_error(&self, e: reqwest::Error) -> PublishError {
        if e.is_timeout() {
            PublishError::Timeout(self.config.timeout)
        } else {
            PublishError::RequestFailed(e.to_string())
        }
    }
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    async fn create_post(
        &self,
        content: &str,
        visibility: Visibility,
    ) -> Result<PublishResponse, PublishError> {
        self.send_post(self.post_body(content, None, visibility))
            .await
    }

    async fn create_post_with_link(
        &self,
        content: &str,
        url: &str,
        visibility: Visibility,
    ) -> Result<PublishResponse, PublishError> {
        self.send_post(self.post_body(content, Some(url), visibility))
            .await
    }
}

/// Builds a [`LinkedInPublisher`] from fresh credentials each cycle.
pub struct LinkedInPublisherSource {
    config: PublisherConfig,
    credentials: Arc<dyn CredentialProvider>,
    http: Client,
}

impl LinkedInPublisherSource {
    pub fn new(
        config: PublisherConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            credentials,
        })
    }

    /// Look up the member id behind a token via the OpenID userinfo endpoint.
    async fn fetch_person_id(&self, access_token: &SecretString) -> Result<String, PublishError> {
        #[derive(Deserialize)]
        struct UserInfo {
            sub: String,
        }

        let url = format!("{}/v2/userinfo", self.config.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| PublishError::RequestFailed(format!("userinfo: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(format!("userinfo: {e}")))?;
        Ok(info.sub)
    }
}

#[async_trait]
impl PublisherSource for LinkedInPublisherSource {
    async fn publisher(&self) -> Result<Arc<dyn Publisher>, PublishError> {
        let creds = self.credentials.credentials()?;
        let person_id = match creds.person_id {
            Some(id) => id,
            None => self.fetch_person_id(&creds.access_token).await?,
        };
        let publisher = LinkedInPublisher::new(self.config.clone(), creds.access_token, person_id)?;
        Ok(Arc::new(publisher))
    }
}

fn build_client(timeout: Duration) -> Result<Client, PublishError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| PublishError::RequestFailed(format!("failed to build HTTP client: {e}")))
}

/// A 201 from the Posts API usually has an empty body.
fn parse_body(text: &str) -> Result<PublishResponse, PublishError> {
    if text.trim().is_empty() {
        return Ok(PublishResponse::new());
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(PublishError::InvalidResponse(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(PublishError::InvalidResponse(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::ExternalRef;
    use crate::publisher::credentials::LinkedInCredentials;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: String) -> PublisherConfig {
        PublisherConfig {
            api_base: base,
            api_version: "202501".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn publisher(base: String) -> LinkedInPublisher {
        LinkedInPublisher::new(config(base), SecretString::from("test-token"), "abc123").unwrap()
    }

    #[tokio::test]
    async fn create_post_reads_urn_from_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("LinkedIn-Version", "202501"))
            .and(header("X-Restli-Protocol-Version", "2.0.0"))
            .and(body_partial_json(serde_json::json!({
                "author": "urn:li:person:abc123",
                "commentary": "Hello world",
                "visibility": "PUBLIC"
            })))
            .respond_with(
                ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:111"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = publisher(mock_server.uri())
            .create_post("Hello world", Visibility::Public)
            .await
            .unwrap();

        assert_eq!(
            ExternalRef::resolve(&response),
            ExternalRef::Primary("urn:li:share:111".to_string())
        );
    }

    #[tokio::test]
    async fn create_post_with_link_attaches_article() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .and(body_partial_json(serde_json::json!({
                "visibility": "CONNECTIONS",
                "content": {"article": {"source": "https://example.com/a"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "share-999"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = publisher(mock_server.uri())
            .create_post_with_link("Read this", "https://example.com/a", Visibility::Connections)
            .await
            .unwrap();

        assert_eq!(
            ExternalRef::resolve(&response),
            ExternalRef::Fallback("share-999".to_string())
        );
    }

    #[tokio::test]
    async fn non_success_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&mock_server)
            .await;

        let err = publisher(mock_server.uri())
            .create_post("Hello", Visibility::Public)
            .await
            .unwrap_err();

        match err {
            PublishError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("token expired"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let mut cfg = config(mock_server.uri());
        cfg.timeout = Duration::from_millis(200);
        let publisher =
            LinkedInPublisher::new(cfg, SecretString::from("test-token"), "abc123").unwrap();

        let err = publisher
            .create_post("Hello", Visibility::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn source_looks_up_missing_person_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "looked-up-id",
                "name": "Test User"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .and(body_partial_json(serde_json::json!({
                "author": "urn:li:person:looked-up-id"
            })))
            .respond_with(ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:5"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = LinkedInPublisherSource::new(
            config(mock_server.uri()),
            Arc::new(LinkedInCredentials::new("test-token", None)),
        )
        .unwrap();

        let publisher = source.publisher().await.unwrap();
        let response = publisher
            .create_post("Hello", Visibility::Public)
            .await
            .unwrap();
        assert_eq!(ExternalRef::resolve(&response).as_stored(), "urn:li:share:5");
    }

    #[test]
    fn parse_body_handles_empty_and_garbage() {
        assert!(parse_body("").unwrap().is_empty());
        assert!(parse_body("  ").unwrap().is_empty());
        assert!(matches!(
            parse_body("[1, 2]"),
            Err(PublishError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_body("not json"),
            Err(PublishError::InvalidResponse(_))
        ));
    }
}
