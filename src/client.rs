use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::transport::{ChatTransport, Completion};
use crate::types::{ChatCompletion, ChatCompletionParams, StreamFragment};

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for OpenAI-compatible chat-completion endpoints, Azure OpenAI included.
#[derive(Clone)]
pub struct OpenAi {
    client: ReqwestClient,
    base_url: Url,
    endpoint: Url,
    headers: HeaderMap,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl OpenAi {
    /// Create a new client for the endpoint rooted at `base_url`.
    ///
    /// `base_url` is the API root (for example `https://api.openai.com/v1` or
    /// `https://my-resource.openai.azure.com/openai/v1`); requests go to
    /// `{base_url}/chat/completions`.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        Self::with_options(api_key, base_url, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds the wait for a complete reply.  A streamed reply has no overall deadline;
    /// instead the stream fails once `timeout` passes without any data arriving.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: &str,
        organization: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let base_url = normalize_base_url(base_url)?;
        let endpoint = base_url.join(CHAT_COMPLETIONS_PATH)?;
        let headers = default_headers(&api_key, organization.as_deref(), is_azure(&base_url))?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            endpoint,
            headers,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that observes every request and response.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The API root requests are sent under.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a request and wait for the complete reply.
    pub async fn send(&self, mut params: ChatCompletionParams) -> Result<ChatCompletion> {
        params.stream = false;
        let response = self.post(&params).await?;

        let completion = response.json::<ChatCompletion>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        if let Some(logger) = &self.logger {
            logger.log_completion(&completion);
        }
        Ok(completion)
    }

    /// Send a request and get the reply as a stream of fragments.
    pub async fn stream(
        &self,
        mut params: ChatCompletionParams,
    ) -> Result<impl Stream<Item = Result<StreamFragment>> + Send + 'static> {
        params.stream = true;
        let response = self.post(&params).await?;
        let bytes = read_timeout(response.bytes_stream(), self.timeout);
        Ok(process_sse(bytes, self.logger.clone()))
    }

    async fn post(&self, params: &ChatCompletionParams) -> Result<Response> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(params);
        }

        let mut headers = self.headers.clone();
        if params.stream {
            headers.insert(
                header::ACCEPT,
                HeaderValue::from_static("text/event-stream"),
            );
        }

        let request = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .json(params);
        // Streamed bodies are bounded per read, not as a whole.
        let request = if params.stream {
            request
        } else {
            request.timeout(self.timeout)
        };

        let start = Instant::now();
        let sent = tokio::time::timeout(self.timeout, request.send()).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(self.request_error(e));
            }
            Err(_) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(Error::timeout(
                    "Request timed out waiting for the endpoint",
                    Some(self.timeout.as_secs_f64()),
                ));
            }
        };

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        tracing::debug!(status = %response.status(), stream = params.stream, "endpoint accepted request");
        Ok(response)
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        // Azure fronts the service with APIM and reports its own request id
        let request_id = ["x-request-id", "apim-request-id"]
            .iter()
            .find_map(|name| response.headers().get(*name))
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        error_from_response(status_code, &error_body, request_id, retry_after)
    }
}

impl fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAi")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ChatTransport for OpenAi {
    async fn complete(&self, params: ChatCompletionParams) -> Result<Completion> {
        if params.stream {
            let stream = self.stream(params).await?;
            Ok(Completion::Stream(Box::pin(stream)))
        } else {
            let completion = self.send(params).await?;
            let text = completion
                .first_text()
                .ok_or_else(|| Error::serialization("Response contained no choices", None))?;
            Ok(Completion::Text(text.to_string()))
        }
    }
}

/// Fail a byte stream once `idle` passes without a chunk arriving.
fn read_timeout<S, E>(
    byte_stream: S,
    idle: Duration,
) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    Box::pin(stream::unfold(byte_stream, move |mut byte_stream| async move {
        let item = match tokio::time::timeout(idle, byte_stream.next()).await {
            Ok(Some(Ok(bytes))) => Ok(bytes),
            Ok(Some(Err(e))) => Err(io::Error::other(e)),
            Ok(None) => return None,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no data received for {}s", idle.as_secs()),
            )),
        };
        Some((item, byte_stream))
    }))
}

fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut normalized = base_url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| {
        Error::configuration(format!("Invalid endpoint base URL '{base_url}': {e}"), None)
    })
}

fn is_azure(base_url: &Url) -> bool {
    base_url
        .host_str()
        .is_some_and(|host| host.ends_with(".azure.com"))
}

fn default_headers(api_key: &str, organization: Option<&str>, azure: bool) -> Result<HeaderMap> {
    let invalid = |what: &str| {
        Error::configuration(format!("{what} contains characters not allowed in a header"), None)
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| invalid("API key"))?,
    );
    if azure {
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key).map_err(|_| invalid("API key"))?,
        );
    }
    if let Some(organization) = organization {
        headers.insert(
            "openai-organization",
            HeaderValue::from_str(organization).map_err(|_| invalid("Organization"))?,
        );
    }
    Ok(headers)
}

/// Map an unsuccessful HTTP status and its body onto an [`Error`].
fn error_from_response(
    status_code: u16,
    body: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        code: Option<serde_json::Value>,
        message: Option<String>,
        param: Option<String>,
    }

    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error);
    let error_type = detail.as_ref().and_then(|e| {
        e.error_type.clone().or_else(|| {
            e.code.as_ref().map(|code| match code {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
    });
    let message = detail
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| body.to_string());
    let param = detail.and_then(|e| e.param);

    match status_code {
        400 => Error::bad_request(message, param),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message, request_id),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, error_type, message, request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn client_creation() {
        let client = OpenAi::new("test-key", "https://api.openai.com/v1").unwrap();
        assert_eq!(client.base_url.as_str(), "https://api.openai.com/v1/");
        assert_eq!(
            client.endpoint.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert!(client.headers.get("api-key").is_none());
        assert_eq!(
            client.headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer test-key"
        );

        let client = OpenAi::with_options(
            "test-key",
            "https://custom-api.example.com/",
            Some("org-123".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(
            client.endpoint.as_str(),
            "https://custom-api.example.com/chat/completions"
        );
        assert_eq!(client.timeout, Duration::from_secs(30));
        assert_eq!(client.headers.get("openai-organization").unwrap(), "org-123");
    }

    #[test]
    fn azure_endpoint_gets_api_key_header() {
        let client =
            OpenAi::new("azure-key", "https://my-resource.openai.azure.com/openai/v1").unwrap();
        assert_eq!(
            client.endpoint.as_str(),
            "https://my-resource.openai.azure.com/openai/v1/chat/completions"
        );
        assert_eq!(client.headers.get("api-key").unwrap(), "azure-key");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out_per_read() {
        let stalled = stream::pending::<std::result::Result<Bytes, io::Error>>();
        let mut bytes = read_timeout(stalled, Duration::from_secs(5));

        let err = bytes.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stream_outlives_the_read_timeout() {
        let chunks = stream::iter(1..=3u64).then(|n| async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok::<_, io::Error>(Bytes::from(n.to_string()))
        });
        let bytes = read_timeout(Box::pin(chunks), Duration::from_secs(5));

        let collected: Vec<_> = bytes.collect().await;
        assert_eq!(collected.len(), 3);
        assert!(collected.iter().all(|chunk| chunk.is_ok()));
    }

    #[test]
    fn invalid_base_url_is_configuration_error() {
        let err = OpenAi::new("k", "not a url").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn invalid_api_key_is_configuration_error() {
        let err = OpenAi::new("bad\nkey", "https://api.openai.com/v1").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let client = OpenAi::new("sk-secret", "https://api.openai.com/v1").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("api.openai.com"));
    }

    #[test]
    fn error_mapping_uses_openai_error_body() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#;
        let err = error_from_response(401, body, None, None);
        assert!(err.is_authentication());
        assert_eq!(
            err.to_string(),
            "Authentication error: Incorrect API key provided"
        );

        let err = error_from_response(429, body, None, Some(7));
        assert!(matches!(err, Error::RateLimit { retry_after: Some(7), .. }));

        let body = r#"{"error":{"code":"DeploymentNotFound","message":"The API deployment for this resource does not exist."}}"#;
        let err = error_from_response(409, body, Some("req-9".to_string()), None);
        assert_eq!(
            err.to_string(),
            "DeploymentNotFound: The API deployment for this resource does not exist. (Request ID: req-9)"
        );
    }

    #[test]
    fn error_mapping_falls_back_to_raw_body() {
        let err = error_from_response(502, "upstream connect error", None, None);
        assert_eq!(
            err.to_string(),
            "Service unavailable: upstream connect error"
        );
    }

    #[tokio::test]
    #[ignore] // Ignore by default as this requires a live endpoint
    async fn live_stream() {
        let (Ok(api_key), Ok(base_url), Ok(model)) = (
            std::env::var("OPENAI_API_KEY"),
            std::env::var("OPENAI_BASE_URL"),
            std::env::var("OPENAI_MODEL"),
        ) else {
            println!("Skipping live_stream: OPENAI_* not set");
            return;
        };
        let client = OpenAi::new(api_key, &base_url).unwrap();
        let params = ChatCompletionParams::new(model, vec![ChatMessage::user("Say hi.")]);
        let completion = client.complete(params.with_stream(true)).await.unwrap();
        assert!(matches!(completion, Completion::Stream(_)));
    }
}
