use std::time::Duration;
use async_trait::async_trait;
use log::info;
use reqwest::{Request, Response};

/// Number of body characters written to the log for each request and response.
const LOG_BODY_LIMIT: usize = 100;

/// Anything that can send an HTTP request and hand back the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}

/// Build the outbound HTTP client used for the registry and pipeline calls.
pub fn client(timeout: Duration) -> Result<LoggingTransport<reqwest::Client>, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(LoggingTransport::new(client))
}

/// Logs the URL, status and the start of both bodies of every exchange.
///
/// The response body is read in full for logging and then put back, so the
/// caller still receives the complete, untruncated body. Status, version,
/// headers and extensions (and with them `remote_addr()`) are carried over;
/// `url()` is not, and reads as a placeholder on the returned response.
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        info!("Request URL: {} {}", request.method(), request.url());
        if let Some(body) = request.body() {
            match body.as_bytes() {
                Some(bytes) => info!("Request Body: {}", truncate_for_log(bytes)),
                None => info!("Request Body: <stream>"),
            }
        }

        let response = self.inner.execute(request).await?;
        info!("Response Status: {}", response.status());

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let extensions = response.extensions().clone();
        let body = response.bytes().await?;
        if !body.is_empty() {
            info!("Response Body: {}", truncate_for_log(&body));
        }

        let mut restored = http::Response::new(body);
        *restored.status_mut() = status;
        *restored.version_mut() = version;
        *restored.headers_mut() = headers;
        *restored.extensions_mut() = extensions;
        Ok(Response::from(restored))
    }
}

/// The first [LOG_BODY_LIMIT] characters of `body`, followed by `...` when cut short.
pub fn truncate_for_log(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut chars = text.chars();
    let mut truncated: String = chars.by_ref().take(LOG_BODY_LIMIT).collect();
    if chars.next().is_some() {
        truncated.push_str("...");
    }
    truncated
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;
    use async_trait::async_trait;
    use reqwest::{Method, Request, Response, StatusCode};
    use super::Transport;

    /// A request as seen by [FakeTransport].
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: Method,
        pub url: String,
        pub headers: reqwest::header::HeaderMap,
        pub body: Vec<u8>,
    }

    impl Recorded {
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    /// Extension put on every response, naming the route that answered.
    #[derive(Debug, Clone, PartialEq)]
    pub struct AnsweredBy(pub String);

    /// Answers every request whose path ends with a registered suffix,
    /// and 404 otherwise. Keeps a copy of every request it receives.
    #[derive(Default)]
    pub struct FakeTransport {
        routes: Vec<(String, StatusCode, String)>,
        failing: bool,
        pub requests: Mutex<Vec<Recorded>>,
    }

    impl FakeTransport {
        /// Records requests but answers each one with a transport error.
        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub fn route(mut self, path_suffix: &str, status: u16, body: &str) -> Self {
            self.routes.push((
                path_suffix.to_string(),
                StatusCode::from_u16(status).unwrap(),
                body.to_string(),
            ));
            self
        }

        pub fn recorded(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
            let recorded = Recorded {
                method: request.method().clone(),
                url: request.url().to_string(),
                headers: request.headers().clone(),
                body: request
                    .body()
                    .and_then(|body| body.as_bytes())
                    .map(|bytes| bytes.to_vec())
                    .unwrap_or_default(),
            };
            let path = request.url().path().to_string();
            self.requests.lock().unwrap().push(recorded);

            if self.failing {
                // An unparsable URL is the simplest way to get a reqwest::Error.
                return Err(reqwest::Client::new().get("http://[").build().unwrap_err());
            }

            let (suffix, status, body) = self
                .routes
                .iter()
                .find(|(suffix, _, _)| path.ends_with(suffix.as_str()))
                .map(|(suffix, status, body)| (suffix.clone(), *status, body.clone()))
                .unwrap_or((String::new(), StatusCode::NOT_FOUND, String::new()));

            let mut response = http::Response::new(body);
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert("x-fake-route", suffix.parse().unwrap());
            response.extensions_mut().insert(AnsweredBy(suffix));
            Ok(Response::from(response))
        }
    }
}
