use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, USER_AGENT};
use stash_logging::stash_warn;
use tokio_util::sync::CancellationToken;

use crate::decode::{decode_text, media_type};
use crate::html::parse_page;
use crate::{AssetBody, FailureKind, FetchError, Page};

/// Attempts per request before giving up.
pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Upper bound for listing and detail pages; assets are not capped.
    pub max_page_bytes: u64,
    pub user_agent: String,
    /// Raw `Cookie` header of an already authenticated session.
    pub cookie: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_page_bytes: 5 * 1024 * 1024,
            user_agent: concat!("artstash/", env!("CARGO_PKG_VERSION")).to_string(),
            cookie: None,
        }
    }
}

/// Read-only access to the site through an authenticated session.
///
/// Implementations must be safe to share between workers; the session they
/// carry is never mutated once built.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError>;

    async fn fetch_asset(&self, url: &str) -> Result<AssetBody, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or `policy.max_attempts` is reached.
///
/// The token is checked before every attempt and raced against the attempt itself.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::cancelled());
        }
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled()),
            result = op() => result,
        };
        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_permanent() || attempt >= max_attempts => return Err(err),
            Err(err) => {
                stash_warn!(
                    "Attempt {}/{} for {} failed: {}; retrying",
                    attempt,
                    max_attempts,
                    what,
                    err
                );
            }
        }
    }
}

/// The production [`Fetcher`]: one shared `reqwest` client carrying the session headers.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&settings.user_agent)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, format!("user agent: {err}")))?;
        headers.insert(USER_AGENT, agent);
        if let Some(cookie) = settings.cookie.as_deref() {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|err| FetchError::new(FailureKind::InvalidUrl, format!("cookie: {err}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .default_headers(headers)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self { client, settings })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, format!("{url}: {err}")))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("{url}: {status}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        let response = self.get(url).await?;
        let max_bytes = self.settings.max_page_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "page too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = content_type_of(&response);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "page too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_text(&bytes, content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        Ok(parse_page(&final_url, &decoded.text))
    }

    async fn fetch_asset(&self, url: &str) -> Result<AssetBody, FetchError> {
        let response = self.get(url).await?;
        let content_type = content_type_of(&response);

        if content_type.as_deref().is_some_and(is_text_asset) {
            let bytes = response.bytes().await.map_err(map_reqwest_error)?;
            let decoded = decode_text(&bytes, content_type.as_deref())
                .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
            return Ok(AssetBody::Text(decoded.text));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed();
        Ok(AssetBody::Binary(stream))
    }
}

/// Plain-text submissions (stories, poems) are served as `text/*`; pages are not assets.
fn is_text_asset(content_type: &str) -> bool {
    let media = media_type(content_type);
    media.starts_with("text/") && media != "text/html"
}

fn content_type_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::is_text_asset;

    #[test]
    fn text_assets_exclude_html() {
        assert!(is_text_asset("text/plain; charset=utf-8"));
        assert!(!is_text_asset("text/html"));
        assert!(!is_text_asset("image/png"));
    }
}
