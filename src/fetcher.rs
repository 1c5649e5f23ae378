use std::time::Duration;

use anyhow::Result;
use rand::rng;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::redirect;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::delay::{DelayPolicy, sleep_secs};
use crate::identity::{self, BrowserCatalog, UserAgentSource};

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The single outbound call the fetcher needs. Errors are transport level
/// (DNS, TLS, timeout); HTTP statuses come back as `Ok`.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<RawResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<RawResponse> {
        (**self).get(url, query, headers)
    }
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let redirect_policy = redirect::Policy::custom(|attempt| {
            if attempt.previous().len() > 10 {
                attempt.error("Too many redirects (>10)")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::blocking::Client::builder()
            .redirect(redirect_policy)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<RawResponse> {
        let resp = self.client.get(url).query(query).headers(headers).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(RawResponse { status, body })
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed with status code: {0}")]
    Status(u16),
    #[error("still blocked (403) after {attempts} attempts")]
    Blocked { attempts: u32 },
    #[error("transport error after {attempts} attempts: {source:#}")]
    Transport {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

enum Attempt {
    Success(String),
    Retry(Retryable),
    Fatal(FetchError),
}

enum Retryable {
    Blocked,
    Transport(anyhow::Error),
}

/// Issues one GET per page with pacing and bounded retries.
pub struct PageFetcher<T: Transport> {
    transport: T,
    agents: Box<dyn UserAgentSource>,
    delay: DelayPolicy,
    max_retries: u32,
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(transport: T, delay: DelayPolicy, max_retries: u32) -> Self {
        Self {
            transport,
            agents: Box::new(BrowserCatalog),
            delay,
            max_retries,
        }
    }

    pub fn with_user_agents(mut self, agents: Box<dyn UserAgentSource>) -> Self {
        self.agents = agents;
        self
    }

    /// Fetch `url` until it answers 200, a non-retryable status comes back,
    /// or `1 + max_retries` attempts have been spent.
    pub fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
        let mut retry_count = 0;
        loop {
            let reason = match self.attempt(url, params) {
                Attempt::Success(body) => return Ok(body),
                Attempt::Fatal(e) => return Err(e),
                Attempt::Retry(reason) => reason,
            };

            if retry_count >= self.max_retries {
                let attempts = retry_count + 1;
                return Err(match reason {
                    Retryable::Blocked => FetchError::Blocked { attempts },
                    Retryable::Transport(source) => FetchError::Transport { attempts, source },
                });
            }

            retry_count += 1;
            match reason {
                Retryable::Blocked => {
                    warn!("Got 403, retrying ({}/{})...", retry_count, self.max_retries)
                }
                Retryable::Transport(_) => {
                    info!("Retrying ({}/{})...", retry_count, self.max_retries)
                }
            }
            sleep_secs(self.delay.retry_delay(&mut rng()));
        }
    }

    fn attempt(&self, url: &str, params: &[(&str, String)]) -> Attempt {
        let delay = self.delay.next_delay(&mut rng());
        info!("Waiting {:.2} seconds before next request...", delay);
        sleep_secs(delay);

        let headers = identity::api_headers(self.agents.as_ref());
        match self.transport.get(url, params, headers) {
            Ok(resp) if resp.status == StatusCode::OK.as_u16() => Attempt::Success(resp.body),
            Ok(resp) if resp.status == StatusCode::FORBIDDEN.as_u16() => {
                Attempt::Retry(Retryable::Blocked)
            }
            Ok(resp) => {
                error!("Request failed with status code: {}", resp.status);
                Attempt::Fatal(FetchError::Status(resp.status))
            }
            Err(e) => {
                error!("Error during request: {e:#}");
                Attempt::Retry(Retryable::Transport(e))
            }
        }
    }
}

/// Fetch a listing page as a browser navigation would. Non-200 responses
/// are returned as `None` after logging.
pub fn fetch_html<T: Transport>(transport: &T, url: &str, delay: &DelayPolicy) -> Result<Option<String>> {
    sleep_secs(delay.next_delay(&mut rng()));
    let resp = transport.get(url, &[], identity::document_headers())?;
    info!("Listing page status code: {}", resp.status);
    if resp.status != StatusCode::OK.as_u16() {
        warn!("Failed to get page. Status code: {}", resp.status);
        return Ok(None);
    }
    Ok(Some(resp.body))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use reqwest::header::USER_AGENT;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    pub(crate) enum Scripted {
        Status(u16, &'static str),
        Owned(u16, String),
        Broken,
    }

    /// Replays a fixed list of outcomes and records each request.
    pub(crate) struct ScriptedTransport {
        script: RefCell<VecDeque<Scripted>>,
        pub(crate) calls: RefCell<Vec<(String, Vec<(String, String)>, HeaderMap)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<RawResponse> {
            self.calls.borrow_mut().push((
                url.to_string(),
                query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                headers,
            ));
            match self.script.borrow_mut().pop_front() {
                Some(Scripted::Status(status, body)) => Ok(RawResponse { status, body: body.to_string() }),
                Some(Scripted::Owned(status, body)) => Ok(RawResponse { status, body }),
                Some(Scripted::Broken) => Err(anyhow!("connection reset")),
                None => Err(anyhow!("script exhausted")),
            }
        }
    }

    fn fetcher(transport: &ScriptedTransport, max_retries: u32) -> PageFetcher<&ScriptedTransport> {
        PageFetcher::new(transport, DelayPolicy::none(), max_retries)
    }

    #[test]
    fn test_ok_on_first_attempt() {
        let transport = ScriptedTransport::new(vec![Scripted::Status(200, "[]")]);
        let body = fetcher(&transport, 3).fetch("http://deals", &[("index", "1".into())]).unwrap();
        assert_eq!(body, "[]");
        assert_eq!(transport.call_count(), 1);

        let calls = transport.calls.borrow();
        assert_eq!(calls[0].1, vec![("index".to_string(), "1".to_string())]);
        assert!(calls[0].2.contains_key(USER_AGENT));
    }

    #[test]
    fn test_custom_user_agent_is_sent() {
        let transport = ScriptedTransport::new(vec![Scripted::Status(200, "[]")]);
        let fetcher = fetcher(&transport, 0)
            .with_user_agents(Box::new(identity::FixedUserAgent("DealsBot/2.0".to_string())));
        fetcher.fetch("http://deals", &[]).unwrap();
        assert_eq!(transport.calls.borrow()[0].2[USER_AGENT], "DealsBot/2.0");
    }

    #[test]
    fn test_forbidden_then_ok() {
        let transport = ScriptedTransport::new(vec![
            Scripted::Status(403, ""),
            Scripted::Status(403, ""),
            Scripted::Status(200, "[1]"),
        ]);
        let body = fetcher(&transport, 3).fetch("http://deals", &[]).unwrap();
        assert_eq!(body, "[1]");
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn test_forbidden_until_exhausted() {
        let transport = ScriptedTransport::new((0..10).map(|_| Scripted::Status(403, "")).collect());
        let err = fetcher(&transport, 3).fetch("http://deals", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Blocked { attempts: 4 }));
        assert_eq!(transport.call_count(), 4);
    }

    #[test]
    fn test_other_status_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Scripted::Status(500, ""), Scripted::Status(200, "[]")]);
        let err = fetcher(&transport, 3).fetch("http://deals", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Status(500)));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_transport_error_is_retried() {
        let transport = ScriptedTransport::new(vec![Scripted::Broken, Scripted::Status(200, "[]")]);
        let body = fetcher(&transport, 3).fetch("http://deals", &[]).unwrap();
        assert_eq!(body, "[]");
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_transport_errors_exhaust_retries() {
        let transport = ScriptedTransport::new(vec![Scripted::Broken, Scripted::Broken, Scripted::Broken]);
        let err = fetcher(&transport, 2).fetch("http://deals", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Transport { attempts: 3, .. }));
    }

    #[test]
    fn test_transport_error_without_retries() {
        let transport = ScriptedTransport::new(vec![Scripted::Broken]);
        let err = fetcher(&transport, 0).fetch("http://deals", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Transport { attempts: 1, .. }));
    }

    #[test]
    fn test_fetch_html() {
        let transport = ScriptedTransport::new(vec![
            Scripted::Status(200, "<html></html>"),
            Scripted::Status(403, "blocked"),
        ]);
        let page = fetch_html(&transport, "http://page", &DelayPolicy::none()).unwrap();
        assert_eq!(page.as_deref(), Some("<html></html>"));
        let page = fetch_html(&transport, "http://page", &DelayPolicy::none()).unwrap();
        assert!(page.is_none());

        let calls = transport.calls.borrow();
        assert_eq!(calls[0].2[USER_AGENT], identity::DOCUMENT_USER_AGENT);
    }
}
