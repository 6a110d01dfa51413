//! Blocking HTTP manifest fetcher.
//!
//! `ureq` is synchronous, so each request runs on tokio's blocking pool.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::ports::ManifestFetcher;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

#[async_trait]
impl ManifestFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let agent = self.agent.clone();
        let owned = url.to_string();
        tokio::task::spawn_blocking(move || blocking_get(&agent, &owned))
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?
    }
}

fn blocking_get(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = agent.get(url).call().map_err(|err| match err {
        ureq::Error::Status(code, _) => FetchError::Status {
            url: url.to_string(),
            code,
        },
        ureq::Error::Transport(transport) => FetchError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    })?;

    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
    Ok(body)
}
