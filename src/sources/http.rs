//! Shared blocking HTTP agent for every outbound call.

use crate::config::HttpConfig;
use crate::error::SourceUnavailable;
use serde::de::DeserializeOwned;
use std::io::Read;

/// Thin wrapper over a pooled `ureq` agent. Anything other than a 200 is a
/// failure of the calling tier.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        Self { agent }
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<ureq::Response, SourceUnavailable> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        expect_ok(request.call()?)
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceUnavailable> {
        Ok(self.get(url, query)?.into_json()?)
    }

    /// Streaming body, for downloads too large to buffer as a string.
    pub fn get_reader(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Box<dyn Read + Send + Sync + 'static>, SourceUnavailable> {
        Ok(self.get(url, query)?.into_reader())
    }

    pub fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, SourceUnavailable> {
        let response = expect_ok(self.agent.post(url).send_form(form)?)?;
        Ok(response.into_json()?)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(&HttpConfig::default())
    }
}

fn expect_ok(response: ureq::Response) -> Result<ureq::Response, SourceUnavailable> {
    match response.status() {
        200 => Ok(response),
        other => Err(SourceUnavailable::Status(other)),
    }
}
