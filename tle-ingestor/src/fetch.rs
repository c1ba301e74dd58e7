use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// Something that returns the raw, newline separated element set payload.
#[async_trait]
pub trait ElementSource {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Fetch the payload with a single GET. Non-success responses are errors, never payloads.
pub struct HttpSource {
    url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("tle-ingestor")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.to_owned(),
            client,
        })
    }
}

#[async_trait]
impl ElementSource for HttpSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.text().await?)
    }
}
