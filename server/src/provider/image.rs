use color_eyre::eyre::WrapErr as _;
use tracing::info;

use crate::errors::ProviderError;

use super::ImageSource;

/// The fixed reference avatar, fetched fresh for every completed handshake
#[derive(Clone)]
pub struct HttpImageSource {
    http: reqwest::Client,
    url: String,
}

impl HttpImageSource {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> color_eyre::Result<Self> {
        let url = url.into();
        reqwest::Url::parse(&url).wrap_err_with(|| format!("Invalid avatar image URL: {url}"))?;

        Ok(Self { http, url })
    }
}

#[async_trait::async_trait]
impl ImageSource for HttpImageSource {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProviderError::network(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(ProviderError::Status {
                endpoint: self.url.clone(),
                status,
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::network(&self.url, e))?
            .to_vec();

        if bytes.is_empty() {
            return Err(ProviderError::invalid(&self.url, "avatar image was empty"));
        }

        info!("Fetched avatar image: {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_urls() {
        assert!(HttpImageSource::new(reqwest::Client::new(), "not a url").is_err());
        assert!(HttpImageSource::new(reqwest::Client::new(), "https://pbs.twimg.com/x.jpg").is_ok());
    }
}
