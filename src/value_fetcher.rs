use anyhow::Context;

/// One bound HTTP getter for a single measurement path on the meter.
///
/// The device answers each configured path with a plain-text numeric body,
/// e.g. `GET http://192.168.1.50/power` -> `1234.5`.
pub struct ValueFetcher {
    client: reqwest::Client,
    endpoint_url: Option<String>,
}

impl ValueFetcher {
    /// Binds `base_url` + `path` into a fetcher. An empty path marks the
    /// measurement as not exposed by the device.
    pub fn new(client: reqwest::Client, base_url: &str, path: &str) -> Self {
        let endpoint_url = if path.is_empty() {
            None
        } else {
            Some(format!("{}{}", base_url.trim_end_matches('/'), path))
        };
        Self {
            client,
            endpoint_url,
        }
    }

    /// Fetches the measurement value.
    ///
    /// `Ok(None)` means the device has no value for this measurement: the
    /// path is unconfigured, the endpoint answers 404, or the body is empty.
    /// Connection failures, other error statuses and unparseable bodies are
    /// reported as errors.
    pub async fn fetch(&self) -> Result<Option<f64>, anyhow::Error> {
        let url = match &self.endpoint_url {
            Some(url) => url,
            None => return Ok(None),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("Request to {url} answered with an error status"))?;

        let body = response
            .text()
            .await
            .with_context(|| format!("Cannot read response body from {url}"))?;
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let value = trimmed
            .parse::<f64>()
            .with_context(|| format!("Unparseable measurement value {trimmed:?} from {url}"))?;
        Ok(Some(value))
    }
}
