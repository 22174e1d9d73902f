use crate::record::Clinic;

/// Client-observed transport failures.
#[derive(Debug)]
pub enum FeedError {
    /// Request-level failure (connect, timeout, body decode).
    Http(reqwest::Error),
    /// Server answered with a non-success status.
    Status(u16),
}

impl From<reqwest::Error> for FeedError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Source of clinic snapshots for the polling loop.
pub trait ClinicFeed: Send + 'static {
    /// Fetches the full clinic list.
    fn fetch_clinics(&self) -> impl Future<Output = Result<Vec<Clinic>, FeedError>> + Send;
}

/// [`ClinicFeed`] over the server's `GET /api/clinics` endpoint.
pub struct HttpClinicFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClinicFeed {
    /// Creates a feed against `base_url` (e.g. `http://localhost:3001`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl ClinicFeed for HttpClinicFeed {
    async fn fetch_clinics(&self) -> Result<Vec<Clinic>, FeedError> {
        let url = format!("{}/api/clinics", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }
        Ok(resp.json::<Vec<Clinic>>().await?)
    }
}
