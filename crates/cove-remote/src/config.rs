use crate::error::{Error, Result};

/// Connection settings for one backend project. Constructed explicitly and
/// handed to [`RemoteClient::new`]; there is no process-global client.
///
/// [`RemoteClient::new`]: crate::client::RemoteClient::new
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// HTTP base, e.g. `https://project.example.co`
    pub base_url: String,
    /// Websocket endpoint of the change feed
    pub realtime_url: String,
    /// Project API key, sent on every request
    pub api_key: String,
    /// Bearer token; defaults to the API key for anonymous access
    pub access_token: String,
    /// Blob storage bucket
    pub bucket: String,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let api_key = api_key.into();
        Self {
            realtime_url: derive_realtime_url(&base_url),
            access_token: api_key.clone(),
            bucket: "chat".into(),
            base_url,
            api_key,
        }
    }

    /// Read settings from the environment. `COVE_URL` and `COVE_API_KEY` are
    /// required; the rest fall back to derived values.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("COVE_URL").map_err(|_| Error::Config("COVE_URL"))?;
        let api_key = std::env::var("COVE_API_KEY").map_err(|_| Error::Config("COVE_API_KEY"))?;

        let mut config = Self::new(base_url, api_key);
        if let Ok(url) = std::env::var("COVE_REALTIME_URL") {
            config.realtime_url = url;
        }
        if let Ok(token) = std::env::var("COVE_ACCESS_TOKEN") {
            config.access_token = token;
        }
        if let Ok(bucket) = std::env::var("COVE_BUCKET") {
            config.bucket = bucket;
        }
        Ok(config)
    }
}

/// Change feed endpoint on the same host: http(s) scheme swapped for ws(s).
fn derive_realtime_url(base_url: &str) -> String {
    let ws = base_url.replacen("http", "ws", 1);
    format!("{}/realtime/v1", ws.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_url_swaps_scheme_and_appends_endpoint() {
        assert_eq!(
            derive_realtime_url("https://project.example.co"),
            "wss://project.example.co/realtime/v1"
        );
        assert_eq!(
            derive_realtime_url("http://localhost:54321/"),
            "ws://localhost:54321/realtime/v1"
        );
    }

    #[test]
    fn new_defaults_token_and_bucket() {
        let config = RemoteConfig::new("https://project.example.co", "anon-key");
        assert_eq!(config.access_token, "anon-key");
        assert_eq!(config.bucket, "chat");
        assert_eq!(config.realtime_url, "wss://project.example.co/realtime/v1");
    }
}
