//! Request log search.

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// One logged request; only the fields needed to recognise a request are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    pub id: String,
    /// Request headers as `[name, value]` pairs
    #[serde(default)]
    pub headers_in: Vec<(String, String)>,
}

impl RequestLogEntry {
    /// Whether the request carried `name: value` (name compared case-insensitively)
    #[must_use]
    pub fn has_header(&self, name: &str, value: &str) -> bool {
        self.headers_in
            .iter()
            .any(|(n, v)| n.eq_ignore_ascii_case(name) && v == value)
    }
}

/// Request log operations for a site
pub struct RequestsApi<'a> {
    client: &'a SigSciClient,
    site: &'a str,
}

impl<'a> RequestsApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, site: &'a str) -> Self {
        Self { client, site }
    }

    /// Search the request log with the dashboard query syntax
    /// (e.g. `from:-1min`).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn search(&self, query: &str) -> Result<Vec<RequestLogEntry>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/requests");
        let params = [("q".to_string(), query.to_string())];
        let envelope: DataEnvelope<RequestLogEntry> = self
            .client
            .get_json(&endpoint, Some(&params), "search requests")
            .await?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{Credentials, SigSciConfig};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_passes_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v0/corps/testcorp/sites/www/requests")
                    .query_param("q", "from:-1min");
                then.status(200).json_body(json!({"data": [
                    {"id": "r1", "headersIn": [["Host", "www.example.com"], ["X-Test", "abc"]]}
                ]}));
            })
            .await;

        let config = SigSciConfig::new(
            "user@example.com".to_string(),
            Credentials::api_token("t".to_string()),
            "testcorp".to_string(),
        )
        .with_base_url(format!("{}/api/v0", server.base_url()));
        let client = SigSciClient::new(config).expect("client should build");

        let entries = client
            .requests_api("www")
            .search("from:-1min")
            .await
            .expect("search should succeed");

        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].has_header("x-test", "abc"));
        assert!(!entries[0].has_header("X-Test", "abd"));
    }
}
