//! Custom signal (tag) functionality at corp or site scope.

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, Scope, SigSciClient, SigSciError};

/// A custom signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSignal {
    /// Fully qualified name such as `site.my-signal` or `corp.shared-signal`
    #[serde(default)]
    pub tag_name: String,
    pub short_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSignalRequest<'s> {
    short_name: &'s str,
    description: &'s str,
}

/// Custom signal operations for one scope
pub struct SignalsApi<'a> {
    client: &'a SigSciClient,
    scope: Scope<'a>,
}

impl<'a> SignalsApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, scope: Scope<'a>) -> Self {
        Self { client, scope }
    }

    fn endpoint(&self) -> String {
        match self.scope {
            Scope::Corp => self.client.corp_path("/tags"),
            Scope::Site(site) => self.client.site_path(site, "/tags"),
        }
    }

    /// List custom signals in scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<CustomSignal>, SigSciError> {
        let envelope: DataEnvelope<CustomSignal> = self
            .client
            .get_json(&self.endpoint(), None, "list custom signals")
            .await?;
        Ok(envelope.data)
    }

    /// Create a custom signal. The tag name is derived by the API from the
    /// short name and scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the signal.
    pub async fn create(&self, signal: &CustomSignal) -> Result<CustomSignal, SigSciError> {
        let request = CreateSignalRequest {
            short_name: &signal.short_name,
            description: &signal.description,
        };
        self.client
            .send_json(
                reqwest::Method::POST,
                &self.endpoint(),
                &request,
                "create custom signal",
            )
            .await
    }
}
