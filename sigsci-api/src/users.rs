//! Corp users, their site memberships and per-site members.
//!
//! Users belong to the corp; a site member is a corp user granted a role on
//! one site. Inviting someone new to the corp can grant site memberships in
//! the same call.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// Roles accepted by the corp and site membership endpoints.
pub const VALID_ROLES: &[&str] = &["admin", "user", "observer", "owner"];

/// Role used when none (or an unknown one) is given.
pub const DEFAULT_ROLE: &str = "observer";

/// User as embedded in a site member record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_user: Option<bool>,
}

/// A user's role on one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMember {
    pub user: MemberUser,
    pub role: String,
}

/// A user of the corp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpUser {
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Corp-level role
    #[serde(default)]
    pub role: String,
    /// "active", "invited", ...
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub api_user: bool,
}

/// Site reference inside a membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSite {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
}

/// One site a user is a member of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub site: MembershipSite,
    pub role: String,
}

/// Site memberships granted by an invite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteMemberships {
    pub data: Vec<Membership>,
}

/// Body of `POST /corps/{corp}/users/{email}/invite`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteUserRequest {
    pub role: String,
    pub memberships: InviteMemberships,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub api_user: bool,
}

impl InviteUserRequest {
    /// Invite into the corp only, without site memberships
    #[must_use]
    pub fn corp(role: &str, api_user: bool) -> Self {
        Self {
            role: role.to_string(),
            memberships: InviteMemberships::default(),
            api_user,
        }
    }

    /// Invite into the corp as a plain user with `role` on `site`
    #[must_use]
    pub fn site(site: &str, role: &str, api_user: bool) -> Self {
        Self {
            role: "user".to_string(),
            memberships: InviteMemberships {
                data: vec![Membership {
                    site: MembershipSite {
                        name: site.to_string(),
                        display_name: String::new(),
                    },
                    role: role.to_string(),
                }],
            },
            api_user,
        }
    }
}

#[derive(Serialize)]
struct RoleUpdate<'r> {
    role: &'r str,
}

/// User-specific error types
#[derive(Debug)]
#[must_use = "Need to handle all error enum types."]
pub enum UserError {
    /// General API error
    Api(SigSciError),
    /// No such user (in the corp or on the site)
    UserNotFound(String),
    /// Rejected input
    InvalidInput(String),
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserError::Api(err) => write!(f, "API error: {err}"),
            UserError::UserNotFound(email) => write!(f, "User not found: {email}"),
            UserError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
        }
    }
}

impl std::error::Error for UserError {}

impl From<SigSciError> for UserError {
    fn from(err: SigSciError) -> Self {
        match err {
            SigSciError::NotFound(message) => UserError::UserNotFound(message),
            other => UserError::Api(other),
        }
    }
}

impl From<reqwest::Error> for UserError {
    fn from(err: reqwest::Error) -> Self {
        UserError::Api(SigSciError::Http(err))
    }
}

fn validate_email(email: &str) -> Result<(), UserError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(UserError::InvalidInput(format!(
            "'{email}' is not an email address"
        )));
    }
    Ok(())
}

/// User and membership operations
pub struct UsersApi<'a> {
    client: &'a SigSciClient,
}

impl<'a> UsersApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient) -> Self {
        Self { client }
    }

    fn user_path(&self, email: &str, suffix: &str) -> String {
        self.client
            .corp_path(&format!("/users/{}{suffix}", urlencoding::encode(email)))
    }

    fn member_path(&self, site: &str, email: &str) -> String {
        self.client
            .site_path(site, &format!("/members/{}", urlencoding::encode(email)))
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list_corp_users(&self) -> Result<Vec<CorpUser>, UserError> {
        let endpoint = self.client.corp_path("/users");
        let envelope: DataEnvelope<CorpUser> = self
            .client
            .get_json(&endpoint, None, "list corp users")
            .await?;
        Ok(envelope.data)
    }

    /// Invite a user to the corp.
    ///
    /// # Errors
    ///
    /// `UserError::InvalidInput` for a malformed email, otherwise any API failure.
    pub async fn invite_corp_user(
        &self,
        email: &str,
        request: &InviteUserRequest,
    ) -> Result<(), UserError> {
        validate_email(email)?;
        debug!("Inviting {email} with role {}", request.role);
        let endpoint = self.user_path(email.trim(), "/invite");
        self.client
            .send_unit(reqwest::Method::POST, &endpoint, Some(request), "invite user")
            .await?;
        Ok(())
    }

    /// Remove a user from the corp.
    ///
    /// # Errors
    ///
    /// `UserError::UserNotFound` when the corp has no such user.
    pub async fn delete_corp_user(&self, email: &str) -> Result<(), UserError> {
        validate_email(email)?;
        let endpoint = self.user_path(email.trim(), "");
        self.client
            .send_unit::<()>(reqwest::Method::DELETE, &endpoint, None, "delete corp user")
            .await?;
        Ok(())
    }

    /// Sites a user is a member of.
    ///
    /// # Errors
    ///
    /// `UserError::UserNotFound` when the corp has no such user.
    pub async fn list_memberships(&self, email: &str) -> Result<Vec<Membership>, UserError> {
        validate_email(email)?;
        let endpoint = self.user_path(email.trim(), "/memberships");
        let envelope: DataEnvelope<Membership> = self
            .client
            .get_json(&endpoint, None, "list memberships")
            .await?;
        Ok(envelope.data)
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list_site_members(&self, site: &str) -> Result<Vec<SiteMember>, UserError> {
        let endpoint = self.client.site_path(site, "/members");
        let envelope: DataEnvelope<SiteMember> = self
            .client
            .get_json(&endpoint, None, "list site members")
            .await?;
        Ok(envelope.data)
    }

    /// Grant (or change) a corp user's role on a site.
    ///
    /// # Errors
    ///
    /// `UserError::UserNotFound` when the user is not in the corp.
    pub async fn update_site_member(
        &self,
        site: &str,
        email: &str,
        role: &str,
    ) -> Result<(), UserError> {
        validate_email(email)?;
        let endpoint = self.member_path(site, email.trim());
        self.client
            .send_unit(
                reqwest::Method::PUT,
                &endpoint,
                Some(&RoleUpdate { role }),
                "update site member",
            )
            .await?;
        Ok(())
    }

    /// Remove a user from a site (the corp account stays).
    ///
    /// # Errors
    ///
    /// `UserError::UserNotFound` when the user is not a member.
    pub async fn delete_site_member(&self, site: &str, email: &str) -> Result<(), UserError> {
        validate_email(email)?;
        let endpoint = self.member_path(site, email.trim());
        self.client
            .send_unit::<()>(reqwest::Method::DELETE, &endpoint, None, "delete site member")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{Credentials, SigSciConfig};
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> SigSciClient {
        let config = SigSciConfig::new(
            "admin@example.com".to_string(),
            Credentials::api_token("t".to_string()),
            "testcorp".to_string(),
        )
        .with_base_url(format!("{}/api/v0", server.base_url()));
        SigSciClient::new(config).expect("client should build")
    }

    #[test]
    fn test_site_invite_body() {
        let request = InviteUserRequest::site("www", "observer", false);
        assert_eq!(
            serde_json::to_value(&request).expect("should serialize"),
            json!({
                "role": "user",
                "memberships": {"data": [{"site": {"name": "www"}, "role": "observer"}]}
            })
        );

        let api = InviteUserRequest::corp("admin", true);
        let value = serde_json::to_value(&api).expect("should serialize");
        assert_eq!(value["apiUser"], true);
        assert_eq!(value["memberships"], json!({"data": []}));
    }

    #[tokio::test]
    async fn test_update_site_member_puts_role() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path_contains("/api/v0/corps/testcorp/sites/www/members/jane")
                    .json_body(json!({"role": "admin"}));
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = client_for(&server);
        client
            .users_api()
            .update_site_member("www", "jane@example.com", "admin")
            .await
            .expect("update should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_unknown_user() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path_contains("/api/v0/corps/testcorp/users/ghost");
                then.status(404).json_body(json!({"message": "User not found"}));
            })
            .await;

        let client = client_for(&server);
        let result = client.users_api().delete_corp_user("ghost@example.com").await;
        assert!(matches!(result, Err(UserError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected_without_request() {
        let server = MockServer::start_async().await;
        let client = client_for(&server);
        let result = client.users_api().delete_site_member("www", "not-an-email").await;
        assert!(matches!(result, Err(UserError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_list_memberships() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_contains("/api/v0/corps/testcorp/users/jane")
                    .path_contains("/memberships");
                then.status(200).json_body(json!({"data": [
                    {"site": {"name": "www", "displayName": "Main"}, "role": "admin"}
                ]}));
            })
            .await;

        let client = client_for(&server);
        let memberships = client
            .users_api()
            .list_memberships("jane@example.com")
            .await
            .expect("list should succeed");
        assert_eq!(memberships[0].site.display_name, "Main");
        assert_eq!(memberships[0].role, "admin");
    }
}
