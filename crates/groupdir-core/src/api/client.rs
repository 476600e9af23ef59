//! Client for the directory's group provisioning feeds.
//!
//! Every operation goes through the same steps: verify the session, attach
//! its token, send, classify the response, then map the body.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use super::classify::{classify, Outcome};
use super::error::{truncate_body, ApiError};
use super::transport::{HttpRequest, Transport, ATOM_CONTENT_TYPE};
use crate::auth::SessionManager;
use crate::models::{member_entry, parse_groups, parse_member, Group, Member};

/// Directory API client. Clone is cheap; clones share the session.
#[derive(Clone)]
pub struct DirectoryClient {
    session: SessionManager,
    transport: Arc<dyn Transport>,
    base_url: Url,
}

impl DirectoryClient {
    pub fn new(
        session: SessionManager,
        transport: Arc<dyn Transport>,
        api_base_url: &str,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", api_base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(api_base_url.to_string()));
        }

        Ok(Self {
            session,
            transport,
            base_url,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // ===== Operations =====

    /// List every group in the domain
    pub async fn list_groups(&self) -> Result<Vec<Group>, ApiError> {
        let body = self
            .execute(Method::GET, |domain| self.endpoint(&[domain]), None)
            .await?;
        let groups = Self::groups_from(&body)?;
        debug!(count = groups.len(), "Fetched groups");
        Ok(groups)
    }

    /// List the groups an address belongs to
    pub async fn groups_for_member(&self, address: &str) -> Result<Vec<Group>, ApiError> {
        let body = self
            .execute(
                Method::GET,
                |domain| {
                    let mut url = self.endpoint(&[domain, ""]);
                    url.query_pairs_mut().append_pair("member", address);
                    url
                },
                None,
            )
            .await?;
        let groups = Self::groups_from(&body)?;
        debug!(address, count = groups.len(), "Fetched groups for member");
        Ok(groups)
    }

    pub async fn add_member(&self, address: &str, group: &str) -> Result<Member, ApiError> {
        debug!(address, group, "Adding member to group");
        let body = self
            .execute(
                Method::POST,
                |domain| self.endpoint(&[domain, group, "member"]),
                Some(member_entry(address)),
            )
            .await?;
        Ok(parse_member(&body, address)?)
    }

    /// Remove an address from a group. The service only returns a body on error.
    pub async fn remove_member(&self, address: &str, group: &str) -> Result<(), ApiError> {
        debug!(address, group, "Removing member from group");
        self.execute(
            Method::DELETE,
            |domain| self.endpoint(&[domain, group, "member", address]),
            None,
        )
        .await?;
        Ok(())
    }

    fn groups_from(body: &str) -> Result<Vec<Group>, ApiError> {
        parse_groups(body).map_err(|e| {
            debug!(body = %truncate_body(body), "Unparseable group feed");
            e.into()
        })
    }

    /// Verify, send with the session token, classify. Returns the body on success.
    async fn execute(
        &self,
        method: Method,
        url: impl FnOnce(&str) -> Url,
        body: Option<String>,
    ) -> Result<String, ApiError> {
        let session = self.session.authorize().await?;
        let url = url(session.domain());
        debug!(%method, %url, "Directory request");

        let request = HttpRequest {
            method,
            url: url.to_string(),
            content_type: ATOM_CONTENT_TYPE,
            authorization: Some(session.authorization()),
            body,
        };
        let response = self.transport.execute(request).await.map_err(|e| {
            warn!(%url, error = %e, "Directory request failed");
            e
        })?;

        match classify(response.status, &response.body)? {
            Outcome::Err(err) => {
                debug!(%url, status = response.status, error = %err, "Directory service returned an error");
                Err(ApiError::Protocol(err))
            }
            Outcome::Ok | Outcome::OkNoBody => Ok(response.body),
        }
    }
}
