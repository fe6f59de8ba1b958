//! Identity, scope and credential types shared by every reconciliation pass

use serde::{Deserialize, Serialize};
use std::fmt;

/// A record or observation that carries the provider-assigned identity.
///
/// `global_id` is the key the comparator matches on. Within one
/// (provider, region, resource type) scope it must be unique.
pub trait Externalized {
    fn global_id(&self) -> &str;
}

/// Acting credential, passed through unchanged to persistence and audit calls
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user: user.into(),
            project_id: None,
            token: None,
        }
    }

    /// The credential used by scheduled, non-interactive passes
    pub fn system() -> Self {
        Self::new("system", "sysadmin")
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("user_id", &self.user_id)
            .field("user", &self.user)
            .field("project_id", &self.project_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.user, self.user_id)
    }
}

/// A cloud region as known to the local database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Local identity
    pub id: String,
    pub name: String,
    /// Provider-assigned identity
    pub external_id: String,
    /// Provider name (e.g. "aliyun", "aws")
    pub provider: String,
}

impl Region {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        external_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            external_id: external_id.into(),
            provider: provider.into(),
        }
    }
}

/// Namespace of one reconciliation pass: a resource type within one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncScope {
    /// Resource type keyword (e.g. "nat_sku")
    pub resource_type: String,
    pub provider: String,
    /// Local region identity; also the lock key
    pub region_id: String,
    /// Provider-side region identity, used to query the provider
    pub region_external_id: String,
}

impl SyncScope {
    pub fn new(resource_type: impl Into<String>, region: &Region) -> Self {
        Self {
            resource_type: resource_type.into(),
            provider: region.provider.clone(),
            region_id: region.id.clone(),
            region_external_id: region.external_id.clone(),
        }
    }

    /// Lock namespace and key for this scope
    pub fn lock_key(&self) -> (&str, &str) {
        (&self.resource_type, &self.region_id)
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.resource_type, self.provider, self.region_id
        )
    }
}
