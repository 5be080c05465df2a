use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{normalize_name, AclError};

/// A class of protected objects.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    #[default]
    Default,
    Files,
    Folders,
    Shares,
    Photos,
    Videos,
    Favorites,
    Albums,
    Moments,
    Calendar,
    People,
    Places,
    Labels,
    Config,
    Settings,
    Passcode,
    Password,
    Services,
    Users,
    Sessions,
    Logs,
    Api,
    #[serde(rename = "webdav")]
    WebDav,
    Metrics,
    Vision,
    Feedback,
    Cluster,
}

impl Resource {
    pub const ALL: [Resource; 27] = [
        Resource::Default,
        Resource::Files,
        Resource::Folders,
        Resource::Shares,
        Resource::Photos,
        Resource::Videos,
        Resource::Favorites,
        Resource::Albums,
        Resource::Moments,
        Resource::Calendar,
        Resource::People,
        Resource::Places,
        Resource::Labels,
        Resource::Config,
        Resource::Settings,
        Resource::Passcode,
        Resource::Password,
        Resource::Services,
        Resource::Users,
        Resource::Sessions,
        Resource::Logs,
        Resource::Api,
        Resource::WebDav,
        Resource::Metrics,
        Resource::Vision,
        Resource::Feedback,
        Resource::Cluster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Default => "default",
            Resource::Files => "files",
            Resource::Folders => "folders",
            Resource::Shares => "shares",
            Resource::Photos => "photos",
            Resource::Videos => "videos",
            Resource::Favorites => "favorites",
            Resource::Albums => "albums",
            Resource::Moments => "moments",
            Resource::Calendar => "calendar",
            Resource::People => "people",
            Resource::Places => "places",
            Resource::Labels => "labels",
            Resource::Config => "config",
            Resource::Settings => "settings",
            Resource::Passcode => "passcode",
            Resource::Password => "password",
            Resource::Services => "services",
            Resource::Users => "users",
            Resource::Sessions => "sessions",
            Resource::Logs => "logs",
            Resource::Api => "api",
            Resource::WebDav => "webdav",
            Resource::Metrics => "metrics",
            Resource::Vision => "vision",
            Resource::Feedback => "feedback",
            Resource::Cluster => "cluster",
        }
    }

    /// Only these resources accept tokens signed by the cluster portal.
    pub fn accepts_cluster_tokens(&self) -> bool {
        matches!(self, Resource::Cluster | Resource::Vision)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        if name.is_empty() {
            return Ok(Resource::Default);
        }

        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| AclError::UnknownResource(s.to_string()))
    }
}
