use serde::{Deserialize, Deserializer, Serialize};

use crate::acl::ScopeAttribute;

/// Claims carried by a cross-node token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    pub fn scopes(&self) -> ScopeAttribute {
        ScopeAttribute::parse(&self.scope)
    }
}

/// What a token must prove for one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedClaims {
    pub audience: String,
    pub scope: Vec<String>,
    pub jwks_url: String,
    pub issuer: String,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}
