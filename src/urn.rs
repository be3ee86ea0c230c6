//! Urn - canonical address of a discovered entity
//!
//! ```text
//! urn:<cloud>:<account_id>:<region>:<service>:<resource_type>:<resource_id>
//! urn:aws:111111111111:eu-west-2:ec2:vpc:vpc-11111111
//! ```
//!
//! Subresources have no provider-wide identity of their own, so their urn
//! carries the parent's id as well: `...:iam:role_policy:test-role/test-policy`.
//! Forward slashes and backslashes inside ids are escaped as `\/` and `\\`.

use crate::error::UrnParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud name used when a provider does not declare its own
pub const DEFAULT_CLOUD: &str = "aws";

/// Identifies exactly one resource, subresource, or the owner of a
/// secondary attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Urn {
    cloud_name: String,
    account_id: String,
    region: String,
    service: String,
    resource_type: String,
    resource_id: String,
    parent_resource_id: Option<String>,
}

impl Urn {
    pub fn new(
        account_id: &str,
        region: &str,
        service: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Self {
        Self {
            cloud_name: DEFAULT_CLOUD.to_string(),
            account_id: account_id.to_string(),
            region: region.to_string(),
            service: service.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            parent_resource_id: None,
        }
    }

    /// Urn of a subresource that is only addressable through its parent
    pub fn subresource(
        account_id: &str,
        region: &str,
        service: &str,
        resource_type: &str,
        parent_resource_id: &str,
        resource_id: &str,
    ) -> Self {
        Self {
            parent_resource_id: Some(parent_resource_id.to_string()),
            ..Self::new(account_id, region, service, resource_type, resource_id)
        }
    }

    /// Replace the cloud name (defaults to `aws`)
    pub fn with_cloud(mut self, cloud_name: &str) -> Self {
        self.cloud_name = cloud_name.to_string();
        self
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn parent_resource_id(&self) -> Option<&str> {
        self.parent_resource_id.as_deref()
    }

    pub fn is_subresource(&self) -> bool {
        self.parent_resource_id.is_some()
    }

    /// Whether this urn falls inside the given (service, type, region, account)
    pub fn in_scope(&self, service: &str, resource_type: &str, region: &str, account_id: &str) -> bool {
        self.service == service
            && self.resource_type == resource_type
            && self.region == region
            && self.account_id == account_id
    }
}

fn escape_id(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for c in id.chars() {
        if c == '\\' || c == '/' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unescape_id(id: &str) -> String {
    let mut unescaped = String::with_capacity(id.len());
    let mut chars = id.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => unescaped.extend(chars.next()),
            c => unescaped.push(c),
        }
    }
    unescaped
}

/// Split `parent/child` on the first slash that is not escaped
fn split_parent(id_part: &str) -> Option<(&str, &str)> {
    let mut chars = id_part.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '/' => return Some((&id_part[..idx], &id_part[idx + 1..])),
            _ => {}
        }
    }
    None
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urn:{}:{}:{}:{}:{}:",
            self.cloud_name, self.account_id, self.region, self.service, self.resource_type
        )?;
        match &self.parent_resource_id {
            Some(parent) => write!(f, "{}/{}", escape_id(parent), escape_id(&self.resource_id)),
            None => write!(f, "{}", escape_id(&self.resource_id)),
        }
    }
}

impl FromStr for Urn {
    type Err = UrnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Ids may themselves contain colons (ARNs), so only the first six split
        let parts: Vec<&str> = s.splitn(7, ':').collect();
        if parts[0] != "urn" {
            return Err(UrnParseError::MissingPrefix(s.to_string()));
        }
        if parts.len() < 7 {
            return Err(UrnParseError::TooFewSegments {
                urn: s.to_string(),
                found: parts.len(),
            });
        }

        let (parent_resource_id, resource_id) = match split_parent(parts[6]) {
            Some((parent, child)) => (Some(unescape_id(parent)), unescape_id(child)),
            None => (None, unescape_id(parts[6])),
        };

        Ok(Self {
            cloud_name: parts[1].to_string(),
            account_id: parts[2].to_string(),
            region: parts[3].to_string(),
            service: parts[4].to_string(),
            resource_type: parts[5].to_string(),
            resource_id,
            parent_resource_id,
        })
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.to_string()
    }
}

impl TryFrom<String> for Urn {
    type Error = UrnParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
