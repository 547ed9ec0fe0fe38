//! Object/instance/resource addressing.
//!
//! Paths are written `/3/0/9`; a versioned path may carry the object
//! version after the object id (`/3_1.2/0/9`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// Identifier of an object, instance, resource or resource instance.
pub type NodeId = u16;

/// Depth addressed by a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathLevel {
    Object,
    ObjectInstance,
    Resource,
    ResourceInstance,
}

/// Hierarchical address of a node on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LwM2mPath {
    pub object_id: NodeId,
    pub object_instance_id: Option<NodeId>,
    pub resource_id: Option<NodeId>,
    pub resource_instance_id: Option<NodeId>,
}

impl LwM2mPath {
    pub fn object(object_id: NodeId) -> Self {
        Self {
            object_id,
            object_instance_id: None,
            resource_id: None,
            resource_instance_id: None,
        }
    }

    pub fn object_instance(object_id: NodeId, instance_id: NodeId) -> Self {
        Self {
            object_instance_id: Some(instance_id),
            ..Self::object(object_id)
        }
    }

    pub fn resource(object_id: NodeId, instance_id: NodeId, resource_id: NodeId) -> Self {
        Self {
            resource_id: Some(resource_id),
            ..Self::object_instance(object_id, instance_id)
        }
    }

    pub fn resource_instance(
        object_id: NodeId,
        instance_id: NodeId,
        resource_id: NodeId,
        resource_instance_id: NodeId,
    ) -> Self {
        Self {
            resource_instance_id: Some(resource_instance_id),
            ..Self::resource(object_id, instance_id, resource_id)
        }
    }

    pub fn level(&self) -> PathLevel {
        if self.resource_instance_id.is_some() {
            PathLevel::ResourceInstance
        } else if self.resource_id.is_some() {
            PathLevel::Resource
        } else if self.object_instance_id.is_some() {
            PathLevel::ObjectInstance
        } else {
            PathLevel::Object
        }
    }

    pub fn is_object(&self) -> bool {
        self.level() == PathLevel::Object
    }

    pub fn is_object_instance(&self) -> bool {
        self.level() == PathLevel::ObjectInstance
    }

    pub fn is_resource(&self) -> bool {
        self.level() == PathLevel::Resource
    }

    pub fn is_resource_instance(&self) -> bool {
        self.level() == PathLevel::ResourceInstance
    }

    /// True when `self` equals `prefix` or is nested under it.
    pub fn starts_with(&self, prefix: &LwM2mPath) -> bool {
        let ours = self.segments();
        let theirs = prefix.segments();
        theirs.len() <= ours.len() && ours[..theirs.len()] == theirs[..]
    }

    fn segments(&self) -> Vec<NodeId> {
        std::iter::once(self.object_id)
            .chain(self.object_instance_id)
            .chain(self.resource_id)
            .chain(self.resource_instance_id)
            .collect()
    }

    fn from_segments(text: &str, segments: &[NodeId]) -> Result<Self, PathError> {
        match *segments {
            [] => Err(PathError::Empty),
            [o] => Ok(Self::object(o)),
            [o, i] => Ok(Self::object_instance(o, i)),
            [o, i, r] => Ok(Self::resource(o, i, r)),
            [o, i, r, ri] => Ok(Self::resource_instance(o, i, r, ri)),
            _ => Err(PathError::Invalid {
                path: text.to_string(),
                reason: "too many segments".to_string(),
            }),
        }
    }
}

fn parse_id(text: &str, segment: &str) -> Result<NodeId, PathError> {
    segment.parse::<NodeId>().map_err(|_| PathError::Invalid {
        path: text.to_string(),
        reason: format!("'{}' is not a valid id", segment),
    })
}

fn split_segments(text: &str) -> Result<Vec<&str>, PathError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return Err(PathError::Empty);
    }
    Ok(trimmed.trim_start_matches('/').split('/').collect())
}

impl FromStr for LwM2mPath {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let ids = split_segments(text)?
            .into_iter()
            .map(|s| parse_id(text, s))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_segments(text, &ids)
    }
}

impl fmt::Display for LwM2mPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.segments() {
            write!(f, "/{}", id)?;
        }
        Ok(())
    }
}

impl Serialize for LwM2mPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LwM2mPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A path whose object segment may carry a model version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionedPath {
    pub path: LwM2mPath,
    pub version: Option<String>,
}

impl VersionedPath {
    pub fn new(path: LwM2mPath) -> Self {
        Self {
            path,
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl From<LwM2mPath> for VersionedPath {
    fn from(path: LwM2mPath) -> Self {
        Self::new(path)
    }
}

impl FromStr for VersionedPath {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let segments = split_segments(text)?;
        let (object, version) = match segments[0].split_once('_') {
            Some((object, version)) if !version.is_empty() => (object, Some(version.to_string())),
            Some(_) => {
                return Err(PathError::Invalid {
                    path: text.to_string(),
                    reason: "empty object version".to_string(),
                });
            }
            None => (segments[0], None),
        };
        let mut ids = vec![parse_id(text, object)?];
        for segment in &segments[1..] {
            ids.push(parse_id(text, segment)?);
        }
        Ok(Self {
            path: LwM2mPath::from_segments(text, &ids)?,
            version,
        })
    }
}

impl TryFrom<String> for VersionedPath {
    type Error = PathError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<VersionedPath> for String {
    fn from(path: VersionedPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for VersionedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            None => write!(f, "{}", self.path),
            Some(version) => {
                write!(f, "/{}_{}", self.path.object_id, version)?;
                let full = self.path.to_string();
                let object_len = format!("/{}", self.path.object_id).len();
                f.write_str(&full[object_len..])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        let p: LwM2mPath = "/3".parse().unwrap();
        assert!(p.is_object());
        let p: LwM2mPath = "/3/0".parse().unwrap();
        assert!(p.is_object_instance());
        let p: LwM2mPath = "3/0/9".parse().unwrap();
        assert!(p.is_resource());
        assert_eq!(p.to_string(), "/3/0/9");
        let p: LwM2mPath = "/3/0/6/1".parse().unwrap();
        assert_eq!(p.level(), PathLevel::ResourceInstance);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<LwM2mPath>(), Err(PathError::Empty));
        assert!("/3/x".parse::<LwM2mPath>().is_err());
        assert!("/3/0/1/2/3".parse::<LwM2mPath>().is_err());
        assert!("/70000".parse::<LwM2mPath>().is_err());
    }

    #[test]
    fn test_starts_with() {
        let object: LwM2mPath = "/3".parse().unwrap();
        let resource: LwM2mPath = "/3/0/9".parse().unwrap();
        assert!(resource.starts_with(&object));
        assert!(resource.starts_with(&resource));
        assert!(!object.starts_with(&resource));
        assert!(!resource.starts_with(&"/4".parse().unwrap()));
    }

    #[test]
    fn test_versioned_path_roundtrip() {
        let p: VersionedPath = "/3_1.2/0/9".parse().unwrap();
        assert_eq!(p.path, LwM2mPath::resource(3, 0, 9));
        assert_eq!(p.version.as_deref(), Some("1.2"));
        assert_eq!(p.to_string(), "/3_1.2/0/9");

        let plain: VersionedPath = "/5/0".parse().unwrap();
        assert_eq!(plain.version, None);
        assert_eq!(plain.to_string(), "/5/0");
    }

    #[test]
    fn test_versioned_path_serde() {
        let p: VersionedPath = serde_json::from_str("\"/19_1.1/0/0\"").unwrap();
        assert_eq!(p.path.object_id, 19);
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"/19_1.1/0/0\"");
    }
}
