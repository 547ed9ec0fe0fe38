//! Node values carried by write and create requests, and conversion of
//! raw JSON command values into them.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::LwM2mClient;
use crate::error::ValueError;
use crate::model::{ModelProvider, ResourceType, resolve_object_model};
use crate::path::{NodeId, VersionedPath};

/// Reference to an object instance (`3:0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLink {
    pub object_id: NodeId,
    pub object_instance_id: NodeId,
}

impl FromStr for ObjectLink {
    type Err = ValueError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let err = || ValueError::Conversion {
            value: text.to_string(),
            expected: ResourceType::Objlnk.to_string(),
        };
        let (object, instance) = text.trim().split_once(':').ok_or_else(err)?;
        Ok(Self {
            object_id: object.parse().map_err(|_| err())?,
            object_instance_id: instance.parse().map_err(|_| err())?,
        })
    }
}

impl fmt::Display for ObjectLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_id, self.object_instance_id)
    }
}

/// Typed scalar value of a resource or resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceValue {
    String(String),
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
    Opaque(Vec<u8>),
    Time(DateTime<Utc>),
    Objlnk(ObjectLink),
}

impl ResourceValue {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::String(_) => ResourceType::String,
            Self::Integer(_) => ResourceType::Integer,
            Self::UnsignedInteger(_) => ResourceType::UnsignedInteger,
            Self::Float(_) => ResourceType::Float,
            Self::Boolean(_) => ResourceType::Boolean,
            Self::Opaque(_) => ResourceType::Opaque,
            Self::Time(_) => ResourceType::Time,
            Self::Objlnk(_) => ResourceType::Objlnk,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A resource with its value(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resource {
    Single {
        id: NodeId,
        value: ResourceValue,
    },
    Multiple {
        id: NodeId,
        resource_type: ResourceType,
        instances: BTreeMap<NodeId, ResourceValue>,
    },
}

impl Resource {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Single { id, .. } | Self::Multiple { id, .. } => *id,
        }
    }

    pub fn single_value(&self) -> Option<&ResourceValue> {
        match self {
            Self::Single { value, .. } => Some(value),
            Self::Multiple { .. } => None,
        }
    }
}

/// An object instance and the resources it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInstance {
    /// `None` lets the device pick the instance id on create.
    pub id: Option<NodeId>,
    pub resources: Vec<Resource>,
}

impl ObjectInstance {
    pub fn new(id: Option<NodeId>, resources: Vec<Resource>) -> Self {
        Self { id, resources }
    }

    pub fn resource(&self, id: NodeId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id() == id)
    }
}

/// Content of a write or composite write entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LwM2mNode {
    ObjectInstance(ObjectInstance),
    Resource(Resource),
    ResourceInstance { id: NodeId, value: ResourceValue },
}

/// Text of a JSON scalar as the device would see it (`"abc"` -> `abc`, `23.5` -> `23.5`).
pub fn scalar_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn conversion_error(raw: &Value, expected: ResourceType) -> ValueError {
    ValueError::Conversion {
        value: scalar_text(raw),
        expected: expected.to_string(),
    }
}

fn parse_epoch_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .or_else(|| digits.strip_prefix('#'))
    {
        Some(hex_digits) => i64::from_str_radix(hex_digits, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn json_object(raw: &Value) -> Result<Cow<'_, Map<String, Value>>, ValueError> {
    match raw {
        Value::Object(map) => Ok(Cow::Borrowed(map)),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(Cow::Owned(map)),
            _ => Err(ValueError::NotAMap(s.clone())),
        },
        other => Err(ValueError::NotAMap(other.to_string())),
    }
}

/// Convert a raw command value into a value of `expected` type.
pub fn convert_value(raw: &Value, expected: ResourceType) -> Result<ResourceValue, ValueError> {
    let text = scalar_text(raw);
    let err = || conversion_error(raw, expected);
    match expected {
        ResourceType::String => Ok(ResourceValue::String(text)),
        ResourceType::Integer => {
            // 32-bit parse, unsigned reinterpretation kept in a wider integer
            let parsed = text.trim().parse::<i32>().map_err(|_| err())?;
            Ok(ResourceValue::Integer(i64::from(parsed as u32)))
        }
        ResourceType::UnsignedInteger => text
            .trim()
            .parse::<u64>()
            .map(ResourceValue::UnsignedInteger)
            .map_err(|_| err()),
        ResourceType::Float => text
            .trim()
            .parse::<f64>()
            .map(ResourceValue::Float)
            .map_err(|_| err()),
        ResourceType::Boolean => match raw {
            Value::Bool(b) => Ok(ResourceValue::Boolean(*b)),
            _ if text.trim().eq_ignore_ascii_case("true") => Ok(ResourceValue::Boolean(true)),
            _ if text.trim().eq_ignore_ascii_case("false") => Ok(ResourceValue::Boolean(false)),
            _ => Err(err()),
        },
        ResourceType::Time => {
            let millis = parse_epoch_millis(&text).ok_or_else(err)?;
            DateTime::from_timestamp_millis(millis)
                .map(ResourceValue::Time)
                .ok_or_else(err)
        }
        ResourceType::Opaque => hex::decode(text.trim())
            .map(ResourceValue::Opaque)
            .map_err(|_| err()),
        ResourceType::Objlnk => text.parse().map(ResourceValue::Objlnk),
        ResourceType::Corelnk | ResourceType::None => {
            Err(ValueError::UnsupportedType(expected.to_string()))
        }
    }
}

/// Convert `{ "<instance id>": value, ... }` (or a string holding it) into
/// resource-instance values.
pub fn convert_multi_values(
    raw: &Value,
    expected: ResourceType,
) -> Result<BTreeMap<NodeId, ResourceValue>, ValueError> {
    let object = json_object(raw)?;

    let mut values = BTreeMap::new();
    for (key, value) in object.iter() {
        let id = key
            .trim()
            .parse::<NodeId>()
            .map_err(|_| ValueError::NotAMap(raw.to_string()))?;
        values.insert(id, convert_value(value, expected)?);
    }
    Ok(values)
}

/// Text form of an execute argument.
pub fn to_argument_text(raw: &Value) -> String {
    scalar_text(raw)
}

/// Build the resources of one object instance from `{ "<resource id>": value }`.
///
/// Resource ids unknown to the object model are skipped. Multi-instance
/// resources take a nested map of instance values.
pub fn build_resources_for_instance(
    provider: &dyn ModelProvider,
    client: &LwM2mClient,
    target: &VersionedPath,
    raw: &Value,
) -> Result<Vec<Resource>, ValueError> {
    let object = json_object(raw)?;
    let Some(model) = resolve_object_model(provider, client, target) else {
        return Ok(Vec::new());
    };

    let mut resources = Vec::with_capacity(object.len());
    for (key, value) in object.iter() {
        let Ok(id) = key.trim().parse::<NodeId>() else {
            continue;
        };
        let Some(resource_model) = model.resource(id) else {
            continue;
        };
        let resource = if resource_model.multiple {
            Resource::Multiple {
                id,
                resource_type: resource_model.resource_type,
                instances: convert_multi_values(value, resource_model.resource_type)?,
            }
        } else {
            Resource::Single {
                id,
                value: convert_value(value, resource_model.resource_type)?,
            }
        };
        resources.push(resource);
    }
    resources.sort_by_key(Resource::id);
    Ok(resources)
}
