//! Notification and property attributes for write-attributes requests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute parameters as supplied by a command. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    pub pmax: Option<i64>,
    pub pmin: Option<i64>,
    pub gt: Option<f64>,
    pub lt: Option<f64>,
    pub st: Option<f64>,
    pub epmax: Option<i64>,
    pub epmin: Option<i64>,
    /// Read-only on most devices.
    pub dim: Option<i64>,
    pub ssid: Option<i64>,
    pub uri: Option<String>,
    pub lwm2m: Option<String>,
    pub ver: Option<String>,
}

/// Attribute names understood by devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeName {
    MaximumPeriod,
    MinimumPeriod,
    GreaterThan,
    LesserThan,
    Step,
    EvaluateMaximumPeriod,
    EvaluateMinimumPeriod,
    Dimension,
    ShortServerId,
    ServerUri,
    EnablerVersion,
    ObjectVersion,
}

impl AttributeName {
    /// Link-format parameter name.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MaximumPeriod => "pmax",
            Self::MinimumPeriod => "pmin",
            Self::GreaterThan => "gt",
            Self::LesserThan => "lt",
            Self::Step => "st",
            Self::EvaluateMaximumPeriod => "epmax",
            Self::EvaluateMinimumPeriod => "epmin",
            Self::Dimension => "dim",
            Self::ShortServerId => "ssid",
            Self::ServerUri => "uri",
            Self::EnablerVersion => "lwm2m",
            Self::ObjectVersion => "ver",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: AttributeName,
    pub value: AttributeValue,
}

/// Ordered collection of attributes to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet(Vec<Attribute>);

impl AttributeSet {
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    pub fn get(&self, name: AttributeName) -> Option<&AttributeValue> {
        self.0.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Query-string form, e.g. `pmin=10&pmax=100`.
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .map(|a| format!("{}={}", a.name.code(), a.value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

type Extract = fn(&ObjectAttributes) -> Option<AttributeValue>;
type Accept = fn(&AttributeValue) -> bool;

fn any(_: &AttributeValue) -> bool {
    true
}

fn non_negative(value: &AttributeValue) -> bool {
    matches!(value, AttributeValue::Integer(v) if *v >= 0)
}

fn dimension(value: &AttributeValue) -> bool {
    matches!(value, AttributeValue::Integer(v) if (0..=255).contains(v))
}

fn non_empty(value: &AttributeValue) -> bool {
    matches!(value, AttributeValue::Text(v) if !v.is_empty())
}

/// Notification attributes first, then the read-only properties.
const ATTRIBUTE_TABLE: &[(AttributeName, Extract, Accept)] = &[
    (AttributeName::MaximumPeriod, |a| a.pmax.map(AttributeValue::Integer), non_negative),
    (AttributeName::MinimumPeriod, |a| a.pmin.map(AttributeValue::Integer), non_negative),
    (AttributeName::GreaterThan, |a| a.gt.map(AttributeValue::Float), any),
    (AttributeName::LesserThan, |a| a.lt.map(AttributeValue::Float), any),
    (AttributeName::Step, |a| a.st.map(AttributeValue::Float), any),
    (AttributeName::EvaluateMaximumPeriod, |a| a.epmax.map(AttributeValue::Integer), non_negative),
    (AttributeName::EvaluateMinimumPeriod, |a| a.epmin.map(AttributeValue::Integer), non_negative),
    (AttributeName::Dimension, |a| a.dim.map(AttributeValue::Integer), dimension),
    (AttributeName::ShortServerId, |a| a.ssid.map(AttributeValue::Integer), any),
    (AttributeName::ServerUri, |a| a.uri.clone().map(AttributeValue::Text), non_empty),
    (AttributeName::EnablerVersion, |a| a.lwm2m.clone().map(AttributeValue::Text), non_empty),
    (AttributeName::ObjectVersion, |a| a.ver.clone().map(AttributeValue::Text), non_empty),
];

impl From<&ObjectAttributes> for AttributeSet {
    fn from(params: &ObjectAttributes) -> Self {
        Self(
            ATTRIBUTE_TABLE
                .iter()
                .filter_map(|(name, extract, accept)| {
                    extract(params)
                        .filter(|value| accept(value))
                        .map(|value| Attribute { name: *name, value })
                })
                .collect(),
        )
    }
}
