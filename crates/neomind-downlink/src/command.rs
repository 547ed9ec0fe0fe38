//! Downlink command data structures.
//!
//! A [`Command`] is the high-level request a caller hands to the handler:
//! one variant per operation, each carrying only the fields its
//! construction rule needs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::ObjectAttributes;
use crate::content_format::ContentFormat;
use crate::node::LwM2mNode;
use crate::path::{LwM2mPath, VersionedPath};

/// Command addressing a single path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCommand {
    pub target: VersionedPath,
    /// Overrides content-format negotiation when set.
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TargetCommand {
    pub fn new(target: impl Into<VersionedPath>) -> Self {
        Self {
            target: target.into(),
            content_format: None,
            timeout_ms: None,
        }
    }

    pub fn with_content_format(mut self, format: ContentFormat) -> Self {
        self.content_format = Some(format);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Command addressing several paths in one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeCommand {
    pub paths: Vec<LwM2mPath>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl CompositeCommand {
    pub fn new(paths: Vec<LwM2mPath>) -> Self {
        Self {
            paths,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteCommand {
    pub target: VersionedPath,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecuteCommand {
    pub fn new(target: impl Into<VersionedPath>) -> Self {
        Self {
            target: target.into(),
            params: None,
            timeout_ms: None,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Replace or partial-update write of one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCommand {
    pub target: VersionedPath,
    pub value: serde_json::Value,
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl WriteCommand {
    pub fn new(target: impl Into<VersionedPath>, value: serde_json::Value) -> Self {
        Self {
            target: target.into(),
            value,
            content_format: None,
            timeout_ms: None,
        }
    }

    pub fn with_content_format(mut self, format: ContentFormat) -> Self {
        self.content_format = Some(format);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Write of a pre-built node map in one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCompositeCommand {
    pub nodes: BTreeMap<LwM2mPath, LwM2mNode>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteAttributesCommand {
    pub target: VersionedPath,
    #[serde(default)]
    pub attributes: Option<ObjectAttributes>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Instance creation. Either `value` (one instance) or `nodes`
/// (instance id to instance values) supplies the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommand {
    pub target: VersionedPath,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub nodes: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl CreateCommand {
    pub fn new(target: impl Into<VersionedPath>) -> Self {
        Self {
            target: target.into(),
            value: None,
            nodes: None,
            content_format: None,
            timeout_ms: None,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_nodes(mut self, nodes: BTreeMap<String, serde_json::Value>) -> Self {
        self.nodes = Some(nodes);
        self
    }
}

/// Downlink command, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Read(TargetCommand),
    ReadComposite(CompositeCommand),
    Observe(TargetCommand),
    ObserveComposite(CompositeCommand),
    /// List active observations.
    ObserveAll,
    CancelObserve(TargetCommand),
    CancelObserveComposite(CompositeCommand),
    CancelObserveAll,
    Discover(TargetCommand),
    /// Object links from the registration.
    DiscoverAll,
    Execute(ExecuteCommand),
    Delete(TargetCommand),
    WriteReplace(WriteCommand),
    WriteUpdate(WriteCommand),
    WriteComposite(WriteCompositeCommand),
    WriteAttributes(WriteAttributesCommand),
    Create(CreateCommand),
}

impl Command {
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::Read(_) => "Read",
            Command::ReadComposite(_) => "ReadComposite",
            Command::Observe(_) => "Observe",
            Command::ObserveComposite(_) => "ObserveComposite",
            Command::ObserveAll => "ObserveAll",
            Command::CancelObserve(_) => "CancelObserve",
            Command::CancelObserveComposite(_) => "CancelObserveComposite",
            Command::CancelObserveAll => "CancelObserveAll",
            Command::Discover(_) => "Discover",
            Command::DiscoverAll => "DiscoverAll",
            Command::Execute(_) => "Execute",
            Command::Delete(_) => "Delete",
            Command::WriteReplace(_) => "WriteReplace",
            Command::WriteUpdate(_) => "WriteUpdate",
            Command::WriteComposite(_) => "WriteComposite",
            Command::WriteAttributes(_) => "WriteAttributes",
            Command::Create(_) => "Create",
        }
    }

    /// Per-command timeout, if the caller set one.
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Command::Read(c)
            | Command::Observe(c)
            | Command::CancelObserve(c)
            | Command::Discover(c)
            | Command::Delete(c) => c.timeout_ms,
            Command::ReadComposite(c)
            | Command::ObserveComposite(c)
            | Command::CancelObserveComposite(c) => c.timeout_ms,
            Command::Execute(c) => c.timeout_ms,
            Command::WriteReplace(c) | Command::WriteUpdate(c) => c.timeout_ms,
            Command::WriteComposite(c) => c.timeout_ms,
            Command::WriteAttributes(c) => c.timeout_ms,
            Command::Create(c) => c.timeout_ms,
            Command::ObserveAll | Command::CancelObserveAll | Command::DiscoverAll => None,
        }
    }
}

fn join_paths(paths: &[LwM2mPath]) -> String {
    paths
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.type_name();
        match self {
            Command::Read(c)
            | Command::Observe(c)
            | Command::CancelObserve(c)
            | Command::Discover(c)
            | Command::Delete(c) => write!(f, "{} [{}]", name, c.target),
            Command::ReadComposite(c)
            | Command::ObserveComposite(c)
            | Command::CancelObserveComposite(c) => {
                write!(f, "{} [{}]", name, join_paths(&c.paths))
            }
            Command::Execute(c) => write!(f, "{} [{}]", name, c.target),
            Command::WriteReplace(c) | Command::WriteUpdate(c) => {
                write!(f, "{} [{}] value={}", name, c.target, c.value)
            }
            Command::WriteComposite(c) => {
                let paths: Vec<_> = c.nodes.keys().copied().collect();
                write!(f, "{} [{}]", name, join_paths(&paths))
            }
            Command::WriteAttributes(c) => write!(f, "{} [{}]", name, c.target),
            Command::Create(c) => write!(f, "{} [{}]", name, c.target),
            Command::ObserveAll | Command::CancelObserveAll | Command::DiscoverAll => {
                f.write_str(name)
            }
        }
    }
}
