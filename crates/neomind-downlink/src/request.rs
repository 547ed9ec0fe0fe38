//! Protocol requests handed to the transport, and its responses.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeSet;
use crate::client::Link;
use crate::content_format::ContentFormat;
use crate::node::{LwM2mNode, ObjectInstance};
use crate::path::{LwM2mPath, NodeId, PathLevel};

/// Observe target, typed by the depth it addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObserveTarget {
    Object(NodeId),
    ObjectInstance(NodeId, NodeId),
    Resource(NodeId, NodeId, NodeId),
    ResourceInstance(NodeId, NodeId, NodeId, NodeId),
}

impl ObserveTarget {
    pub fn path(&self) -> LwM2mPath {
        match *self {
            Self::Object(o) => LwM2mPath::object(o),
            Self::ObjectInstance(o, i) => LwM2mPath::object_instance(o, i),
            Self::Resource(o, i, r) => LwM2mPath::resource(o, i, r),
            Self::ResourceInstance(o, i, r, ri) => LwM2mPath::resource_instance(o, i, r, ri),
        }
    }

    pub fn level(&self) -> PathLevel {
        self.path().level()
    }
}

impl From<LwM2mPath> for ObserveTarget {
    fn from(path: LwM2mPath) -> Self {
        match (
            path.object_instance_id,
            path.resource_id,
            path.resource_instance_id,
        ) {
            (Some(i), Some(r), Some(ri)) => Self::ResourceInstance(path.object_id, i, r, ri),
            (Some(i), Some(r), None) => Self::Resource(path.object_id, i, r),
            (Some(i), None, _) => Self::ObjectInstance(path.object_id, i),
            _ => Self::Object(path.object_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    Replace,
    Update,
}

/// Request ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DownlinkRequest {
    Read {
        format: ContentFormat,
        path: LwM2mPath,
    },
    ReadComposite {
        request_format: ContentFormat,
        response_format: ContentFormat,
        paths: Vec<LwM2mPath>,
    },
    Observe {
        format: ContentFormat,
        target: ObserveTarget,
    },
    ObserveComposite {
        request_format: ContentFormat,
        response_format: ContentFormat,
        paths: Vec<LwM2mPath>,
    },
    Discover {
        path: LwM2mPath,
    },
    Execute {
        path: LwM2mPath,
        arguments: Option<String>,
    },
    Delete {
        path: LwM2mPath,
    },
    Write {
        mode: WriteMode,
        format: ContentFormat,
        path: LwM2mPath,
        node: LwM2mNode,
    },
    WriteComposite {
        format: ContentFormat,
        nodes: BTreeMap<LwM2mPath, LwM2mNode>,
    },
    WriteAttributes {
        path: LwM2mPath,
        attributes: AttributeSet,
    },
    Create {
        format: ContentFormat,
        object_id: NodeId,
        instances: Vec<ObjectInstance>,
    },
}

impl DownlinkRequest {
    /// Request type name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "ReadRequest",
            Self::ReadComposite { .. } => "ReadCompositeRequest",
            Self::Observe { .. } => "ObserveRequest",
            Self::ObserveComposite { .. } => "ObserveCompositeRequest",
            Self::Discover { .. } => "DiscoverRequest",
            Self::Execute { .. } => "ExecuteRequest",
            Self::Delete { .. } => "DeleteRequest",
            Self::Write { .. } => "WriteRequest",
            Self::WriteComposite { .. } => "WriteCompositeRequest",
            Self::WriteAttributes { .. } => "WriteAttributesRequest",
            Self::Create { .. } => "CreateRequest",
        }
    }

    /// Paths the request addresses.
    pub fn paths(&self) -> Vec<LwM2mPath> {
        match self {
            Self::Read { path, .. }
            | Self::Discover { path }
            | Self::Execute { path, .. }
            | Self::Delete { path }
            | Self::Write { path, .. }
            | Self::WriteAttributes { path, .. } => vec![*path],
            Self::Observe { target, .. } => vec![target.path()],
            Self::ReadComposite { paths, .. } | Self::ObserveComposite { paths, .. } => {
                paths.clone()
            }
            Self::WriteComposite { nodes, .. } => nodes.keys().copied().collect(),
            Self::Create { object_id, .. } => vec![LwM2mPath::object(*object_id)],
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::ReadComposite { .. } | Self::ObserveComposite { .. } | Self::WriteComposite { .. }
        )
    }

    pub fn content_format(&self) -> Option<ContentFormat> {
        match self {
            Self::Read { format, .. }
            | Self::Observe { format, .. }
            | Self::Write { format, .. }
            | Self::WriteComposite { format, .. }
            | Self::Create { format, .. } => Some(*format),
            Self::ReadComposite { request_format, .. }
            | Self::ObserveComposite { request_format, .. } => Some(*request_format),
            Self::Discover { .. }
            | Self::Execute { .. }
            | Self::Delete { .. }
            | Self::WriteAttributes { .. } => None,
        }
    }
}

impl fmt::Display for DownlinkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths = self.paths();
        if self.is_composite() {
            let joined: Vec<String> = paths.iter().map(ToString::to_string).collect();
            write!(f, "{} to [{}]", self.kind(), joined.join(", "))
        } else {
            match paths.first() {
                Some(path) => write!(f, "{} to {}", self.kind(), path),
                None => f.write_str(self.kind()),
            }
        }
    }
}

/// CoAP response code class of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseCode {
    Created,
    Deleted,
    Changed,
    Content,
    BadRequest,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    UnsupportedContentFormat,
    InternalServerError,
}

impl ResponseCode {
    /// `2.xx` class.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Deleted | Self::Changed | Self::Content
        )
    }

    /// Dotted CoAP code, e.g. `2.05`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "2.01",
            Self::Deleted => "2.02",
            Self::Changed => "2.04",
            Self::Content => "2.05",
            Self::BadRequest => "4.00",
            Self::Unauthorized => "4.01",
            Self::NotFound => "4.04",
            Self::MethodNotAllowed => "4.05",
            Self::NotAcceptable => "4.06",
            Self::UnsupportedContentFormat => "4.15",
            Self::InternalServerError => "5.00",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded payload of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseContent {
    Node(LwM2mNode),
    Nodes(BTreeMap<LwM2mPath, LwM2mNode>),
    Links(Vec<Link>),
}

/// Response delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownlinkResponse {
    pub code: ResponseCode,
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl DownlinkResponse {
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            content: None,
            error_message: None,
        }
    }

    pub fn with_content(mut self, content: ResponseContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn error(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            content: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}
