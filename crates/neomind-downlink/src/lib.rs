//! Downlink command handling for LwM2M devices.
//!
//! Provides:
//! - Command data structures, one variant per operation
//! - Content-format negotiation against device capabilities
//! - Request construction and validation
//! - Observation listing and cancellation
//! - Sleep-aware dispatch with callbacks on a bounded pool

pub mod attributes;
pub mod builder;
pub mod callback;
pub mod classifier;
pub mod client;
pub mod command;
pub mod config;
pub mod content_format;
pub mod dispatcher;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod gate;
pub mod handler;
pub mod model;
pub mod negotiator;
pub mod node;
pub mod observation;
pub mod path;
pub mod request;
pub mod transport;

// Re-exports
pub use command::{
    Command, CompositeCommand, CreateCommand, ExecuteCommand, TargetCommand,
    WriteAttributesCommand, WriteCommand, WriteCompositeCommand,
};

pub use client::{
    ClientContext, DefaultClientContext, Link, Liveness, LwM2mClient, LwM2mVersion, Registration,
};

pub use content_format::{ContentFormat, FormatEntry, SupportedFormats};

pub use path::{LwM2mPath, NodeId, PathLevel, VersionedPath};

pub use model::{
    ModelProvider, ObjectModel, Operations, ProfileModelProvider, ResourceModel, ResourceType,
    builtin_models,
};

pub use node::{LwM2mNode, ObjectInstance, ObjectLink, Resource, ResourceValue};

pub use attributes::{Attribute, AttributeName, AttributeSet, AttributeValue, ObjectAttributes};

pub use request::{
    DownlinkRequest, DownlinkResponse, ObserveTarget, ResponseCode, ResponseContent, WriteMode,
};

pub use callback::{DownlinkCallback, DownlinkReply};

pub use transport::{DownlinkTransport, ObservationService};

pub use observation::{Observation, ObservationRegistry};

pub use builder::{LocalCommand, Outbound, RequestBuilder};

pub use dispatcher::DownlinkDispatcher;

pub use classifier::{ErrorClass, ErrorClassifier};

pub use gate::SleepAwareGate;

pub use executor::CallbackExecutor;

pub use exchange::{ExchangeId, PendingExchange, PendingExchanges};

pub use handler::DownlinkHandler;

pub use config::DownlinkConfig;

pub use error::{
    ConfigError, DownlinkError, DownlinkResult, PathError, TransportError, TransportResult,
    ValueError,
};
