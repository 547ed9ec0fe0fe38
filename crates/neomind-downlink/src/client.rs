//! Device session state as seen by the downlink layer.
//!
//! The registration is owned by the external session registry; the client
//! only adds the liveness flag and last-uplink time, both updated atomically
//! with last-writer-wins semantics.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content_format::{ContentFormat, SupportedFormats};
use crate::path::{LwM2mPath, NodeId};

/// Protocol version announced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LwM2mVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
}

impl fmt::Display for LwM2mVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1_0 => f.write_str("1.0"),
            Self::V1_1 => f.write_str("1.1"),
        }
    }
}

impl FromStr for LwM2mVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" => Ok(Self::V1_0),
            "1.1" => Ok(Self::V1_1),
            other => Err(format!("The version {} is not supported!", other)),
        }
    }
}

/// Whether the device is believed reachable for downlink traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Liveness {
    Awake,
    Asleep,
}

impl Liveness {
    fn as_u8(self) -> u8 {
        match self {
            Self::Awake => 0,
            Self::Asleep => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        if value == 1 { Self::Asleep } else { Self::Awake }
    }
}

/// A link advertised by the device at registration (`</3/0>;ver=1.1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub path: LwM2mPath,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl Link {
    pub fn new(path: LwM2mPath) -> Self {
        Self {
            path,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// CoRE link-format rendering.
    pub fn to_core_link_format(&self) -> String {
        let mut out = format!("<{}>", self.path);
        for (name, value) in &self.attributes {
            out.push(';');
            out.push_str(name);
            if !value.is_empty() {
                out.push('=');
                out.push_str(value);
            }
        }
        out
    }
}

/// Registration data provided by the session registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub endpoint: String,
    pub socket_address: String,
    pub version: LwM2mVersion,
    pub supported_formats: SupportedFormats,
    pub default_content_format: ContentFormat,
    /// Object id to the model version the device implements.
    #[serde(default)]
    pub supported_objects: HashMap<NodeId, String>,
    #[serde(default)]
    pub object_links: Vec<Link>,
}

impl Registration {
    pub fn new(endpoint: impl Into<String>, version: LwM2mVersion) -> Self {
        let endpoint = endpoint.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            socket_address: String::new(),
            default_content_format: match version {
                LwM2mVersion::V1_0 => ContentFormat::Tlv,
                LwM2mVersion::V1_1 => ContentFormat::SenmlCbor,
            },
            endpoint,
            version,
            supported_formats: SupportedFormats::default(),
            supported_objects: HashMap::new(),
            object_links: Vec::new(),
        }
    }

    pub fn with_formats(mut self, formats: SupportedFormats) -> Self {
        self.supported_formats = formats;
        self
    }

    pub fn with_default_format(mut self, format: ContentFormat) -> Self {
        self.default_content_format = format;
        self
    }

    pub fn with_object(mut self, object_id: NodeId, version: impl Into<String>) -> Self {
        self.supported_objects.insert(object_id, version.into());
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.object_links.push(link);
        self
    }

    pub fn with_socket_address(mut self, address: impl Into<String>) -> Self {
        self.socket_address = address.into();
        self
    }

    /// Object links ordered by path.
    pub fn sorted_object_links(&self) -> Vec<Link> {
        let mut links = self.object_links.clone();
        links.sort();
        links
    }
}

/// A registered device.
#[derive(Debug)]
pub struct LwM2mClient {
    registration: Registration,
    liveness: AtomicU8,
    last_uplink_ms: AtomicI64,
}

impl LwM2mClient {
    pub fn new(registration: Registration) -> Self {
        Self {
            registration,
            liveness: AtomicU8::new(Liveness::Awake.as_u8()),
            last_uplink_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn endpoint(&self) -> &str {
        &self.registration.endpoint
    }

    pub fn version(&self) -> LwM2mVersion {
        self.registration.version
    }

    pub fn supported_formats(&self) -> &SupportedFormats {
        &self.registration.supported_formats
    }

    pub fn default_content_format(&self) -> ContentFormat {
        self.registration.default_content_format
    }

    pub fn liveness(&self) -> Liveness {
        Liveness::from_u8(self.liveness.load(Ordering::Acquire))
    }

    pub fn set_liveness(&self, liveness: Liveness) {
        self.liveness.store(liveness.as_u8(), Ordering::Release);
    }

    pub fn is_asleep(&self) -> bool {
        self.liveness() == Liveness::Asleep
    }

    pub fn update_last_uplink_time(&self) {
        self.last_uplink_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn last_uplink_time(&self) -> DateTime<Utc> {
        let ms = self.last_uplink_ms.load(Ordering::Acquire);
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }
}

/// Device liveness bookkeeping owned by the session registry.
pub trait ClientContext: Send + Sync {
    fn is_downlink_allowed(&self, client: &LwM2mClient) -> bool;

    fn awake(&self, client: &LwM2mClient);

    fn asleep(&self, client: &LwM2mClient);
}

/// Context that keeps liveness on the client itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClientContext;

impl ClientContext for DefaultClientContext {
    fn is_downlink_allowed(&self, client: &LwM2mClient) -> bool {
        !client.is_asleep()
    }

    fn awake(&self, client: &LwM2mClient) {
        if client.is_asleep() {
            tracing::debug!("[{}] Client is awake", client.endpoint());
        }
        client.set_liveness(Liveness::Awake);
    }

    fn asleep(&self, client: &LwM2mClient) {
        client.set_liveness(Liveness::Asleep);
    }
}
