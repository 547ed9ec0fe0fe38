//! Object and resource models.
//!
//! Models describe what a path means on a device: whether an object may
//! have several instances, a resource's value type, its multiplicity and
//! the operations it allows. Device profiles register the models their
//! devices implement; a small built-in set covers the core objects.

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::client::LwM2mClient;
use crate::path::{LwM2mPath, NodeId, VersionedPath};

/// Default object version when neither the command nor the registration gives one.
pub const DEFAULT_OBJECT_VERSION: &str = "1.0";

/// Value type of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    String,
    Integer,
    UnsignedInteger,
    Float,
    Boolean,
    Opaque,
    Time,
    Objlnk,
    Corelnk,
    None,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::UnsignedInteger => "UNSIGNED_INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Opaque => "OPAQUE",
            Self::Time => "TIME",
            Self::Objlnk => "OBJLNK",
            Self::Corelnk => "CORELNK",
            Self::None => "NONE",
        };
        f.write_str(name)
    }
}

/// Operations a resource allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operations {
    None,
    R,
    W,
    RW,
    E,
    RE,
    WE,
    RWE,
}

impl Operations {
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::R | Self::RW | Self::RE | Self::RWE)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::W | Self::RW | Self::WE | Self::RWE)
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, Self::E | Self::RE | Self::WE | Self::RWE)
    }
}

/// Model of a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceModel {
    pub id: NodeId,
    pub name: String,
    pub operations: Operations,
    /// Multi-instance resource.
    pub multiple: bool,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

impl ResourceModel {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        operations: Operations,
        multiple: bool,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            operations,
            multiple,
            mandatory: false,
            resource_type,
        }
    }
}

/// Model of an object and its resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    pub id: NodeId,
    pub name: String,
    pub version: String,
    /// Multi-instance object.
    pub multiple: bool,
    pub resources: Vec<ResourceModel>,
}

impl ObjectModel {
    pub fn new(id: NodeId, name: impl Into<String>, multiple: bool) -> Self {
        Self {
            id,
            name: name.into(),
            version: DEFAULT_OBJECT_VERSION.to_string(),
            multiple,
            resources: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_resource(mut self, resource: ResourceModel) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn resource(&self, id: NodeId) -> Option<&ResourceModel> {
        self.resources.iter().find(|r| r.id == id)
    }
}

/// Source of models for a device.
pub trait ModelProvider: Send + Sync {
    /// Object model the device implements for `object_id`, if declared.
    fn object_model(
        &self,
        client: &LwM2mClient,
        object_id: NodeId,
        version: &str,
    ) -> Option<Arc<ObjectModel>>;
}

/// Version to use for `target`: the explicit one, else the one the device registered.
pub fn effective_version(client: &LwM2mClient, target: &VersionedPath) -> String {
    target
        .version
        .clone()
        .or_else(|| {
            client
                .registration()
                .supported_objects
                .get(&target.path.object_id)
                .cloned()
        })
        .unwrap_or_else(|| DEFAULT_OBJECT_VERSION.to_string())
}

/// Resolve the object model addressed by `target`.
pub fn resolve_object_model(
    provider: &dyn ModelProvider,
    client: &LwM2mClient,
    target: &VersionedPath,
) -> Option<Arc<ObjectModel>> {
    let version = effective_version(client, target);
    provider.object_model(client, target.path.object_id, &version)
}

/// Resolve the resource model addressed by `target` (resource or resource-instance level).
pub fn resolve_resource_model(
    provider: &dyn ModelProvider,
    client: &LwM2mClient,
    target: &VersionedPath,
) -> Option<ResourceModel> {
    let resource_id = target.path.resource_id?;
    resolve_object_model(provider, client, target)?
        .resource(resource_id)
        .cloned()
}

/// Models registered by device profiles, keyed by object id and version.
#[derive(Debug, Default)]
pub struct ProfileModelProvider {
    models: DashMap<(NodeId, String), Arc<ObjectModel>>,
}

impl ProfileModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a model.
    pub fn register(&self, model: ObjectModel) {
        self.models
            .insert((model.id, model.version.clone()), Arc::new(model));
    }

    pub fn remove(&self, object_id: NodeId, version: &str) -> bool {
        self.models
            .remove(&(object_id, version.to_string()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelProvider for ProfileModelProvider {
    fn object_model(
        &self,
        _client: &LwM2mClient,
        object_id: NodeId,
        version: &str,
    ) -> Option<Arc<ObjectModel>> {
        self.models
            .get(&(object_id, version.to_string()))
            .map(|entry| entry.value().clone())
    }
}

/// Core object models usable when a profile declares none.
pub fn builtin_models() -> &'static [ObjectModel] {
    static MODELS: OnceLock<Vec<ObjectModel>> = OnceLock::new();
    MODELS.get_or_init(|| {
        use Operations::{E, R, RW, W};
        use ResourceType as T;

        let server = ObjectModel::new(1, "LwM2M Server", true)
            .with_resource(ResourceModel::new(0, "Short Server ID", R, false, T::Integer))
            .with_resource(ResourceModel::new(1, "Lifetime", RW, false, T::Integer))
            .with_resource(ResourceModel::new(2, "Default Minimum Period", RW, false, T::Integer))
            .with_resource(ResourceModel::new(3, "Default Maximum Period", RW, false, T::Integer))
            .with_resource(ResourceModel::new(4, "Disable", E, false, T::None))
            .with_resource(ResourceModel::new(5, "Disable Timeout", RW, false, T::Integer))
            .with_resource(ResourceModel::new(6, "Notification Storing", RW, false, T::Boolean))
            .with_resource(ResourceModel::new(7, "Binding", RW, false, T::String))
            .with_resource(ResourceModel::new(8, "Registration Update Trigger", E, false, T::None));

        let device = ObjectModel::new(3, "Device", false)
            .with_resource(ResourceModel::new(0, "Manufacturer", R, false, T::String))
            .with_resource(ResourceModel::new(1, "Model Number", R, false, T::String))
            .with_resource(ResourceModel::new(2, "Serial Number", R, false, T::String))
            .with_resource(ResourceModel::new(3, "Firmware Version", R, false, T::String))
            .with_resource(ResourceModel::new(4, "Reboot", E, false, T::None))
            .with_resource(ResourceModel::new(5, "Factory Reset", E, false, T::None))
            .with_resource(ResourceModel::new(6, "Available Power Sources", R, true, T::Integer))
            .with_resource(ResourceModel::new(7, "Power Source Voltage", R, true, T::Integer))
            .with_resource(ResourceModel::new(8, "Power Source Current", R, true, T::Integer))
            .with_resource(ResourceModel::new(9, "Battery Level", R, false, T::Integer))
            .with_resource(ResourceModel::new(10, "Memory Free", R, false, T::Integer))
            .with_resource(ResourceModel::new(11, "Error Code", R, true, T::Integer))
            .with_resource(ResourceModel::new(12, "Reset Error Code", E, false, T::None))
            .with_resource(ResourceModel::new(13, "Current Time", RW, false, T::Time))
            .with_resource(ResourceModel::new(14, "UTC Offset", RW, false, T::String))
            .with_resource(ResourceModel::new(15, "Timezone", RW, false, T::String))
            .with_resource(ResourceModel::new(16, "Supported Binding and Modes", R, false, T::String));

        let firmware = ObjectModel::new(5, "Firmware Update", false)
            .with_resource(ResourceModel::new(0, "Package", W, false, T::Opaque))
            .with_resource(ResourceModel::new(1, "Package URI", RW, false, T::String))
            .with_resource(ResourceModel::new(2, "Update", E, false, T::None))
            .with_resource(ResourceModel::new(3, "State", R, false, T::Integer))
            .with_resource(ResourceModel::new(5, "Update Result", R, false, T::Integer))
            .with_resource(ResourceModel::new(6, "PkgName", R, false, T::String))
            .with_resource(ResourceModel::new(7, "PkgVersion", R, false, T::String));

        vec![server, device, firmware]
    })
}

/// Resource model from the built-in set.
pub fn builtin_resource_model(path: &LwM2mPath) -> Option<ResourceModel> {
    let resource_id = path.resource_id?;
    builtin_models()
        .iter()
        .find(|m| m.id == path.object_id)?
        .resource(resource_id)
        .cloned()
}
