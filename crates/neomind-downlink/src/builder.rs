//! Turns commands into protocol requests.
//!
//! Every rule that can reject a command runs here, before any network
//! I/O, so its failure is reported synchronously as a validation error.

use std::sync::Arc;

use serde_json::Value;

use crate::attributes::AttributeSet;
use crate::client::LwM2mClient;
use crate::command::{
    Command, CompositeCommand, CreateCommand, ExecuteCommand, TargetCommand,
    WriteAttributesCommand, WriteCommand, WriteCompositeCommand,
};
use crate::content_format::ContentFormat;
use crate::error::{DownlinkError, DownlinkResult, ValueError};
use crate::model::{
    ModelProvider, ResourceModel, builtin_resource_model, effective_version,
    resolve_object_model, resolve_resource_model,
};
use crate::negotiator::{negotiate, negotiate_composite};
use crate::node::{
    LwM2mNode, ObjectInstance, Resource, build_resources_for_instance, convert_multi_values,
    convert_value, scalar_text, to_argument_text,
};
use crate::path::{LwM2mPath, NodeId, VersionedPath};
use crate::request::{DownlinkRequest, ObserveTarget, WriteMode};

/// Command answered from local state.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalCommand {
    ListObservations,
    Cancel(LwM2mPath),
    CancelComposite(Vec<LwM2mPath>),
    CancelAll,
    DiscoverAll,
}

/// What a command turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Request(DownlinkRequest),
    Local(LocalCommand),
}

/// Builds requests against the device's registration and models.
#[derive(Clone)]
pub struct RequestBuilder {
    models: Arc<dyn ModelProvider>,
}

impl RequestBuilder {
    pub fn new(models: Arc<dyn ModelProvider>) -> Self {
        Self { models }
    }

    pub fn build(&self, client: &LwM2mClient, command: &Command) -> DownlinkResult<Outbound> {
        let request = match command {
            Command::Read(c) => self.read(client, c)?,
            Command::ReadComposite(c) => {
                let format = composite_format(client, &c.paths)?;
                DownlinkRequest::ReadComposite {
                    request_format: format,
                    response_format: format,
                    paths: c.paths.clone(),
                }
            }
            Command::Observe(c) => self.observe(client, c)?,
            Command::ObserveComposite(c) => self.observe_composite(client, c)?,
            Command::ObserveAll => return Ok(Outbound::Local(LocalCommand::ListObservations)),
            Command::CancelObserve(c) => {
                validate_versioned_id(client, &c.target)?;
                return Ok(Outbound::Local(LocalCommand::Cancel(c.target.path)));
            }
            Command::CancelObserveComposite(c) => {
                require_paths(&c.paths)?;
                return Ok(Outbound::Local(LocalCommand::CancelComposite(c.paths.clone())));
            }
            Command::CancelObserveAll => return Ok(Outbound::Local(LocalCommand::CancelAll)),
            Command::Discover(c) => {
                validate_versioned_id(client, &c.target)?;
                DownlinkRequest::Discover {
                    path: c.target.path,
                }
            }
            Command::DiscoverAll => return Ok(Outbound::Local(LocalCommand::DiscoverAll)),
            Command::Execute(c) => self.execute(client, c)?,
            Command::Delete(c) => {
                validate_versioned_id(client, &c.target)?;
                DownlinkRequest::Delete {
                    path: c.target.path,
                }
            }
            Command::WriteReplace(c) => self.write_replace(client, c)?,
            Command::WriteUpdate(c) => self.write_update(client, c)?,
            Command::WriteComposite(c) => write_composite(client, c)?,
            Command::WriteAttributes(c) => write_attributes(client, c)?,
            Command::Create(c) => self.create(client, c)?,
        };
        Ok(Outbound::Request(request))
    }

    fn resource_model(&self, client: &LwM2mClient, target: &VersionedPath) -> Option<ResourceModel> {
        resolve_resource_model(self.models.as_ref(), client, target)
    }

    fn read(&self, client: &LwM2mClient, c: &TargetCommand) -> DownlinkResult<DownlinkRequest> {
        validate_versioned_id(client, &c.target)?;
        let model = self.resource_model(client, &c.target);
        let format = negotiate(client, &c.target.path, model.as_ref(), c.content_format)?;
        Ok(DownlinkRequest::Read {
            format,
            path: c.target.path,
        })
    }

    fn observe(&self, client: &LwM2mClient, c: &TargetCommand) -> DownlinkResult<DownlinkRequest> {
        validate_versioned_id(client, &c.target)?;
        let model = self.resource_model(client, &c.target);
        let format = negotiate(client, &c.target.path, model.as_ref(), c.content_format)?;
        tracing::info!("[{}] Send observation: {}.", client.endpoint(), c.target);
        Ok(DownlinkRequest::Observe {
            format,
            target: ObserveTarget::from(c.target.path),
        })
    }

    fn observe_composite(
        &self,
        client: &LwM2mClient,
        c: &CompositeCommand,
    ) -> DownlinkResult<DownlinkRequest> {
        tracing::trace!(
            "[{}] Send Composite observation: {:?}.",
            client.endpoint(),
            c.paths.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
        let format = composite_format(client, &c.paths)?;
        Ok(DownlinkRequest::ObserveComposite {
            request_format: format,
            response_format: format,
            paths: c.paths.clone(),
        })
    }

    fn execute(&self, client: &LwM2mClient, c: &ExecuteCommand) -> DownlinkResult<DownlinkRequest> {
        validate_versioned_id(client, &c.target)?;
        let path = c.target.path;
        let model = self
            .resource_model(client, &c.target)
            .or_else(|| {
                if path.is_resource() {
                    builtin_resource_model(&path)
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                DownlinkError::validation(format!(
                    "ResourceModel with {} is absent in system. Need add LwM2M Model with id={} ver={} to profile.",
                    c.target,
                    path.object_id,
                    effective_version(client, &c.target)
                ))
            })?;
        if !model.operations.is_executable() {
            return Err(DownlinkError::validation(format!(
                "Resource with {} is not executable.",
                c.target
            )));
        }
        let arguments = match &c.params {
            Some(params) if !params.is_null() && !model.multiple => Some(to_argument_text(params)),
            _ => None,
        };
        Ok(DownlinkRequest::Execute { path, arguments })
    }

    fn write_replace(&self, client: &LwM2mClient, c: &WriteCommand) -> DownlinkResult<DownlinkRequest> {
        let path = c.target.path;
        let Some(resource_id) = path.resource_id else {
            return Err(DownlinkError::validation(format!(
                "Resource {}. This operation can only be used for Resource or ResourceInstance!",
                c.target
            )));
        };
        validate_versioned_id(client, &c.target)?;
        let model = self.resource_model(client, &c.target).ok_or_else(|| {
            DownlinkError::validation(format!(
                "Resource {} is not configured in the device profile!",
                c.target
            ))
        })?;
        let format = negotiate(client, &path, Some(&model), c.content_format)?;
        let node = replace_node(resource_id, path.resource_instance_id, &model, &c.value)
            .map_err(|_| {
                DownlinkError::validation(format!(
                    "Resource id={}, value = {}, class = {}. Format value is bad. Value for this Single Resource must be {}!",
                    path,
                    scalar_text(&c.value),
                    json_kind(&c.value),
                    model.resource_type
                ))
            })?;
        Ok(DownlinkRequest::Write {
            mode: WriteMode::Replace,
            format,
            path,
            node,
        })
    }

    fn write_update(&self, client: &LwM2mClient, c: &WriteCommand) -> DownlinkResult<DownlinkRequest> {
        let path = c.target.path;
        let rejected = |detail: &str| {
            DownlinkError::validation(format!(
                "Resource {}. This operation can only be used for ObjectInstance or Multi-Instance Resource !{}",
                c.target, detail
            ))
        };
        let (format, node) = match (path.object_instance_id, path.resource_id, path.resource_instance_id) {
            (Some(instance_id), None, None) => {
                validate_versioned_id(client, &c.target)?;
                let format = negotiate(client, &path, None, c.content_format)?;
                let resources =
                    build_resources_for_instance(self.models.as_ref(), client, &c.target, &c.value)
                        .map_err(|e| DownlinkError::validation(e.to_string()))?;
                if resources.is_empty() {
                    return Err(rejected(" No resources to update!"));
                }
                (
                    format,
                    LwM2mNode::ObjectInstance(ObjectInstance::new(Some(instance_id), resources)),
                )
            }
            (Some(_), Some(resource_id), None) => {
                validate_versioned_id(client, &c.target)?;
                let Some(model) = self.resource_model(client, &c.target) else {
                    return Err(rejected(&format!(
                        " Resource {} is not configured in the device profile!",
                        c.target
                    )));
                };
                if !model.multiple {
                    return Err(rejected(""));
                }
                let format = negotiate(client, &path, Some(&model), c.content_format)?;
                let instances = convert_multi_values(&c.value, model.resource_type).map_err(|_| {
                    rejected(&format!(
                        " Resource id={}, class = {}, value = {} is bad. Value of Multi-Instance Resource must be in Json format!",
                        path,
                        json_kind(&c.value),
                        scalar_text(&c.value)
                    ))
                })?;
                let node = LwM2mNode::Resource(Resource::Multiple {
                    id: resource_id,
                    resource_type: model.resource_type,
                    instances,
                });
                (format, node)
            }
            _ => {
                return Err(DownlinkError::validation(format!(
                    "Resource {}. This operation can only be used for ObjectInstance or Resource (multiple)",
                    c.target
                )));
            }
        };
        Ok(DownlinkRequest::Write {
            mode: WriteMode::Update,
            format,
            path,
            node,
        })
    }

    fn create(&self, client: &LwM2mClient, c: &CreateCommand) -> DownlinkResult<DownlinkRequest> {
        validate_versioned_id(client, &c.target)?;
        let path = c.target.path;
        let model = resolve_object_model(self.models.as_ref(), client, &c.target).ok_or_else(|| {
            DownlinkError::validation(format!(
                "Resource {} is not configured in the device profile!",
                c.target
            ))
        })?;
        let not_multiple =
            || DownlinkError::validation(format!("Path {}. Object must be Multiple !", c.target));
        if !model.multiple {
            return Err(not_multiple());
        }
        let format = negotiate(client, &path, None, c.content_format)?;

        let mut instances = match (path.object_instance_id, path.resource_id) {
            (None, None) => match (&c.value, &c.nodes) {
                (Some(value), _) => vec![ObjectInstance::new(
                    None,
                    self.instance_resources(client, &c.target, value)?,
                )],
                (None, Some(nodes)) if !nodes.is_empty() => nodes
                    .iter()
                    .map(|(key, value)| {
                        let id = key.trim().parse::<NodeId>().map_err(|_| {
                            DownlinkError::validation(format!(
                                "Path {}. Instance id {} is not valid!",
                                c.target, key
                            ))
                        })?;
                        Ok(ObjectInstance::new(
                            Some(id),
                            self.instance_resources(client, &c.target, value)?,
                        ))
                    })
                    .collect::<DownlinkResult<Vec<_>>>()?,
                _ => return Err(not_multiple()),
            },
            (Some(instance_id), None) => match &c.value {
                Some(value) => vec![ObjectInstance::new(
                    Some(instance_id),
                    self.instance_resources(client, &c.target, value)?,
                )],
                None => return Err(not_multiple()),
            },
            _ => return Err(not_multiple()),
        };
        instances.sort_by_key(|instance| instance.id);

        Ok(DownlinkRequest::Create {
            format,
            object_id: path.object_id,
            instances,
        })
    }

    fn instance_resources(
        &self,
        client: &LwM2mClient,
        target: &VersionedPath,
        value: &Value,
    ) -> DownlinkResult<Vec<Resource>> {
        build_resources_for_instance(self.models.as_ref(), client, target, value)
            .map_err(|e| DownlinkError::validation(e.to_string()))
    }
}

fn write_composite(client: &LwM2mClient, c: &WriteCompositeCommand) -> DownlinkResult<DownlinkRequest> {
    let paths: Vec<LwM2mPath> = c.nodes.keys().copied().collect();
    let format = composite_format(client, &paths)?;
    Ok(DownlinkRequest::WriteComposite {
        format,
        nodes: c.nodes.clone(),
    })
}

fn write_attributes(
    client: &LwM2mClient,
    c: &WriteAttributesCommand,
) -> DownlinkResult<DownlinkRequest> {
    validate_versioned_id(client, &c.target)?;
    let params = c
        .attributes
        .as_ref()
        .ok_or_else(|| DownlinkError::validation("Attributes to write are not specified!"))?;
    let attributes = AttributeSet::from(params);
    if attributes.is_empty() {
        return Err(DownlinkError::validation("Attributes to write are empty!"));
    }
    Ok(DownlinkRequest::WriteAttributes {
        path: c.target.path,
        attributes,
    })
}

/// Node for a replace write of one resource or resource instance.
///
/// A multi-instance resource first tries the value as an instance map, then
/// as a single value.
fn replace_node(
    resource_id: NodeId,
    resource_instance_id: Option<NodeId>,
    model: &ResourceModel,
    raw: &Value,
) -> Result<LwM2mNode, ValueError> {
    if let Some(id) = resource_instance_id {
        let value = convert_value(raw, model.resource_type)?;
        return Ok(LwM2mNode::ResourceInstance { id, value });
    }
    if model.multiple {
        if let Ok(instances) = convert_multi_values(raw, model.resource_type) {
            return Ok(LwM2mNode::Resource(Resource::Multiple {
                id: resource_id,
                resource_type: model.resource_type,
                instances,
            }));
        }
    }
    let value = convert_value(raw, model.resource_type)?;
    Ok(LwM2mNode::Resource(Resource::Single {
        id: resource_id,
        value,
    }))
}

fn require_paths(paths: &[LwM2mPath]) -> DownlinkResult<()> {
    if paths.is_empty() {
        return Err(DownlinkError::validation(
            "Composite request must address at least one path!",
        ));
    }
    Ok(())
}

fn composite_format(
    client: &LwM2mClient,
    paths: &[LwM2mPath],
) -> DownlinkResult<ContentFormat> {
    require_paths(paths)?;
    negotiate_composite(client)
}

/// Check the object is declared by the device, at the requested version.
fn validate_versioned_id(client: &LwM2mClient, target: &VersionedPath) -> DownlinkResult<()> {
    let object_id = target.path.object_id;
    let Some(registered) = client.registration().supported_objects.get(&object_id) else {
        return Err(DownlinkError::validation(format!(
            "Specified object id {} absent in the list supported objects of the client",
            object_id
        )));
    };
    match &target.version {
        Some(version) if version != registered => Err(DownlinkError::validation(format!(
            "Specified resource id {} is not valid version! Must be version: {}",
            target, registered
        ))),
        _ => Ok(()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}
