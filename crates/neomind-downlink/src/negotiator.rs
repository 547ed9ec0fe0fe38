//! Content-format negotiation.
//!
//! Picks the wire format for a request from the target's resource
//! semantics, the formats the device declared and its protocol version.

use crate::client::{LwM2mClient, LwM2mVersion};
use crate::content_format::ContentFormat;
use crate::error::{DownlinkError, DownlinkResult};
use crate::model::{ResourceModel, ResourceType};
use crate::path::LwM2mPath;

/// Preference order for single-value payloads.
const LEAF_FORMATS: &[ContentFormat] = &[
    ContentFormat::Cbor,
    ContentFormat::SenmlCbor,
    ContentFormat::SenmlJson,
];

/// Preference order for object and instance payloads on 1.1 devices.
const COMPLEX_FORMATS: &[ContentFormat] = &[
    ContentFormat::SenmlCbor,
    ContentFormat::SenmlJson,
    ContentFormat::Tlv,
    ContentFormat::Json,
];

/// Formats able to carry several paths in one exchange.
const COMPOSITE_FORMATS: &[ContentFormat] = &[ContentFormat::SenmlJson, ContentFormat::SenmlCbor];

/// Format for a request addressing `path`.
///
/// `resource_model` is the resolved model of the addressed resource, if any.
/// An explicit caller format always wins.
pub fn negotiate(
    client: &LwM2mClient,
    path: &LwM2mPath,
    resource_model: Option<&ResourceModel>,
    explicit: Option<ContentFormat>,
) -> DownlinkResult<ContentFormat> {
    if let Some(format) = explicit {
        return Ok(format);
    }
    match resource_model {
        Some(model) if is_leaf(path, model) => Ok(negotiate_leaf(client, model)),
        _ => negotiate_complex(client),
    }
}

fn is_leaf(path: &LwM2mPath, model: &ResourceModel) -> bool {
    path.is_resource_instance() || (path.is_resource() && !model.multiple)
}

fn negotiate_leaf(client: &LwM2mClient, model: &ResourceModel) -> ContentFormat {
    match model.resource_type {
        ResourceType::Objlnk => ContentFormat::Link,
        ResourceType::Opaque => ContentFormat::Opaque,
        _ => client
            .supported_formats()
            .first_supported(LEAF_FORMATS)
            .unwrap_or_else(|| client.default_content_format()),
    }
}

/// Format for object, object-instance or multi-instance resource payloads.
pub fn negotiate_complex(client: &LwM2mClient) -> DownlinkResult<ContentFormat> {
    match client.version() {
        LwM2mVersion::V1_0 => Ok(ContentFormat::Tlv),
        LwM2mVersion::V1_1 => client
            .supported_formats()
            .first_supported(COMPLEX_FORMATS)
            .ok_or_else(|| {
                DownlinkError::UnsupportedContentFormat(
                    "The client does not support any of SenML CBOR, SenML JSON, TLV or JSON formats. \
                     Can't send complex requests. Try using single-instance requests."
                        .to_string(),
                )
            }),
    }
}

/// Format for composite (multi-path) requests.
pub fn negotiate_composite(client: &LwM2mClient) -> DownlinkResult<ContentFormat> {
    client
        .supported_formats()
        .first_supported(COMPOSITE_FORMATS)
        .ok_or_else(|| {
            DownlinkError::UnsupportedContentFormat(
                "This device does not support Composite Operation".to_string(),
            )
        })
}
