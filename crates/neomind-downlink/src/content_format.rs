//! Wire content formats and the formats a device declares.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload serialization of a request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentFormat {
    Text,
    Link,
    Opaque,
    Cbor,
    SenmlJson,
    SenmlCbor,
    Tlv,
    Json,
}

impl ContentFormat {
    /// CoAP content-format number.
    pub fn code(&self) -> u16 {
        match self {
            Self::Text => 0,
            Self::Link => 40,
            Self::Opaque => 42,
            Self::Cbor => 60,
            Self::SenmlJson => 110,
            Self::SenmlCbor => 112,
            Self::Tlv => 11542,
            Self::Json => 11543,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Text),
            40 => Some(Self::Link),
            42 => Some(Self::Opaque),
            60 => Some(Self::Cbor),
            110 => Some(Self::SenmlJson),
            112 => Some(Self::SenmlCbor),
            11542 => Some(Self::Tlv),
            11543 => Some(Self::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Link => "LINK",
            Self::Opaque => "OPAQUE",
            Self::Cbor => "CBOR",
            Self::SenmlJson => "SENML_JSON",
            Self::SenmlCbor => "SENML_CBOR",
            Self::Tlv => "TLV",
            Self::Json => "JSON",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a device's declared formats: a single format or a nested group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatEntry {
    Single(ContentFormat),
    Group(Vec<ContentFormat>),
}

/// Formats declared by a device at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedFormats(Vec<FormatEntry>);

impl SupportedFormats {
    pub fn new(entries: Vec<FormatEntry>) -> Self {
        Self(entries)
    }

    pub fn contains(&self, format: ContentFormat) -> bool {
        self.iter().any(|f| f == format)
    }

    /// All declared formats, groups flattened, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ContentFormat> + '_ {
        self.0.iter().flat_map(|entry| match entry {
            FormatEntry::Single(f) => std::slice::from_ref(f).iter().copied(),
            FormatEntry::Group(group) => group.iter().copied(),
        })
    }

    /// First format of `preferred` (in preference order) the device supports.
    pub fn first_supported(&self, preferred: &[ContentFormat]) -> Option<ContentFormat> {
        preferred.iter().copied().find(|f| self.contains(*f))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl FromIterator<ContentFormat> for SupportedFormats {
    fn from_iter<I: IntoIterator<Item = ContentFormat>>(iter: I) -> Self {
        Self(iter.into_iter().map(FormatEntry::Single).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for format in [
            ContentFormat::Text,
            ContentFormat::Link,
            ContentFormat::Opaque,
            ContentFormat::Cbor,
            ContentFormat::SenmlJson,
            ContentFormat::SenmlCbor,
            ContentFormat::Tlv,
            ContentFormat::Json,
        ] {
            assert_eq!(ContentFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(ContentFormat::from_code(9999), None);
    }

    #[test]
    fn test_nested_groups_are_flattened() {
        let formats = SupportedFormats::new(vec![
            FormatEntry::Single(ContentFormat::Tlv),
            FormatEntry::Group(vec![ContentFormat::SenmlJson, ContentFormat::Link]),
        ]);
        assert!(formats.contains(ContentFormat::SenmlJson));
        assert!(!formats.contains(ContentFormat::SenmlCbor));
        assert_eq!(formats.iter().count(), 3);
    }

    #[test]
    fn test_first_supported_follows_preference_not_declaration() {
        let formats: SupportedFormats = [ContentFormat::Tlv, ContentFormat::SenmlJson]
            .into_iter()
            .collect();
        assert_eq!(
            formats.first_supported(&[ContentFormat::SenmlCbor, ContentFormat::SenmlJson, ContentFormat::Tlv]),
            Some(ContentFormat::SenmlJson)
        );
        assert_eq!(formats.first_supported(&[ContentFormat::Cbor]), None);
    }

    #[test]
    fn test_deserialize_mixed_entries() {
        let formats: SupportedFormats =
            serde_json::from_str(r#"["TLV", ["SENML_CBOR", "SENML_JSON"]]"#).unwrap();
        assert!(formats.contains(ContentFormat::SenmlCbor));
        assert!(formats.contains(ContentFormat::Tlv));
    }
}
