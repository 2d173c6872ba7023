//! The layer record: one node of the dataproduct hierarchy as stored in a
//! resources snapshot.

use crate::types::DataproductId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_OPACITY: u8 = 255;

/// Kind of a dataproduct. Serialized with the names used by the resources
/// snapshot; the short forms are accepted on input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LayerKind {
    #[serde(rename = "layergroup", alias = "group")]
    Group,
    #[serde(rename = "datasetview", alias = "data")]
    Data,
    #[serde(rename = "facadelayer", alias = "facade")]
    Facade,
    #[serde(rename = "table")]
    Table,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Group => write!(f, "layergroup"),
            LayerKind::Data => write!(f, "datasetview"),
            LayerKind::Facade => write!(f, "facadelayer"),
            LayerKind::Table => write!(f, "table"),
        }
    }
}

/// A sublayer reference. Older snapshots list bare identifiers, newer ones
/// wrap them in an object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SublayerRef {
    Id(DataproductId),
    Entry { identifier: DataproductId },
}

impl SublayerRef {
    pub fn identifier(&self) -> &DataproductId {
        match self {
            SublayerRef::Id(id) | SublayerRef::Entry { identifier: id } => id,
        }
    }
}

impl From<&str> for SublayerRef {
    fn from(id: &str) -> Self {
        SublayerRef::Id(DataproductId::from(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organisation {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// Responsible body of a dataproduct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    pub organisation: Organisation,
}

/// A path -> base64 payload pair referenced from a style document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleAsset {
    pub path: String,
    pub base64: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExternalLayerType {
    Wms,
    Wmts,
}

/// Reference to a layer served by a third-party service. Keys other than
/// `type` (url, layer name, tile matrix set, ...) are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalLayer {
    #[serde(rename = "type")]
    pub kind: ExternalLayerType,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

/// Marks a layer as published through the map service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WmsDatasource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerRecord {
    pub identifier: DataproductId,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default, alias = "title")]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: bool,
    #[serde(default)]
    pub queryable: bool,
    #[serde(
        default,
        rename = "displayField",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_field: Option<String>,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    /// Search term of this dataproduct's own dataset view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    /// Child identifiers in display order.
    #[serde(default)]
    pub sublayers: Vec<SublayerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qml_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qml_assets: Vec<StyleAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_layer: Option<ExternalLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wms_datasource: Option<WmsDatasource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgis_datasource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster_datasource: Option<Value>,
    /// Opaque attributes from a secondary metadata store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn default_visibility() -> bool {
    true
}

fn default_opacity() -> u8 {
    DEFAULT_OPACITY
}

/// A consistency problem in a single record. None of these are fatal; the
/// snapshot loader reports them and the tree builders apply fixed precedence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordIssue {
    #[error("'{0}' has an empty identifier")]
    EmptyIdentifier(String),
    #[error("'{0}' sets both description and description_base64, plain text wins")]
    AmbiguousDescription(String),
    #[error("'{0}' sets both qml and qml_base64, plain text wins")]
    AmbiguousStyle(String),
    #[error("'{0}' lists itself as a sublayer")]
    SelfReference(String),
}

impl LayerRecord {
    /// A record with every optional attribute unset and defaults applied.
    pub fn new(identifier: impl Into<DataproductId>, kind: LayerKind) -> Self {
        let identifier = identifier.into();
        Self {
            display: identifier.to_string(),
            identifier,
            kind,
            description: None,
            description_base64: None,
            synonyms: Vec::new(),
            keywords: Vec::new(),
            contacts: Vec::new(),
            datatype: None,
            visibility: true,
            queryable: false,
            display_field: None,
            opacity: DEFAULT_OPACITY,
            bbox: None,
            crs: None,
            facet: None,
            sublayers: Vec::new(),
            qml: None,
            qml_base64: None,
            qml_assets: Vec::new(),
            external_layer: None,
            wms_datasource: None,
            postgis_datasource: None,
            raster_datasource: None,
            metadata: None,
        }
    }

    pub fn is_facade(&self) -> bool {
        self.kind == LayerKind::Facade
    }

    /// Whether the layer is published through the map service.
    pub fn participates_in_wms(&self) -> bool {
        self.wms_datasource.is_some()
    }

    pub fn sublayer_ids(&self) -> impl Iterator<Item = &DataproductId> {
        self.sublayers.iter().map(SublayerRef::identifier)
    }

    /// Name of the layer in the map service, falling back to the identifier.
    pub fn wms_name(&self) -> &str {
        self.wms_datasource
            .as_ref()
            .and_then(|ds| ds.name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.identifier.as_str())
    }

    pub fn validate(&self) -> Vec<RecordIssue> {
        let id = self.identifier.to_string();
        let mut issues = Vec::new();
        if self.identifier.is_empty() {
            issues.push(RecordIssue::EmptyIdentifier(self.display.clone()));
        }
        if self.description.is_some() && self.description_base64.is_some() {
            issues.push(RecordIssue::AmbiguousDescription(id.clone()));
        }
        if self.qml.is_some() && self.qml_base64.is_some() {
            issues.push(RecordIssue::AmbiguousStyle(id.clone()));
        }
        if self.sublayer_ids().any(|sub| *sub == self.identifier) {
            issues.push(RecordIssue::SelfReference(id));
        }
        issues
    }
}
