//! Per-request output trees. Absent values are never serialized: optional
//! fields are skipped and opaque pass-through JSON is compacted with
//! [`strip_nulls`].

use crate::record::{Contact, ExternalLayer, LayerKind, WmsDatasource};
use crate::types::DataproductId;
use serde::Serialize;
use serde_json::Value;

/// A node of the catalog tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogNode {
    pub identifier: DataproductId,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    pub visibility: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_layer: Option<ExternalLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wms_datasource: Option<WmsDatasource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgis_datasource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster_datasource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub sublayers: Vec<CatalogNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub searchterms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qml: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoundingBox {
    pub crs: String,
    pub bounds: [f64; 4],
}

/// A node of the display tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeblayerNode {
    pub name: String,
    pub title: String,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub visibility: bool,
    pub queryable: bool,
    #[serde(rename = "displayField")]
    pub display_field: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub searchterms: Vec<String>,
    pub opacity: u8,
    pub bbox: BoundingBox,
    #[serde(rename = "externalLayer", skip_serializing_if = "Option::is_none")]
    pub external_layer: Option<ExternalLayer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sublayers: Vec<WeblayerNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Remove `null` members from objects, recursively. Arrays keep their length;
/// null elements inside arrays are positional and stay.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// Serialize an output node into compacted JSON.
pub fn to_compact_json<T: Serialize>(node: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(node).map(strip_nulls)
}
