//! Data model and configuration documents for the dataproduct service.
//!
//! This crate defines the layer record (`LayerRecord`) as found in a resources
//! snapshot, the output node types of the catalog and display trees, the
//! role-based permissions document, and the service settings file.

pub mod output;
pub mod permissions;
pub mod record;
pub mod resources;
pub mod settings;
pub mod types;

pub use output::{strip_nulls, to_compact_json, BoundingBox, CatalogNode, WeblayerNode};
pub use permissions::{
    parse_permissions_file, parse_permissions_str, Identity, PermissionsDocument,
    DATAPRODUCTS_DOMAIN, PERMISSIONS_FILE_NAME, PUBLIC_ROLE,
};
pub use record::{
    Contact, ExternalLayer, ExternalLayerType, LayerKind, LayerRecord, RecordIssue, StyleAsset,
    SublayerRef, WmsDatasource,
};
pub use resources::{
    parse_resources_file, parse_resources_str, ResourcesConfig, RESOURCES_FILE_NAME,
};
pub use settings::{parse_settings_file, parse_settings_str, ExtentSettings, ServiceSettings};
pub use types::{DataproductId, TenantName};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse settings: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("duplicate dataproduct identifier: {0}")]
    DuplicateIdentifier(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
