//! Permission-filtered tree assembly for the dataproduct service.
//!
//! This crate turns a loaded resources snapshot (`CatalogSnapshot`) and a
//! permission source (`PermissionOracle`) into per-request output trees: the
//! catalog tree with descriptive metadata and the display tree with map
//! rendering attributes. `DataproductService` exposes both as the read
//! operations used by the transport layer; `TenantConfig` loads everything a
//! tenant needs from its configuration directory.

pub mod catalog;
pub mod catalog_tree;
pub mod embed;
pub mod permissions;
pub mod service;
pub mod tenant;
pub mod weblayer_tree;

pub use catalog::{CatalogSnapshot, ResourceCatalog};
pub use catalog_tree::{build_catalog, CatalogTreeBuilder};
pub use embed::{decode_base64_text, decode_embedded_metadata, inline_style_assets};
pub use permissions::PermissionOracle;
pub use service::{parse_filter, DataproductService, WeblayerResults};
pub use tenant::TenantConfig;
pub use weblayer_tree::{build_weblayer, WeblayerTreeBuilder};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Schema(#[from] dataproduct_schema::SchemaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no configuration for tenant '{tenant}' at {}", path.display())]
    TenantNotFound { tenant: String, path: PathBuf },
}
