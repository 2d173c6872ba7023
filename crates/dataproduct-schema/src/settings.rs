//! Service settings file: tenant configuration root and map extents.

use crate::types::TenantName;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Service-level settings, read from a TOML file. Every key has a default so
/// an empty file is a valid configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSettings {
    /// Directory holding one subdirectory of configuration files per tenant.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default = "default_tenant")]
    pub default_tenant: TenantName,
    #[serde(default)]
    pub extent: ExtentSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            default_tenant: default_tenant(),
            extent: ExtentSettings::default(),
        }
    }
}

/// Extents injected into the display-mode tree builder.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtentSettings {
    /// Used for layers without their own bounding box.
    #[serde(default = "default_bbox")]
    pub default_bbox: [f64; 4],
    #[serde(default = "default_crs")]
    pub default_crs: String,
    /// Replaces the bounding box of layers served by an external service.
    #[serde(default = "external_bbox")]
    pub external_bbox: [f64; 4],
    #[serde(default = "external_crs")]
    pub external_crs: String,
}

impl Default for ExtentSettings {
    fn default() -> Self {
        Self {
            default_bbox: default_bbox(),
            default_crs: default_crs(),
            external_bbox: external_bbox(),
            external_crs: external_crs(),
        }
    }
}

impl ExtentSettings {
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (label, bbox) in [
            ("default_bbox", &self.default_bbox),
            ("external_bbox", &self.external_bbox),
        ] {
            let [xmin, ymin, xmax, ymax] = *bbox;
            if !(xmin < xmax && ymin < ymax) {
                return Err(SchemaError::InvalidSettings(format!(
                    "extent.{label} must be [xmin, ymin, xmax, ymax] with min < max, got {bbox:?}"
                )));
            }
        }
        for (label, crs) in [
            ("default_crs", &self.default_crs),
            ("external_crs", &self.external_crs),
        ] {
            if crs.trim().is_empty() {
                return Err(SchemaError::InvalidSettings(format!(
                    "extent.{label} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_tenant() -> TenantName {
    TenantName::from("default")
}

fn default_bbox() -> [f64; 4] {
    [2_590_000.0, 1_212_000.0, 2_645_000.0, 1_265_000.0]
}

fn default_crs() -> String {
    "EPSG:2056".to_owned()
}

fn external_bbox() -> [f64; 4] {
    [-180.0, -90.0, 180.0, 90.0]
}

fn external_crs() -> String {
    "EPSG:4326".to_owned()
}

pub fn parse_settings_str(input: &str) -> Result<ServiceSettings, SchemaError> {
    let settings: ServiceSettings = toml::from_str(input)?;
    settings.extent.validate()?;
    Ok(settings)
}

pub fn parse_settings_file(path: impl AsRef<Path>) -> Result<ServiceSettings, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_settings_str(&content)
}
