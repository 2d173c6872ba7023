//! Parsing of the per-tenant resources snapshot (`dataproductConfig.json`).

use crate::record::LayerRecord;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const RESOURCES_FILE_NAME: &str = "dataproductConfig.json";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Resources {
    #[serde(default)]
    pub dataproducts: Vec<LayerRecord>,
}

impl ResourcesConfig {
    pub fn into_records(self) -> Vec<LayerRecord> {
        self.resources.dataproducts
    }
}

pub fn parse_resources_str(input: &str) -> Result<ResourcesConfig, SchemaError> {
    Ok(serde_json::from_str(input)?)
}

pub fn parse_resources_file(path: impl AsRef<Path>) -> Result<ResourcesConfig, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_resources_str(&content)
}
