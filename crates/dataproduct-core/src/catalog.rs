//! Resource catalog: identifier -> layer record lookup over one immutable
//! configuration generation.

use crate::CoreError;
use dataproduct_schema::{parse_resources_str, DataproductId, LayerRecord, SchemaError};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Read-only view of the layer hierarchy.
pub trait ResourceCatalog: Send + Sync {
    fn lookup(&self, id: &str) -> Option<&LayerRecord>;

    /// Identifiers listed as sublayers of some facade in this catalog.
    fn facade_sublayers(&self) -> &HashSet<DataproductId>;
}

/// One loaded resources snapshot. Never mutated after construction; a reload
/// builds a new snapshot and swaps it in.
#[derive(Debug)]
pub struct CatalogSnapshot {
    generation: String,
    records: HashMap<DataproductId, LayerRecord>,
    facade_sublayers: HashSet<DataproductId>,
}

impl CatalogSnapshot {
    /// Build a snapshot from records. The generation is derived from the
    /// serialized records.
    pub fn from_records(records: Vec<LayerRecord>) -> Result<Self, CoreError> {
        let serialized = serde_json::to_vec(&records).map_err(SchemaError::from)?;
        Self::with_generation(records, generation_of(&serialized))
    }

    /// Parse a `dataproductConfig.json` document.
    pub fn from_json_str(input: &str) -> Result<Self, CoreError> {
        let records = parse_resources_str(input)?.into_records();
        Self::with_generation(records, generation_of(input.as_bytes()))
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path)?;
        let snapshot = Self::from_json_str(&content)?;
        info!(
            "loaded {} dataproducts from {} (generation {})",
            snapshot.len(),
            path.display(),
            snapshot.short_generation()
        );
        Ok(snapshot)
    }

    fn with_generation(records: Vec<LayerRecord>, generation: String) -> Result<Self, CoreError> {
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            for issue in record.validate() {
                warn!("dataproduct {issue}");
            }
            let id = record.identifier.clone();
            if by_id.insert(id.clone(), record).is_some() {
                return Err(SchemaError::DuplicateIdentifier(id.into_inner()).into());
            }
        }

        for record in by_id.values() {
            for sub in record.sublayer_ids() {
                if !by_id.contains_key(sub) {
                    warn!(
                        "dataproduct '{}' references unknown sublayer '{sub}'",
                        record.identifier
                    );
                }
            }
        }

        let facade_sublayers = by_id
            .values()
            .filter(|r| r.is_facade())
            .flat_map(LayerRecord::sublayer_ids)
            .cloned()
            .collect();

        Ok(Self {
            generation,
            records: by_id,
            facade_sublayers,
        })
    }

    /// blake3 hex digest of the source this snapshot was built from.
    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn short_generation(&self) -> &str {
        &self.generation[..12.min(self.generation.len())]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &DataproductId> {
        self.records.keys()
    }
}

impl ResourceCatalog for CatalogSnapshot {
    fn lookup(&self, id: &str) -> Option<&LayerRecord> {
        self.records.get(id)
    }

    fn facade_sublayers(&self) -> &HashSet<DataproductId> {
        &self.facade_sublayers
    }
}

fn generation_of(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
