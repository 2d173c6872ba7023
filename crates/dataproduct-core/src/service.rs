//! The two read operations exposed to the transport layer.

use crate::catalog::ResourceCatalog;
use crate::catalog_tree::CatalogTreeBuilder;
use crate::permissions::PermissionOracle;
use crate::weblayer_tree::WeblayerTreeBuilder;
use dataproduct_schema::{
    CatalogNode, ExtentSettings, Identity, WeblayerNode, DATAPRODUCTS_DOMAIN,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

/// Answers dataproduct and weblayer queries against one catalog snapshot and
/// permission source. Holds no per-request state.
pub struct DataproductService<'a, C: ?Sized, P: ?Sized> {
    catalog: &'a C,
    oracle: &'a P,
    extent: &'a ExtentSettings,
}

impl<'a, C, P> DataproductService<'a, C, P>
where
    C: ResourceCatalog + ?Sized,
    P: PermissionOracle + ?Sized,
{
    pub fn new(catalog: &'a C, oracle: &'a P, extent: &'a ExtentSettings) -> Self {
        Self {
            catalog,
            oracle,
            extent,
        }
    }

    /// Catalog tree of `id`, or `None` when `id` is unknown or not permitted.
    pub fn get_dataproduct(&self, identity: &Identity, id: &str) -> Option<CatalogNode> {
        let permitted = self.oracle.permitted_set(DATAPRODUCTS_DOMAIN, identity);
        if !permitted.contains(id) {
            debug!("dataproduct '{id}' not permitted for {identity:?}");
            return None;
        }
        let (node, _) = CatalogTreeBuilder::new(self.catalog, &permitted).build(id);
        node
    }

    /// Display trees for a comma-separated list of identifiers, keyed by
    /// identifier in request order.
    pub fn get_weblayers(&self, identity: &Identity, filter: &str) -> WeblayerResults {
        let permitted = self.oracle.permitted_set(DATAPRODUCTS_DOMAIN, identity);
        let builder = WeblayerTreeBuilder::new(
            self.catalog,
            &permitted,
            self.catalog.facade_sublayers(),
            self.extent,
        );
        let entries = parse_filter(filter)
            .into_iter()
            .map(|id| {
                let layers = if permitted.contains(id) {
                    builder.build(id)
                } else {
                    debug!("weblayer '{id}' not permitted for {identity:?}");
                    Vec::new()
                };
                (id.to_owned(), layers)
            })
            .collect();
        WeblayerResults { entries }
    }
}

/// Split a comma-separated identifier list. Segments are trimmed, empty ones
/// dropped, and repeated identifiers kept at their first position.
pub fn parse_filter(filter: &str) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for id in filter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Ordered identifier -> display trees mapping. Serializes as a JSON object
/// whose keys keep request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeblayerResults {
    entries: Vec<(String, Vec<WeblayerNode>)>,
}

impl WeblayerResults {
    pub fn get(&self, id: &str) -> Option<&[WeblayerNode]> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, layers)| layers.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for WeblayerResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, layers) in &self.entries {
            map.serialize_entry(key, layers)?;
        }
        map.end()
    }
}
