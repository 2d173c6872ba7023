//! Catalog-mode tree assembly: full descriptive metadata of a dataproduct and
//! its permitted sublayers.

use crate::catalog::ResourceCatalog;
use crate::embed::{decode_embedded_metadata, inline_style_assets, resolve_text};
use crate::weblayer_tree::compact_external;
use dataproduct_schema::{strip_nulls, CatalogNode, DataproductId, LayerRecord};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Builds catalog trees for one permitted set. Facades are not flattened in
/// this mode; they keep their resolved sublayers like any group.
pub struct CatalogTreeBuilder<'a, C: ?Sized> {
    catalog: &'a C,
    permitted: &'a HashSet<DataproductId>,
}

impl<'a, C: ResourceCatalog + ?Sized> CatalogTreeBuilder<'a, C> {
    pub fn new(catalog: &'a C, permitted: &'a HashSet<DataproductId>) -> Self {
        Self { catalog, permitted }
    }

    /// Build the tree rooted at `root`, returning the node (absent if `root`
    /// is unknown) and the aggregated search terms.
    ///
    /// The root itself is not checked against the permitted set; callers gate
    /// the entry point.
    ///
    /// Cycles are cut against the current ancestor path rather than a global
    /// visited set, so a child shared by several parents is expanded under
    /// each of them, as the published catalog has always listed it.
    pub fn build(&self, root: &str) -> (Option<CatalogNode>, Vec<String>) {
        let mut ancestors = Vec::new();
        self.build_node(root, &mut ancestors)
    }

    fn build_node(
        &self,
        id: &str,
        ancestors: &mut Vec<&'a DataproductId>,
    ) -> (Option<CatalogNode>, Vec<String>) {
        let Some(record) = self.catalog.lookup(id) else {
            debug!("dataproduct '{id}' not found in catalog");
            return (None, Vec::new());
        };

        ancestors.push(&record.identifier);
        let mut sublayers = Vec::new();
        let mut searchterms = Vec::new();
        for sub in record.sublayer_ids() {
            if !self.permitted.contains(sub.as_str()) {
                debug!("pruning '{sub}' below '{id}': not permitted");
                continue;
            }
            if ancestors.contains(&sub) {
                warn!("cyclic sublayer reference '{id}' -> '{sub}' skipped");
                continue;
            }
            let (node, terms) = self.build_node(sub, ancestors);
            if let Some(node) = node {
                sublayers.push(node);
                searchterms.extend(terms);
            }
        }
        ancestors.pop();

        if let Some(facet) = &record.facet {
            searchterms.push(facet.clone());
        }

        let node = project(record, sublayers, searchterms.clone());
        (Some(node), searchterms)
    }
}

/// Convenience wrapper over [`CatalogTreeBuilder`].
pub fn build_catalog<C: ResourceCatalog + ?Sized>(
    root: &str,
    catalog: &C,
    permitted: &HashSet<DataproductId>,
) -> (Option<CatalogNode>, Vec<String>) {
    CatalogTreeBuilder::new(catalog, permitted).build(root)
}

/// Copy every catalog-relevant field of `record` into a fresh node. Display
/// attributes (`queryable`, `displayField`, `opacity`) and the raw encoded
/// variants are left out.
fn project(
    record: &LayerRecord,
    sublayers: Vec<CatalogNode>,
    searchterms: Vec<String>,
) -> CatalogNode {
    let id = &record.identifier;
    let description = resolve_text(
        record.description.as_deref(),
        record.description_base64.as_deref(),
        &format!("description of '{id}'"),
    );
    let qml = resolve_text(
        record.qml.as_deref(),
        record.qml_base64.as_deref(),
        &format!("qml of '{id}'"),
    )
    .map(|doc| inline_style_assets(&doc, &record.qml_assets))
    .filter(|doc| !doc.is_empty());
    let metadata = record
        .metadata
        .clone()
        .map(|m| strip_nulls(decode_embedded_metadata(m, &format!("metadata of '{id}'"))));

    CatalogNode {
        identifier: id.clone(),
        kind: record.kind,
        display: record.display.clone(),
        description,
        synonyms: record.synonyms.clone(),
        keywords: record.keywords.clone(),
        contacts: record.contacts.clone(),
        datatype: record.datatype.clone(),
        visibility: record.visibility,
        bbox: record.bbox,
        crs: record.crs.clone(),
        facet: record.facet.clone(),
        external_layer: record.external_layer.clone().map(compact_external),
        wms_datasource: record.wms_datasource.clone(),
        postgis_datasource: record.postgis_datasource.clone().map(strip_nulls),
        raster_datasource: record.raster_datasource.clone().map(strip_nulls),
        metadata,
        sublayers,
        searchterms,
        qml,
    }
}
