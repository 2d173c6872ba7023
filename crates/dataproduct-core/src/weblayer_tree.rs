//! Display-mode tree assembly: map rendering attributes of a dataproduct and
//! its sublayers as published through the map service.

use crate::catalog::ResourceCatalog;
use crate::embed::{decode_embedded_metadata, resolve_text};
use dataproduct_schema::{
    strip_nulls, BoundingBox, DataproductId, ExtentSettings, ExternalLayer, ExternalLayerType,
    LayerRecord, WeblayerNode,
};
use std::collections::HashSet;
use tracing::{debug, warn};

pub struct WeblayerTreeBuilder<'a, C: ?Sized> {
    catalog: &'a C,
    permitted: &'a HashSet<DataproductId>,
    facade_sublayers: &'a HashSet<DataproductId>,
    extent: &'a ExtentSettings,
}

impl<'a, C: ResourceCatalog + ?Sized> WeblayerTreeBuilder<'a, C> {
    pub fn new(
        catalog: &'a C,
        permitted: &'a HashSet<DataproductId>,
        facade_sublayers: &'a HashSet<DataproductId>,
        extent: &'a ExtentSettings,
    ) -> Self {
        Self {
            catalog,
            permitted,
            facade_sublayers,
            extent,
        }
    }

    /// Build the display tree for a top-level request. Yields no entry when
    /// the root is unknown, not published through the map service, or is
    /// itself the sublayer of a facade (it is listed under that facade).
    ///
    /// As in catalog mode, the cycle guard is the ancestor path: shared
    /// children are repeated under every parent that lists them.
    pub fn build(&self, root: &str) -> Vec<WeblayerNode> {
        if self.facade_sublayers.contains(root) {
            debug!("'{root}' is a facade sublayer, not listed on its own");
            return Vec::new();
        }
        let mut ancestors = Vec::new();
        let (node, _) = self.build_node(root, true, &mut ancestors);
        node.into_iter().collect()
    }

    fn build_node(
        &self,
        id: &str,
        visible: bool,
        ancestors: &mut Vec<&'a DataproductId>,
    ) -> (Option<WeblayerNode>, Vec<String>) {
        let Some(record) = self.catalog.lookup(id) else {
            debug!("dataproduct '{id}' not found in catalog");
            return (None, Vec::new());
        };
        if !record.participates_in_wms() {
            debug!("'{id}' has no WMS datasource");
            return (None, Vec::new());
        }

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
            let child_visible = visible && self.catalog.lookup(sub).is_some_and(|c| c.visibility);
            let (node, terms) = self.build_node(sub, child_visible, ancestors);
            if let Some(node) = node {
                if !record.is_facade() {
                    sublayers.push(node);
                }
                searchterms.extend(terms);
            }
        }
        ancestors.pop();

        if let Some(facet) = &record.facet {
            searchterms.push(facet.clone());
        }

        let node = self.project(record, visible, sublayers, searchterms.clone());
        (Some(node), searchterms)
    }

    fn project(
        &self,
        record: &LayerRecord,
        visible: bool,
        sublayers: Vec<WeblayerNode>,
        searchterms: Vec<String>,
    ) -> WeblayerNode {
        let id = &record.identifier;
        let mut queryable = record.queryable;
        let bbox = if let Some(external) = &record.external_layer {
            if external.kind == ExternalLayerType::Wmts {
                queryable = false;
            }
            BoundingBox {
                crs: self.extent.external_crs.clone(),
                bounds: self.extent.external_bbox,
            }
        } else {
            match record.bbox {
                Some(bounds) => BoundingBox {
                    crs: record
                        .crs
                        .clone()
                        .unwrap_or_else(|| self.extent.default_crs.clone()),
                    bounds,
                },
                None => BoundingBox {
                    crs: self.extent.default_crs.clone(),
                    bounds: self.extent.default_bbox,
                },
            }
        };

        WeblayerNode {
            name: record.wms_name().to_owned(),
            title: record.display.clone(),
            abstract_text: resolve_text(
                record.description.as_deref(),
                record.description_base64.as_deref(),
                &format!("description of '{id}'"),
            ),
            visibility: visible,
            queryable,
            display_field: record.display_field.clone().unwrap_or_default(),
            searchterms,
            opacity: record.opacity,
            bbox,
            external_layer: record.external_layer.clone().map(compact_external),
            sublayers,
            metadata: record
                .metadata
                .clone()
                .map(|m| strip_nulls(decode_embedded_metadata(m, &format!("metadata of '{id}'")))),
        }
    }
}

/// Convenience wrapper over [`WeblayerTreeBuilder`].
pub fn build_weblayer<C: ResourceCatalog + ?Sized>(
    root: &str,
    catalog: &C,
    permitted: &HashSet<DataproductId>,
    facade_sublayers: &HashSet<DataproductId>,
    extent: &ExtentSettings,
) -> Vec<WeblayerNode> {
    WeblayerTreeBuilder::new(catalog, permitted, facade_sublayers, extent).build(root)
}

pub(crate) fn compact_external(mut external: ExternalLayer) -> ExternalLayer {
    external.params = external
        .params
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, strip_nulls(v)))
        .collect();
    external
}
