use dataproduct_core::{CatalogSnapshot, DataproductService};
use dataproduct_schema::{DataproductId, ExtentSettings, Identity};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::thread;

fn resources(facet: &str) -> String {
    format!(
        r#"{{"resources": {{"dataproducts": [
            {{"identifier": "root", "type": "layergroup", "sublayers": ["leaf"], "wms_datasource": {{}}}},
            {{"identifier": "leaf", "type": "datasetview", "facet": "{facet}", "wms_datasource": {{}}}}
        ]}}}}"#
    )
}

#[test]
fn readers_see_whole_snapshots_while_swapping() {
    let current = Arc::new(RwLock::new(Arc::new(
        CatalogSnapshot::from_json_str(&resources("old")).unwrap(),
    )));
    let permitted: Arc<HashSet<DataproductId>> =
        Arc::new(["root", "leaf"].into_iter().map(DataproductId::from).collect());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let current = Arc::clone(&current);
        let permitted = Arc::clone(&permitted);
        handles.push(thread::spawn(move || {
            let extent = ExtentSettings::default();
            for _ in 0..200 {
                let snapshot = Arc::clone(&*current.read().unwrap());
                let service = DataproductService::new(&*snapshot, &*permitted, &extent);
                let results = service.get_weblayers(&Identity::anonymous(), "root");
                let root = &results.get("root").unwrap()[0];
                assert_eq!(root.sublayers.len(), 1);
                let terms = &root.searchterms;
                assert!(
                    terms == &["old".to_owned()] || terms == &["new".to_owned()],
                    "mixed snapshot: {terms:?}"
                );
            }
        }));
    }

    for i in 0..50 {
        let facet = if i % 2 == 0 { "new" } else { "old" };
        let next = Arc::new(CatalogSnapshot::from_json_str(&resources(facet)).unwrap());
        *current.write().unwrap() = next;
    }

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn snapshot_generation_tracks_content() {
    let a = CatalogSnapshot::from_json_str(&resources("old")).unwrap();
    let b = CatalogSnapshot::from_json_str(&resources("old")).unwrap();
    let c = CatalogSnapshot::from_json_str(&resources("new")).unwrap();
    assert_eq!(a.generation(), b.generation());
    assert_ne!(a.generation(), c.generation());
}
