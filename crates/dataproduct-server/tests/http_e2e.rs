//! HTTP end-to-end tests.
//!
//! These tests start a real `dataproduct-server` in-process on a random port
//! against a temporary configuration directory and query it with `ureq`. No mocks.

use dataproduct_schema::{ServiceSettings, TenantName, PERMISSIONS_FILE_NAME, RESOURCES_FILE_NAME};
use dataproduct_server::TestServer;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::Path;

const RESOURCES: &str = r#"{
  "resources": {
    "dataproducts": [
      {
        "identifier": "ch.so.afu.gewaesserschutz",
        "type": "layergroup",
        "display": "Gewässerschutz",
        "description_base64": "QmVzY2hyZWlidW5n",
        "facet": "gewaesserschutz",
        "sublayers": ["ch.so.afu.gewaesserschutz.zonen", "ch.so.afu.grundwasser.intern"],
        "wms_datasource": {"service_url": "https://geo.so.ch/wms", "name": "ch.so.afu.gewaesserschutz"}
      },
      {
        "identifier": "ch.so.afu.gewaesserschutz.zonen",
        "type": "datasetview",
        "display": "Zonen",
        "facet": "zonen",
        "queryable": true,
        "wms_datasource": {"service_url": "https://geo.so.ch/wms", "name": "ch.so.afu.gewaesserschutz.zonen"}
      },
      {
        "identifier": "ch.so.afu.grundwasser.intern",
        "type": "datasetview",
        "display": "Grundwasser intern",
        "facet": "grundwasser",
        "wms_datasource": {"service_url": "https://geo.so.ch/wms", "name": "ch.so.afu.grundwasser.intern"}
      },
      {
        "identifier": "ch.so.agi.tabelle",
        "type": "table",
        "display": "Tabelle"
      },
      {
        "identifier": "ch.so.agi.gewässer",
        "type": "table",
        "display": "Gewässer"
      }
    ]
  }
}"#;

const PERMISSIONS: &str = r#"{
  "users": [{"name": "alice", "groups": ["afu"]}],
  "groups": [{"name": "afu", "roles": ["afu-intern"]}],
  "roles": [
    {"role": "public", "permissions": {"dataproducts": [
      "ch.so.afu.gewaesserschutz", "ch.so.afu.gewaesserschutz.zonen", "ch.so.agi.tabelle",
      "ch.so.agi.gewässer"
    ]}},
    {"role": "afu-intern", "permissions": {"dataproducts": ["ch.so.afu.grundwasser.intern"]}}
  ]
}"#;

fn write_tenant(root: &Path, tenant: &str, resources: &str) {
    let dir = root.join(tenant);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(RESOURCES_FILE_NAME), resources).unwrap();
    fs::write(dir.join(PERMISSIONS_FILE_NAME), PERMISSIONS).unwrap();
}

fn start_server() -> (TestServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    write_tenant(dir.path(), "default", RESOURCES);
    let server = TestServer::start(ServiceSettings {
        config_dir: dir.path().to_path_buf(),
        ..ServiceSettings::default()
    });
    (server, dir)
}

fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into()
}

/// GET `path` with extra headers; returns status and raw body.
fn get(server: &TestServer, path: &str, headers: &[(&str, &str)]) -> (u16, String) {
    let mut req = agent().get(&format!("{}{path}", server.url));
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let resp = req.call().unwrap();
    let status = resp.status().as_u16();
    let mut body = String::new();
    resp.into_body()
        .into_reader()
        .read_to_string(&mut body)
        .unwrap();
    (status, body)
}

fn get_json(server: &TestServer, path: &str, headers: &[(&str, &str)]) -> (u16, Value) {
    let (status, body) = get(server, path, headers);
    (status, serde_json::from_str(&body).unwrap())
}

fn sublayer_ids(node: &Value) -> Vec<&str> {
    node["sublayers"]
        .as_array()
        .map(|subs| {
            subs.iter()
                .map(|s| s["identifier"].as_str().unwrap())
                .collect()
        })
        .unwrap_or_default()
}

// --- Tests ---

#[test]
fn http_e2e_dataproduct_for_anonymous() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(&server, "/ch.so.afu.gewaesserschutz", &[]);
    assert_eq!(status, 200);
    assert_eq!(body["identifier"], "ch.so.afu.gewaesserschutz");
    assert_eq!(body["type"], "layergroup");
    assert_eq!(body["description"], "Beschreibung");
    assert!(body.get("description_base64").is_none());
    assert_eq!(sublayer_ids(&body), vec!["ch.so.afu.gewaesserschutz.zonen"]);
    assert_eq!(body["searchterms"], serde_json::json!(["zonen", "gewaesserschutz"]));
}

#[test]
fn http_e2e_dataproduct_for_authenticated_user() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(
        &server,
        "/ch.so.afu.gewaesserschutz",
        &[("X-Auth-User", "alice")],
    );
    assert_eq!(status, 200);
    assert_eq!(
        sublayer_ids(&body),
        vec![
            "ch.so.afu.gewaesserschutz.zonen",
            "ch.so.afu.grundwasser.intern"
        ]
    );
}

#[test]
fn http_e2e_404_on_missing_or_denied() {
    let (server, _dir) = start_server();
    for path in ["/ch.so.afu.grundwasser.intern", "/does.not.exist"] {
        let (status, body) = get_json(&server, path, &[]);
        assert_eq!(status, 404, "{path}");
        assert_eq!(body["message"], "Dataproduct not found or permission error");
    }
}

#[test]
fn http_e2e_table_has_empty_sublayers() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(&server, "/ch.so.agi.tabelle", &[]);
    assert_eq!(status, 200);
    assert_eq!(body["sublayers"], serde_json::json!([]));
    assert!(body.get("queryable").is_none());
}

#[test]
fn http_e2e_weblayers_keep_request_order() {
    let (server, _dir) = start_server();
    let (status, raw) = get(
        &server,
        "/weblayers?filter=ch.so.agi.tabelle,ch.so.afu.gewaesserschutz,missing",
        &[],
    );
    assert_eq!(status, 200);
    let tabelle = raw.find("\"ch.so.agi.tabelle\"").unwrap();
    let group = raw.find("\"ch.so.afu.gewaesserschutz\":").unwrap();
    let missing = raw.find("\"missing\"").unwrap();
    assert!(tabelle < group && group < missing, "{raw}");

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["ch.so.agi.tabelle"], serde_json::json!([]));
    assert_eq!(body["missing"], serde_json::json!([]));
    let layers = body["ch.so.afu.gewaesserschutz"].as_array().unwrap();
    assert_eq!(layers.len(), 1);
    let root = &layers[0];
    assert_eq!(root["name"], "ch.so.afu.gewaesserschutz");
    assert_eq!(root["abstract"], "Beschreibung");
    assert_eq!(root["bbox"]["crs"], "EPSG:2056");
    assert_eq!(root["sublayers"].as_array().unwrap().len(), 1);
    assert_eq!(root["sublayers"][0]["queryable"], true);
}

#[test]
fn http_e2e_percent_encoded_identifier() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(&server, "/ch.so.agi.gew%C3%A4sser", &[]);
    assert_eq!(status, 200);
    assert_eq!(body["identifier"], "ch.so.agi.gewässer");
    assert_eq!(body["display"], "Gewässer");
}

#[test]
fn http_e2e_catalog_fields_in_declaration_order() {
    let (server, _dir) = start_server();
    let (_, raw) = get(&server, "/ch.so.afu.gewaesserschutz", &[]);
    let identifier = raw.find("\"identifier\"").unwrap();
    let kind = raw.find("\"type\"").unwrap();
    let sublayers = raw.find("\"sublayers\"").unwrap();
    assert!(identifier < kind && kind < sublayers, "{raw}");
}

#[test]
fn http_e2e_weblayers_without_filter_is_empty_object() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(&server, "/weblayers", &[]);
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({}));
}

#[test]
fn http_e2e_health_and_ready() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(&server, "/healthz", &[]);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");

    let (_, ready) = get_json(&server, "/ready", &[]);
    assert_eq!(ready["status"], "OK");
    assert_eq!(ready["tenants"], serde_json::json!({}));

    get(&server, "/ch.so.agi.tabelle", &[]);
    let (_, ready) = get_json(&server, "/ready", &[]);
    assert!(ready["tenants"]["default"].is_string());
}

#[test]
fn http_e2e_describe_service() {
    let (server, _dir) = start_server();
    let (status, body) = get_json(&server, "/", &[]);
    assert_eq!(status, 200);
    assert_eq!(body["service"], "dataproduct-service");
}

#[test]
fn http_e2e_tenant_header_selects_configuration() {
    let (server, dir) = start_server();
    write_tenant(
        dir.path(),
        "other",
        r#"{"resources": {"dataproducts": [{"identifier": "ch.so.agi.tabelle", "type": "table", "display": "Andere"}]}}"#,
    );

    let (_, default) = get_json(&server, "/ch.so.agi.tabelle", &[]);
    assert_eq!(default["display"], "Tabelle");
    let (_, other) = get_json(&server, "/ch.so.agi.tabelle", &[("Tenant", "other")]);
    assert_eq!(other["display"], "Andere");

    let (status, _) = get_json(&server, "/ch.so.agi.tabelle", &[("Tenant", "unknown")]);
    assert_eq!(status, 500);
    let (status, _) = get_json(&server, "/ch.so.agi.tabelle", &[("Tenant", "..")]);
    assert_eq!(status, 400);
}

#[test]
fn http_e2e_reload_picks_up_new_configuration() {
    let (server, dir) = start_server();
    let (_, before) = get_json(&server, "/ch.so.agi.tabelle", &[]);
    assert_eq!(before["display"], "Tabelle");

    write_tenant(
        dir.path(),
        "default",
        &RESOURCES.replace("\"Tabelle\"", "\"Tabelle neu\""),
    );
    let (_, cached) = get_json(&server, "/ch.so.agi.tabelle", &[]);
    assert_eq!(cached["display"], "Tabelle");

    assert_eq!(server.registry.refresh(), vec![TenantName::from("default")]);
    let (_, after) = get_json(&server, "/ch.so.agi.tabelle", &[]);
    assert_eq!(after["display"], "Tabelle neu");
    assert!(server.registry.refresh().is_empty());
}

#[test]
fn http_e2e_non_get_is_405() {
    let (server, _dir) = start_server();
    let resp = agent()
        .post(&format!("{}/ch.so.agi.tabelle", server.url))
        .send_empty()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 405);
}
