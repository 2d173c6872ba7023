//! HTTP server library for the dataproduct service.
//!
//! Serves permission-filtered catalog trees (`GET /{id}`) and display trees
//! (`GET /weblayers?filter=a,b`) per tenant. Tenant configuration lives in
//! `{config_dir}/{tenant}/` and is loaded on the first request for that
//! tenant. [`TenantRegistry::refresh`] reloads tenants whose files changed;
//! `run_server` calls it periodically from a background thread.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use dataproduct_core::{CoreError, TenantConfig};
use dataproduct_schema::{Identity, SchemaError, ServiceSettings, TenantName};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

/// Header carrying the authenticated user name, set by the fronting proxy.
pub const AUTH_USER_HEADER: &str = "X-Auth-User";
/// Header selecting the tenant; absent means the configured default tenant.
pub const TENANT_HEADER: &str = "Tenant";

const NOT_FOUND_MESSAGE: &str = "Dataproduct not found or permission error";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP server on {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Loaded tenant configurations, keyed by tenant name.
pub struct TenantRegistry {
    settings: ServiceSettings,
    tenants: RwLock<HashMap<TenantName, Arc<TenantConfig>>>,
}

impl TenantRegistry {
    pub fn new(settings: ServiceSettings) -> Self {
        Self {
            settings,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Configuration of `tenant`, loading it on first use.
    pub fn get(&self, tenant: &TenantName) -> Result<Arc<TenantConfig>, CoreError> {
        if let Some(config) = self
            .tenants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tenant)
        {
            return Ok(Arc::clone(config));
        }

        let loaded = Arc::new(TenantConfig::load(&self.settings.config_dir, tenant)?);
        let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        // A concurrent request may have loaded it meanwhile; keep the first.
        let config = tenants.entry(tenant.clone()).or_insert(loaded);
        Ok(Arc::clone(config))
    }

    /// Re-read the configuration of `tenant` and swap it in. Requests already
    /// holding the previous configuration finish against it. On failure the
    /// previous configuration stays in place.
    pub fn reload(&self, tenant: &TenantName) -> Result<Arc<TenantConfig>, CoreError> {
        let loaded = Arc::new(TenantConfig::load(&self.settings.config_dir, tenant)?);
        info!(
            "reloaded tenant '{tenant}' (generation {})",
            loaded.snapshot.short_generation()
        );
        self.tenants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tenant.clone(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Reload every loaded tenant whose configuration files changed on disk.
    /// Returns the tenants that were swapped. A tenant whose files are
    /// missing or invalid keeps serving its previous configuration.
    pub fn refresh(&self) -> Vec<TenantName> {
        let loaded: Vec<Arc<TenantConfig>> = self
            .tenants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut swapped = Vec::new();
        for config in loaded {
            let tenant = &config.tenant;
            match config.is_stale(&self.settings.config_dir) {
                Ok(false) => {}
                Ok(true) => match self.reload(tenant) {
                    Ok(_) => swapped.push(tenant.clone()),
                    Err(e) => warn!("keeping previous configuration of '{tenant}': {e}"),
                },
                Err(e) => warn!("cannot check configuration of '{tenant}': {e}"),
            }
        }
        swapped
    }

    /// Short snapshot generation of every loaded tenant.
    pub fn generations(&self) -> BTreeMap<String, String> {
        self.tenants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, config)| {
                (
                    name.to_string(),
                    config.snapshot.short_generation().to_owned(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Describe,
    Ready,
    Healthz,
    Weblayers { filter: String },
    Dataproduct(String),
    Unknown,
}

/// Map a request target (path plus optional query) to a route. The path is
/// percent-decoded; the filter is decoded as a query value.
pub fn parse_route(target: &str) -> Route {
    let Ok(url) = url::Url::parse(&format!("http://localhost{target}")) else {
        return Route::Unknown;
    };
    let Ok(path) = percent_decode_str(url.path()).decode_utf8() else {
        return Route::Unknown;
    };
    match path.trim_start_matches('/') {
        "" => Route::Describe,
        "ready" => Route::Ready,
        "healthz" => Route::Healthz,
        "weblayers" => {
            let filter = url
                .query_pairs()
                .find(|(key, _)| key == "filter")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            Route::Weblayers { filter }
        }
        id if !id.contains('/') => Route::Dataproduct(id.to_owned()),
        _ => Route::Unknown,
    }
}

/// Tenant names become directory names; only plain names are accepted.
pub fn is_valid_tenant(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn header_value<'r>(req: &'r Request, name: &'static str) -> Option<&'r str> {
    req.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().trim())
        .filter(|v| !v.is_empty())
}

fn identity_of(req: &Request) -> Identity {
    match header_value(req, AUTH_USER_HEADER) {
        Some(user) => Identity::user(user),
        None => Identity::anonymous(),
    }
}

/// Response body bytes. Typed bodies are written as declared: field order
/// and map order (e.g. weblayer keys in request order) are kept.
pub fn encode_json<T: Serialize>(body: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(body)
}

fn respond_json<T: Serialize>(req: Request, code: u16, body: &T) {
    let bytes = match encode_json(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to serialize response: {e}");
            let _ = req.respond(Response::empty(500));
            return;
        }
    };
    let mut response = Response::from_data(bytes).with_status_code(StatusCode(code));
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    let _ = req.respond(response);
}

fn respond_message(req: Request, code: u16, message: &str) {
    respond_json(req, code, &json!({ "message": message }));
}

fn describe() -> serde_json::Value {
    json!({
        "service": "dataproduct-service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/{identifier}", "/weblayers?filter=<identifiers>", "/ready", "/healthz"],
    })
}

/// Handle a single HTTP request.
pub fn handle_request(registry: &TenantRegistry, req: Request) {
    let method = req.method().clone();
    let target = req.url().to_owned();
    debug!("{method} {target}");

    if method != Method::Get {
        respond_message(req, 405, "method not allowed");
        return;
    }

    let route = parse_route(&target);
    match &route {
        Route::Describe => respond_json(req, 200, &describe()),
        Route::Healthz => respond_json(req, 200, &json!({ "status": "OK" })),
        Route::Ready => respond_json(
            req,
            200,
            &json!({ "status": "OK", "tenants": registry.generations() }),
        ),
        Route::Unknown => respond_message(req, 404, "not found"),
        Route::Weblayers { .. } | Route::Dataproduct(_) => {
            handle_query(registry, req, &route);
        }
    }
}

fn handle_query(registry: &TenantRegistry, req: Request, route: &Route) {
    let tenant = match header_value(&req, TENANT_HEADER) {
        Some(name) if is_valid_tenant(name) => TenantName::from(name),
        Some(name) => {
            debug!("rejecting tenant name '{name}'");
            respond_message(req, 400, "invalid tenant");
            return;
        }
        None => registry.settings().default_tenant.clone(),
    };
    let config = match registry.get(&tenant) {
        Ok(config) => config,
        Err(e) => {
            error!("tenant '{tenant}': {e}");
            respond_message(req, 500, "tenant configuration unavailable");
            return;
        }
    };

    let identity = identity_of(&req);
    let service = config.service(&registry.settings().extent);
    match route {
        Route::Dataproduct(id) => match service.get_dataproduct(&identity, id) {
            Some(node) => respond_json(req, 200, &node),
            None => respond_message(req, 404, NOT_FOUND_MESSAGE),
        },
        Route::Weblayers { filter } => {
            let results = service.get_weblayers(&identity, filter);
            respond_json(req, 200, &results);
        }
        _ => respond_message(req, 404, "not found"),
    }
}

/// Start a background thread calling [`TenantRegistry::refresh`] every
/// `interval`.
pub fn spawn_reloader(
    registry: &Arc<TenantRegistry>,
    interval: Duration,
) -> std::thread::JoinHandle<()> {
    let registry = Arc::clone(registry);
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        let swapped = registry.refresh();
        if !swapped.is_empty() {
            debug!("refreshed {} tenant(s)", swapped.len());
        }
    })
}

/// Bind `addr` and serve requests on `workers` threads, blocking the current
/// thread until the server shuts down. With a `reload_interval`, changed
/// tenant configuration is picked up without a restart.
pub fn run_server(
    registry: &Arc<TenantRegistry>,
    addr: &str,
    workers: usize,
    reload_interval: Option<Duration>,
) -> Result<(), ServerError> {
    let server = Arc::new(Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        message: e.to_string(),
    })?);
    info!("listening on {addr} with {workers} workers");
    if let Some(interval) = reload_interval {
        info!("checking tenant configuration every {}s", interval.as_secs());
        spawn_reloader(registry, interval);
    }

    let handles: Vec<_> = (0..workers.max(1))
        .map(|_| {
            let server = Arc::clone(&server);
            let registry = Arc::clone(registry);
            std::thread::spawn(move || {
                for request in server.incoming_requests() {
                    handle_request(&registry, request);
                }
            })
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }
    Ok(())
}

/// A test helper that starts a server on a random port in a background thread.
///
/// Drop the `TestServer` to stop the server (via `Server::unblock`).
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub registry: Arc<TenantRegistry>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server on `127.0.0.1:0` serving `settings`.
    pub fn start(settings: ServiceSettings) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let registry = Arc::new(TenantRegistry::new(settings));
        let srv = Arc::clone(&server);
        let reg = Arc::clone(&registry);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&reg, request);
            }
        });

        Self {
            url,
            port,
            registry,
            server,
            _handle: handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}
