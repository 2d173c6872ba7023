//! Per-tenant configuration: resources snapshot plus permissions document.

use crate::catalog::CatalogSnapshot;
use crate::service::DataproductService;
use crate::CoreError;
use dataproduct_schema::{
    parse_permissions_file, ExtentSettings, PermissionsDocument, TenantName,
    PERMISSIONS_FILE_NAME, RESOURCES_FILE_NAME,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a tenant is served from: its resources snapshot and its
/// permissions document, loaded together from `{config_dir}/{tenant}/`.
#[derive(Debug)]
pub struct TenantConfig {
    pub tenant: TenantName,
    pub snapshot: CatalogSnapshot,
    pub permissions: PermissionsDocument,
    fingerprint: String,
}

impl TenantConfig {
    pub fn load(config_dir: &Path, tenant: &TenantName) -> Result<Self, CoreError> {
        let dir = tenant_dir(config_dir, tenant)?;
        // Taken before parsing; a concurrent edit shows up as stale next time.
        let fingerprint = fingerprint_of(&dir)?;
        let snapshot = CatalogSnapshot::load(&dir.join(RESOURCES_FILE_NAME))?;
        let permissions = parse_permissions_file(dir.join(PERMISSIONS_FILE_NAME))?;
        info!(
            "tenant '{tenant}': {} dataproducts, {} roles",
            snapshot.len(),
            permissions.roles.len()
        );
        Ok(Self {
            tenant: tenant.clone(),
            snapshot,
            permissions,
            fingerprint,
        })
    }

    /// blake3 digest over both configuration files as they were loaded.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether the files under `config_dir` differ from what was loaded.
    pub fn is_stale(&self, config_dir: &Path) -> Result<bool, CoreError> {
        let dir = tenant_dir(config_dir, &self.tenant)?;
        Ok(fingerprint_of(&dir)? != self.fingerprint)
    }

    pub fn service<'a>(
        &'a self,
        extent: &'a ExtentSettings,
    ) -> DataproductService<'a, CatalogSnapshot, PermissionsDocument> {
        DataproductService::new(&self.snapshot, &self.permissions, extent)
    }
}

fn tenant_dir(config_dir: &Path, tenant: &TenantName) -> Result<PathBuf, CoreError> {
    let dir = config_dir.join(tenant);
    if !dir.is_dir() {
        return Err(CoreError::TenantNotFound {
            tenant: tenant.to_string(),
            path: dir,
        });
    }
    Ok(dir)
}

fn fingerprint_of(dir: &Path) -> Result<String, CoreError> {
    let mut hasher = blake3::Hasher::new();
    for name in [RESOURCES_FILE_NAME, PERMISSIONS_FILE_NAME] {
        let bytes = fs::read(dir.join(name))?;
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataproduct_schema::Identity;

    const RESOURCES: &str =
        r#"{"resources": {"dataproducts": [{"identifier": "a", "type": "datasetview"}]}}"#;
    const PERMISSIONS: &str =
        r#"{"roles": [{"role": "public", "permissions": {"dataproducts": ["a"]}}]}"#;

    fn write_tenant(root: &Path, tenant: &str, resources: &str, permissions: &str) {
        let dir = root.join(tenant);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RESOURCES_FILE_NAME), resources).unwrap();
        fs::write(dir.join(PERMISSIONS_FILE_NAME), permissions).unwrap();
    }

    #[test]
    fn loads_tenant_and_serves_requests() {
        let root = tempfile::tempdir().unwrap();
        write_tenant(root.path(), "default", RESOURCES, PERMISSIONS);
        let config = TenantConfig::load(root.path(), &TenantName::from("default")).unwrap();
        let extent = ExtentSettings::default();
        let node = config
            .service(&extent)
            .get_dataproduct(&Identity::anonymous(), "a");
        assert_eq!(node.unwrap().identifier, "a");
    }

    #[test]
    fn missing_tenant_directory() {
        let root = tempfile::tempdir().unwrap();
        let err = TenantConfig::load(root.path(), &TenantName::from("nobody")).unwrap_err();
        assert!(matches!(err, CoreError::TenantNotFound { .. }));
    }

    #[test]
    fn missing_permissions_file_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("t");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RESOURCES_FILE_NAME), "{}").unwrap();
        let err = TenantConfig::load(root.path(), &TenantName::from("t")).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn permissions_edit_marks_config_stale() {
        let root = tempfile::tempdir().unwrap();
        write_tenant(root.path(), "default", RESOURCES, PERMISSIONS);
        let config = TenantConfig::load(root.path(), &TenantName::from("default")).unwrap();
        assert!(!config.is_stale(root.path()).unwrap());

        write_tenant(
            root.path(),
            "default",
            RESOURCES,
            r#"{"roles": [{"role": "public", "permissions": {"dataproducts": []}}]}"#,
        );
        assert!(config.is_stale(root.path()).unwrap());
    }

    #[test]
    fn removed_tenant_directory_reports_error() {
        let root = tempfile::tempdir().unwrap();
        write_tenant(root.path(), "default", RESOURCES, PERMISSIONS);
        let config = TenantConfig::load(root.path(), &TenantName::from("default")).unwrap();
        fs::remove_dir_all(root.path().join("default")).unwrap();
        assert!(matches!(
            config.is_stale(root.path()),
            Err(CoreError::TenantNotFound { .. })
        ));
    }
}
