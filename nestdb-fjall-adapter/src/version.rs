use cargo_toml::{Dependency, Manifest};
use nestdb::errors::{ErrorKind, NestError, NestResult};

/// Version of the fjall engine this adapter was built against, read from the
/// adapter's own manifest.
pub(crate) fn fjall_version() -> NestResult<String> {
    dependency_version(include_str!("../Cargo.toml"), "fjall")
}

fn dependency_version(manifest: &str, name: &str) -> NestResult<String> {
    let manifest = Manifest::from_str(manifest).map_err(|e| {
        log::error!("Failed to parse adapter manifest: {}", e);
        NestError::new(
            &format!("Failed to parse adapter manifest: {}", e),
            ErrorKind::InternalError,
        )
    })?;

    let version = match manifest.dependencies.get(name) {
        Some(Dependency::Simple(version)) => Some(version.clone()),
        Some(Dependency::Detailed(detail)) => detail.version.clone(),
        Some(Dependency::Inherited(_)) | None => None,
    };

    version.ok_or_else(|| {
        log::error!("No version declared for dependency {}", name);
        NestError::new(
            &format!("No version declared for dependency {}", name),
            ErrorKind::InternalError,
        )
    })
}
