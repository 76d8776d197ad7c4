use crate::errors::*;
use crate::manifest::Manifest;
use crate::postprocess;
use crate::registry::{DigestResolver, Registry};
use crate::rewrite;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Pin the images of the manifest at `path` against the real registries
pub async fn run(path: &Path) -> Result<()> {
    let registry = Registry::new();
    pin(path, &registry).await
}

/// Rewrite the manifest at `path` in place.
///
/// The file is only touched once everything else succeeded, and then replaced
/// atomically.
pub async fn pin<R: DigestResolver>(path: &Path, resolver: &R) -> Result<()> {
    let buf = tokio::fs::read_to_string(path)
        .await
        .with_context(|| anyhow!("Failed to read manifest: {path:?}"))
        .context(ErrorKind::Read)?;

    let mut manifest = Manifest::deserialize(&buf)
        .with_context(|| anyhow!("Failed to decode manifest: {path:?}"))
        .context(ErrorKind::Decode)?;
    debug!(
        "Loaded manifest with {} deployments from file",
        manifest.deployments().len()
    );

    let images = rewrite::rewrite(&mut manifest, resolver).await?;
    let replaced = images.iter().filter(|i| i.is_replaced()).count();
    trace!("Rewritten manifest: {manifest:?}");

    let rendered = manifest.serialize().context(ErrorKind::Encode)?;
    let buf = postprocess::process(&rendered, &manifest, &images).context(ErrorKind::Encode)?;

    debug!("Updating manifest: {path:?}");
    persist(path, buf.as_bytes()).context(ErrorKind::Write)?;

    info!(
        "Pinned {} images, {} were already pinned",
        replaced,
        images.len() - replaced
    );
    Ok(())
}

/// Replace the file at `path` by renaming a fully written sibling over it
fn persist(path: &Path, buf: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| anyhow!("Failed to create temporary file in {dir:?}"))?;
    file.write_all(buf)
        .context("Failed to write manifest to temporary file")?;

    let permissions = fs::metadata(path)
        .with_context(|| anyhow!("Failed to read permissions of {path:?}"))?
        .permissions();
    file.as_file()
        .set_permissions(permissions)
        .context("Failed to copy permissions to temporary file")?;
    file.as_file()
        .sync_all()
        .context("Failed to sync manifest to disk")?;

    file.persist(path)
        .with_context(|| anyhow!("Failed to replace {path:?}"))?;
    Ok(())
}
