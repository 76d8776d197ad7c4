use crate::errors::*;
use crate::manifest::Manifest;
use crate::reference::ImageRef;
use crate::registry::DigestResolver;

/// The image of one container after rewriting, keyed by its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    pub deployment: usize,
    pub container: usize,
    pub image: String,
    /// The tag the image was pinned from, `None` if it was already pinned
    pub tag: Option<String>,
}

impl ContainerImage {
    pub fn is_replaced(&self) -> bool {
        self.tag.is_some()
    }
}

/// Pin every tagged container image in the manifest to its digest.
///
/// Containers are visited in deployment order, then container order. The
/// returned list has one entry per container, in the same order. On error the
/// manifest may be partially rewritten and must be discarded.
pub async fn rewrite<R: DigestResolver>(
    manifest: &mut Manifest,
    resolver: &R,
) -> Result<Vec<ContainerImage>> {
    let mut images = Vec::new();

    for (deployment_idx, deployment) in manifest.deployments_mut().iter_mut().enumerate() {
        for (container_idx, container) in deployment.containers_mut().iter_mut().enumerate() {
            let image_ref = container
                .image
                .parse::<ImageRef>()
                .with_context(|| anyhow!("Failed to parse image reference: {:?}", container.image))
                .context(ErrorKind::ReferenceParse)?;

            if image_ref.is_pinned() {
                debug!("Image is already pinned: {:?}", container.image);
                images.push(ContainerImage {
                    deployment: deployment_idx,
                    container: container_idx,
                    image: container.image.clone(),
                    tag: None,
                });
                continue;
            }

            let digest = resolver
                .resolve_digest(&image_ref)
                .await
                .with_context(|| anyhow!("Failed to resolve digest for image: {image_ref}"))
                .context(ErrorKind::RegistryLookup)?;

            let pinned_image = image_ref.pin(&digest).to_string();
            info!(
                "Resolved image reference {:?} to {:?}",
                container.image, pinned_image
            );
            container.image.clone_from(&pinned_image);

            images.push(ContainerImage {
                deployment: deployment_idx,
                container: container_idx,
                image: pinned_image,
                tag: Some(image_ref.tag_or_digest().to_string()),
            });
        }
    }

    Ok(images)
}
