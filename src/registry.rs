use crate::auth::{self, Credentials};
use crate::errors::*;
use crate::reference::ImageRef;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};

#[allow(async_fn_in_trait)]
pub trait DigestResolver {
    /// Look up the digest a tagged image currently points to
    async fn resolve_digest(&self, image: &ImageRef) -> Result<String>;
}

/// Registries that are talked to over plain http
fn is_local(registry: &str) -> bool {
    let host = match registry.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => registry,
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]") || host.ends_with(".local")
}

fn registry_auth(credentials: Option<Credentials>) -> RegistryAuth {
    match credentials {
        Some(credentials) => RegistryAuth::Basic(credentials.username, credentials.password),
        None => RegistryAuth::Anonymous,
    }
}

fn validate_digest(digest: &str) -> Result<()> {
    let (algorithm, encoded) = digest
        .split_once(':')
        .with_context(|| anyhow!("Digest is missing an algorithm: {digest:?}"))?;
    if algorithm.is_empty() || !algorithm.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("Unexpected digest algorithm: {algorithm:?}");
    }
    let buf = hex::decode(encoded).with_context(|| anyhow!("Digest is not hex: {digest:?}"))?;
    if buf.is_empty() {
        bail!("Digest is empty: {digest:?}");
    }
    Ok(())
}

/// Resolves digests by asking the registry over the distribution api
pub struct Registry {
    https: Client,
    http: Client,
}

impl Registry {
    pub fn new() -> Self {
        let https = Client::new(ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        });
        let http = Client::new(ClientConfig {
            protocol: ClientProtocol::Http,
            ..Default::default()
        });
        Registry { https, http }
    }

    fn client_for(&self, reference: &Reference) -> &Client {
        if is_local(reference.registry()) {
            &self.http
        } else {
            &self.https
        }
    }

    /// HEAD the manifest, answering the registry's auth challenge if needed
    async fn fetch_digest(&self, reference: &Reference, auth: &RegistryAuth) -> Result<String> {
        let digest = self
            .client_for(reference)
            .fetch_manifest_digest(reference, auth)
            .await
            .with_context(|| anyhow!("Registry rejected manifest request for {reference}"))?;
        validate_digest(&digest)?;
        Ok(digest)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestResolver for Registry {
    async fn resolve_digest(&self, image: &ImageRef) -> Result<String> {
        let reference = image.to_oci_reference()?;
        debug!("Resolving {image} as {reference}");

        let credentials = auth::lookup(reference.registry()).await?;
        let auth = registry_auth(credentials);

        self.fetch_digest(&reference, &auth).await
    }
}
