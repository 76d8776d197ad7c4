use crate::errors::*;
use oci_distribution::Reference;
use std::fmt;
use std::str::FromStr;

/// Tag implied by a reference that names neither a tag nor a digest
pub const DEFAULT_TAG: &str = "latest";

const DIGEST_PREFIX: &str = "sha256";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ImageRef {
    /// Everything in front of the tag or digest, as written
    pub repo: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    /// The digest if there is one, otherwise the tag (defaulting to `latest`)
    pub fn tag_or_digest(&self) -> &str {
        self.digest
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or(DEFAULT_TAG)
    }

    /// Whether the reference already points at content instead of a tag.
    ///
    /// This only looks at the first characters of the tag-or-digest, a tag
    /// that happens to start with `sha256` is treated as pinned too.
    pub fn is_pinned(&self) -> bool {
        let value = self.tag_or_digest();
        value.len() > DIGEST_PREFIX.len() && value.starts_with(DIGEST_PREFIX)
    }

    /// Replace the tag with a digest, keeping the repository as written
    pub fn pin(&self, digest: &str) -> ImageRef {
        ImageRef {
            repo: self.repo.clone(),
            tag: None,
            digest: Some(digest.to_string()),
        }
    }

    /// The reference to query the registry with, the digest wins over the tag
    pub fn to_oci_reference(&self) -> Result<Reference> {
        let name = self
            .repo
            .parse::<Reference>()
            .with_context(|| anyhow!("Invalid repository name: {:?}", self.repo))?;
        let registry = name.registry().to_string();
        let repository = name.repository().to_string();

        let reference = if let Some(digest) = &self.digest {
            Reference::with_digest(registry, repository, digest.clone())
        } else {
            let tag = self.tag.as_deref().unwrap_or(DEFAULT_TAG);
            Reference::with_tag(registry, repository, tag.to_string())
        };
        Ok(reference)
    }
}

impl FromStr for ImageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            bail!("Image reference is empty");
        }

        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (s, None),
        };

        // repository and tag follow the distribution grammar, the digest is
        // checked on its own so short digests in hand-written manifests pass
        name.parse::<Reference>()
            .with_context(|| anyhow!("Invalid image name: {name:?}"))?;
        if let Some(digest) = digest {
            if !is_valid_digest(digest) {
                bail!("Invalid digest: {digest:?}");
            }
        }

        // a colon only starts a tag if it's in the last path component
        let last_component = name.rfind('/').map(|idx| idx + 1).unwrap_or(0);
        let (repo, tag) = match name[last_component..].rfind(':') {
            Some(idx) => {
                let idx = last_component + idx;
                (&name[..idx], Some(&name[idx + 1..]))
            }
            None => (name, None),
        };

        Ok(ImageRef {
            repo: repo.to_string(),
            tag: tag.map(String::from),
            digest: digest.map(String::from),
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repo = &self.repo;
        if let Some(digest) = &self.digest {
            write!(f, "{repo}@{digest}")
        } else if let Some(tag) = &self.tag {
            write!(f, "{repo}:{tag}")
        } else {
            f.write_str(repo)
        }
    }
}

/// `algorithm:encoded`, the encoded part isn't length checked
fn is_valid_digest(digest: &str) -> bool {
    let Some((algorithm, encoded)) = digest.split_once(':') else {
        return false;
    };

    let algorithm_ok = algorithm.split(['-', '_', '+', '.']).all(|component| {
        component.starts_with(|c: char| c.is_ascii_alphabetic())
            && component.chars().all(|c| c.is_ascii_alphanumeric())
    });
    let encoded_ok = !encoded.is_empty()
        && encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '=' | '_' | '-'));

    algorithm_ok && encoded_ok
}
