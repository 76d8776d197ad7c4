use crate::errors::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Fields that are not inspected, carried through unchanged
pub type Extra = IndexMap<String, serde_yaml::Value>;

/// A ClusterServiceVersion, modeled only along the path to its container images.
///
/// The image path is
/// `spec.install.spec.deployments[*].spec.template.spec.containers[*].image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub extra: Extra,
    pub spec: ManifestSpec,
    /// Populated by the cluster, never meaningful as input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_yaml::Value>,
}

impl Manifest {
    pub fn deserialize(buf: &str) -> Result<Self> {
        let manifest = serde_yaml::from_str(buf).context("Failed to load manifest from yaml")?;
        Ok(manifest)
    }

    pub fn serialize(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self).context("Failed to render manifest as yaml")?;
        Ok(yaml)
    }

    pub fn deployments(&self) -> &[DeploymentSpec] {
        &self.spec.install.spec.deployments
    }

    pub fn deployments_mut(&mut self) -> &mut [DeploymentSpec] {
        &mut self.spec.install.spec.deployments
    }

    /// Every string under an `image` key, in the order [`Manifest::serialize`] renders them
    pub fn rendered_images(&self) -> Result<Vec<RenderedImage>> {
        let document = serde_yaml::to_value(self).context("Failed to convert manifest to yaml")?;
        let mut images = Vec::new();
        collect_images(&document, &mut Vec::new(), &mut images);
        Ok(images)
    }
}

/// An `image` value somewhere in the rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Deployment and container index, if this is the image of a deployment container
    pub container: Option<(usize, usize)>,
    pub image: String,
}

#[derive(Debug)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
    Other,
}

fn container_position(path: &[Segment]) -> Option<(usize, usize)> {
    use Segment::*;
    match path {
        [
            Key("spec"),
            Key("install"),
            Key("spec"),
            Key("deployments"),
            Index(deployment),
            Key("spec"),
            Key("template"),
            Key("spec"),
            Key("containers"),
            Index(container),
            Key("image"),
        ] => Some((*deployment, *container)),
        _ => None,
    }
}

fn collect_images<'a>(value: &'a Value, path: &mut Vec<Segment<'a>>, out: &mut Vec<RenderedImage>) {
    match value {
        Value::Mapping(mapping) => {
            for (key, value) in mapping {
                let key = key.as_str();
                path.push(key.map_or(Segment::Other, Segment::Key));
                match value {
                    Value::String(image) if key == Some("image") => out.push(RenderedImage {
                        container: container_position(path),
                        image: image.clone(),
                    }),
                    _ => collect_images(value, path, out),
                }
                path.pop();
            }
        }
        Value::Sequence(sequence) => {
            for (idx, value) in sequence.iter().enumerate() {
                path.push(Segment::Index(idx));
                collect_images(value, path, out);
                path.pop();
            }
        }
        Value::Tagged(tagged) => collect_images(&tagged.value, path, out),
        _ => (),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSpec {
    pub install: InstallStrategy,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallStrategy {
    #[serde(default)]
    pub strategy: String,
    pub spec: StrategyDetails,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDetails {
    #[serde(default)]
    pub deployments: Vec<DeploymentSpec>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub name: String,
    pub spec: Deployment,
    #[serde(flatten)]
    pub extra: Extra,
}

impl DeploymentSpec {
    pub fn containers(&self) -> &[Container] {
        &self.spec.template.spec.containers
    }

    pub fn containers_mut(&mut self) -> &mut [Container] {
        &mut self.spec.template.spec.containers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(flatten)]
    pub extra: Extra,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(flatten)]
    pub extra: Extra,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    pub containers: Vec<Container>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(flatten)]
    pub extra: Extra,
}
