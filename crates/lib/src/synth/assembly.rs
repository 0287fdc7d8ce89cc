//! Cloud assembly model.
//!
//! The same types read assemblies written by [`App::synth`](super::App::synth)
//! and by `npx cdk synth`, so every builder inspects asset manifests the same way.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::SynthError;

pub const CLOUD_ASSEMBLY_VERSION: &str = "36.0.0";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";
pub const ASSET_MANIFEST_ARTIFACT_TYPE: &str = "cdk:asset-manifest";

/// `manifest.json` at the root of a cloud assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyManifest {
  pub version: String,
  #[serde(default)]
  pub artifacts: BTreeMap<String, ArtifactManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub environment: Option<String>,
  #[serde(default)]
  pub properties: ArtifactProperties,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template_file: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file: Option<String>,
}

/// `<stack>.assets.json`: what `cdk-assets` publishes and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
  pub version: String,
  #[serde(default)]
  pub files: BTreeMap<String, FileAsset>,
  #[serde(default)]
  pub docker_images: BTreeMap<String, DockerImageAsset>,
}

impl Default for AssetManifest {
  fn default() -> Self {
    Self {
      version: CLOUD_ASSEMBLY_VERSION.to_string(),
      files: BTreeMap::new(),
      docker_images: BTreeMap::new(),
    }
  }
}

impl AssetManifest {
  pub fn from_file(path: &Path) -> Result<Self, SynthError> {
    read_json(path)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAsset {
  pub source: FileSource,
  #[serde(default)]
  pub destinations: BTreeMap<String, FileDestination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub packaging: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDestination {
  pub bucket_name: String,
  pub object_key: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerImageAsset {
  pub source: DockerImageSource,
  #[serde(default)]
  pub destinations: BTreeMap<String, ImageDestination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub directory: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDestination {
  pub repository_name: String,
  pub image_tag: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
  pub id: String,
  pub template_file: PathBuf,
  pub template: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetManifestArtifact {
  pub id: String,
  /// On-disk location, passed to `cdk-assets publish --path`.
  pub file: PathBuf,
  pub contents: AssetManifest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
  Stack(StackArtifact),
  AssetManifest(AssetManifestArtifact),
}

/// A synthesized cloud assembly directory.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
  pub directory: PathBuf,
  pub artifacts: Vec<Artifact>,
}

impl CloudAssembly {
  /// Read `manifest.json` and the artifacts it lists.
  ///
  /// Artifact types other than stacks and asset manifests (trees, nested
  /// assemblies) are ignored.
  pub fn load(directory: &Path) -> Result<Self, SynthError> {
    let manifest: AssemblyManifest = read_json(&directory.join(MANIFEST_FILE_NAME))?;
    let mut artifacts = Vec::new();

    for (id, artifact) in manifest.artifacts {
      match (artifact.kind.as_str(), &artifact.properties) {
        (
          STACK_ARTIFACT_TYPE,
          ArtifactProperties {
            template_file: Some(template_file),
            ..
          },
        ) => {
          let template_file = directory.join(template_file);
          let template = read_json(&template_file)?;
          artifacts.push(Artifact::Stack(StackArtifact {
            id,
            template_file,
            template,
          }));
        }
        (ASSET_MANIFEST_ARTIFACT_TYPE, ArtifactProperties { file: Some(file), .. }) => {
          let file = directory.join(file);
          let contents = AssetManifest::from_file(&file)?;
          artifacts.push(Artifact::AssetManifest(AssetManifestArtifact { id, file, contents }));
        }
        (kind, _) => debug!(artifact = %id, kind, "skipping artifact"),
      }
    }

    Ok(Self {
      directory: directory.to_path_buf(),
      artifacts,
    })
  }

  /// The first asset manifest artifact, if any.
  pub fn asset_manifest(&self) -> Option<&AssetManifestArtifact> {
    self.artifacts.iter().find_map(|artifact| match artifact {
      Artifact::AssetManifest(manifest) => Some(manifest),
      Artifact::Stack(_) => None,
    })
  }

  pub fn get_stack_by_name(&self, id: &str) -> Result<&StackArtifact, SynthError> {
    self
      .artifacts
      .iter()
      .find_map(|artifact| match artifact {
        Artifact::Stack(stack) if stack.id == id => Some(stack),
        _ => None,
      })
      .ok_or_else(|| SynthError::StackNotFound(id.to_string()))
  }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SynthError> {
  let content = fs::read_to_string(path).map_err(|source| SynthError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| SynthError::Json {
    path: path.to_path_buf(),
    source,
  })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, SynthError> {
  let bytes = serde_json::to_vec_pretty(value).map_err(|source| SynthError::Json {
    path: path.to_path_buf(),
    source,
  })?;
  fs::write(path, &bytes).map_err(|source| SynthError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(bytes)
}
