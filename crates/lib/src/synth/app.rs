//! The synthesis root and its stacks.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::{Map, Value, json};
use tracing::debug;

use super::assembly::{
  ASSET_MANIFEST_ARTIFACT_TYPE, ArtifactManifest, ArtifactProperties, AssemblyManifest, AssetManifest,
  CLOUD_ASSEMBLY_VERSION, CloudAssembly, DockerImageAsset, DockerImageSource, FileAsset, FileSource,
  MANIFEST_FILE_NAME, STACK_ARTIFACT_TYPE, write_json,
};
use super::asset::{fingerprint, hash_bytes};
use super::synthesizer::StackSynthesizer;
use super::{Context, SynthError};

/// Construct tree root. Cloning yields another handle to the same app.
#[derive(Debug, Clone)]
pub struct App {
  state: Rc<RefCell<AppState>>,
}

#[derive(Debug)]
struct AppState {
  context: Context,
  outdir: PathBuf,
  stacks: Vec<StackState>,
}

#[derive(Debug)]
struct StackState {
  id: String,
  synthesizer: StackSynthesizer,
  description: Option<String>,
  parameters: Map<String, Value>,
  resources: Map<String, Value>,
  outputs: Map<String, Value>,
  files: BTreeMap<String, FileAsset>,
  images: BTreeMap<String, DockerImageAsset>,
}

/// Returned to stack code after adding a file asset.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAssetLocation {
  pub hash: String,
  pub bucket_name: String,
  pub object_key: String,
}

/// Returned to stack code after adding an image asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAssetLocation {
  pub hash: String,
  pub repository_name: String,
  pub image_tag: String,
  pub image_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePackaging {
  File,
  ZipDirectory,
}

impl FilePackaging {
  pub fn as_str(&self) -> &'static str {
    match self {
      FilePackaging::File => "file",
      FilePackaging::ZipDirectory => "zip",
    }
  }
}

fn valid_stack_id(id: &str) -> bool {
  let mut chars = id.chars();
  chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl App {
  pub fn new(context: Context, outdir: impl Into<PathBuf>) -> Self {
    Self {
      state: Rc::new(RefCell::new(AppState {
        context,
        outdir: outdir.into(),
        stacks: Vec::new(),
      })),
    }
  }

  pub fn context_value(&self, key: &str) -> Option<Value> {
    self.state.borrow().context.get(key).cloned()
  }

  pub fn stack_ids(&self) -> Vec<String> {
    self.state.borrow().stacks.iter().map(|s| s.id.clone()).collect()
  }

  /// Register a stack. Without an explicit synthesizer the default one is
  /// derived from the app context.
  pub fn add_stack(
    &self,
    id: &str,
    synthesizer: Option<StackSynthesizer>,
    description: Option<String>,
  ) -> Result<StackHandle, SynthError> {
    if !valid_stack_id(id) {
      return Err(SynthError::InvalidStackId(id.to_string()));
    }

    let mut state = self.state.borrow_mut();
    if state.stacks.iter().any(|stack| stack.id == id) {
      return Err(SynthError::DuplicateStack(id.to_string()));
    }

    let synthesizer = synthesizer.unwrap_or_else(|| StackSynthesizer::from_context(&state.context));
    debug!(stack = id, synthesizer = synthesizer.kind(), "adding stack");

    state.stacks.push(StackState {
      id: id.to_string(),
      synthesizer,
      description,
      parameters: Map::new(),
      resources: Map::new(),
      outputs: Map::new(),
      files: BTreeMap::new(),
      images: BTreeMap::new(),
    });

    Ok(StackHandle {
      app: self.clone(),
      index: state.stacks.len() - 1,
    })
  }

  /// Write the cloud assembly to the output directory and read it back.
  pub fn synth(&self) -> Result<CloudAssembly, SynthError> {
    let state = self.state.borrow();
    let outdir = &state.outdir;
    fs::create_dir_all(outdir).map_err(|source| SynthError::Io {
      path: outdir.clone(),
      source,
    })?;

    let mut manifest = AssemblyManifest {
      version: CLOUD_ASSEMBLY_VERSION.to_string(),
      artifacts: BTreeMap::new(),
    };

    for stack in &state.stacks {
      let template_name = format!("{}.template.json", stack.id);
      let assets_name = format!("{}.assets.json", stack.id);
      let assets_id = format!("{}.assets", stack.id);

      let template_bytes = write_json(&outdir.join(&template_name), &stack.template())?;

      let mut assets = AssetManifest::default();
      assets.files.insert(
        template_name.clone(),
        FileAsset {
          source: FileSource {
            path: Some(template_name.clone()),
            packaging: Some(FilePackaging::File.as_str().to_string()),
          },
          destinations: stack.synthesizer.template_destinations(&hash_bytes(&template_bytes))?,
        },
      );
      assets.files.extend(stack.files.clone());
      assets.docker_images.extend(stack.images.clone());
      write_json(&outdir.join(&assets_name), &assets)?;

      debug!(
        stack = %stack.id,
        files = assets.files.len(),
        images = assets.docker_images.len(),
        "wrote stack artifacts"
      );

      manifest.artifacts.insert(
        assets_id.clone(),
        ArtifactManifest {
          kind: ASSET_MANIFEST_ARTIFACT_TYPE.to_string(),
          environment: None,
          properties: ArtifactProperties {
            template_file: None,
            file: Some(assets_name),
          },
          dependencies: Vec::new(),
        },
      );
      manifest.artifacts.insert(
        stack.id.clone(),
        ArtifactManifest {
          kind: STACK_ARTIFACT_TYPE.to_string(),
          environment: Some("aws://unknown-account/unknown-region".to_string()),
          properties: ArtifactProperties {
            template_file: Some(template_name),
            file: None,
          },
          dependencies: vec![assets_id],
        },
      );
    }

    write_json(&outdir.join(MANIFEST_FILE_NAME), &manifest)?;
    CloudAssembly::load(outdir)
  }
}

impl StackState {
  fn template(&self) -> Value {
    let mut parameters = self.parameters.clone();
    let mut rules = Map::new();
    self.synthesizer.add_bootstrap_checks(&mut parameters, &mut rules);

    let mut template = Map::new();
    if let Some(description) = &self.description {
      template.insert("Description".to_string(), Value::String(description.clone()));
    }
    for (section, entries) in [
      ("Parameters", parameters),
      ("Resources", self.resources.clone()),
      ("Outputs", self.outputs.clone()),
      ("Rules", rules),
    ] {
      if !entries.is_empty() {
        template.insert(section.to_string(), Value::Object(entries));
      }
    }
    Value::Object(template)
  }
}

/// A stack registered on an [`App`].
#[derive(Debug, Clone)]
pub struct StackHandle {
  app: App,
  index: usize,
}

impl StackHandle {
  pub fn id(&self) -> String {
    self.app.state.borrow().stacks[self.index].id.clone()
  }

  fn with_stack<T>(&self, f: impl FnOnce(&mut StackState) -> T) -> T {
    let mut state = self.app.state.borrow_mut();
    f(&mut state.stacks[self.index])
  }

  fn insert(&self, section: &'static str, id: &str, value: Value) -> Result<(), SynthError> {
    self.with_stack(|stack| {
      let entries = match section {
        "parameter" => &mut stack.parameters,
        "output" => &mut stack.outputs,
        _ => &mut stack.resources,
      };
      if entries.contains_key(id) {
        return Err(SynthError::DuplicateConstruct {
          stack: stack.id.clone(),
          section,
          id: id.to_string(),
        });
      }
      entries.insert(id.to_string(), value);
      Ok(())
    })
  }

  /// Add a resource and return a `Ref` to it.
  pub fn add_resource(&self, logical_id: &str, resource_type: &str, properties: Value) -> Result<Value, SynthError> {
    let mut resource = json!({ "Type": resource_type });
    if !properties.is_null() && properties != json!({}) {
      resource["Properties"] = properties;
    }
    self.insert("resource", logical_id, resource)?;
    Ok(json!({ "Ref": logical_id }))
  }

  pub fn add_parameter(&self, name: &str, properties: Value) -> Result<Value, SynthError> {
    self.insert("parameter", name, properties)?;
    Ok(json!({ "Ref": name }))
  }

  pub fn add_output(&self, name: &str, properties: Value) -> Result<(), SynthError> {
    self.insert("output", name, properties)
  }

  /// Stage a file or directory (zipped by `cdk-assets`) for publishing.
  ///
  /// Adding the same content twice yields the same location.
  pub fn add_file_asset(&self, path: &Path) -> Result<FileAssetLocation, SynthError> {
    let path = dunce::canonicalize(path).map_err(|source| SynthError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let packaging = if path.is_dir() {
      FilePackaging::ZipDirectory
    } else {
      FilePackaging::File
    };
    let extension = match packaging {
      FilePackaging::ZipDirectory => ".zip".to_string(),
      FilePackaging::File => path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default(),
    };

    let hash = fingerprint(&path)?;
    self.with_stack(|stack| {
      let placement = stack.synthesizer.place_file(&hash, &extension)?;
      stack.files.entry(hash.clone()).or_insert_with(|| FileAsset {
        source: FileSource {
          path: Some(path.to_string_lossy().into_owned()),
          packaging: Some(packaging.as_str().to_string()),
        },
        destinations: placement.destinations,
      });
      Ok(FileAssetLocation {
        hash,
        bucket_name: placement.bucket_name,
        object_key: placement.object_key,
      })
    })
  }

  /// Stage a Docker build context for publishing.
  pub fn add_image_asset(&self, directory: &Path, docker_file: Option<String>) -> Result<ImageAssetLocation, SynthError> {
    let directory = dunce::canonicalize(directory).map_err(|source| SynthError::Io {
      path: directory.to_path_buf(),
      source,
    })?;
    let hash = fingerprint(&directory)?;

    self.with_stack(|stack| {
      let placement = stack.synthesizer.place_image(&hash)?;
      stack.images.entry(hash.clone()).or_insert_with(|| DockerImageAsset {
        source: DockerImageSource {
          directory: Some(directory.to_string_lossy().into_owned()),
          docker_file,
        },
        destinations: placement.destinations,
      });
      Ok(ImageAssetLocation {
        hash,
        repository_name: placement.repository_name,
        image_tag: placement.image_tag,
        image_uri: placement.image_uri,
      })
    })
  }
}
