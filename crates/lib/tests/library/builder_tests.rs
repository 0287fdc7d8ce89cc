//! Builders driven by Lua stack definitions, with a recording tool runner.

use std::collections::BTreeMap;
use std::rc::Rc;

use cdk_handler_lib::builder::{BootstraplessBuilder, BootstrappedBuilder, Toolkit};
use cdk_handler_lib::environment::{ConnectionSettings, EnvironmentVariables};
use cdk_handler_lib::lua::{ClassImporter, StackImporter};
use cdk_handler_lib::synth::Context;
use cdk_handler_lib::synth::synthesizer::CURRENT_ENVIRONMENT;
use serde_json::Value;

use super::common::{Project, RecordingRunner};

const ASSET_STACK: &str = r#"
local cdk = require("cdk")

function CdkStack(app, id, user_data, props)
  local stack = cdk.stack(app, id, props)
  local code = stack:file_asset(__dir .. "/handler")
  stack:resource("Function", "AWS::Lambda::Function", {
    Code = { S3Bucket = code.bucket_name, S3Key = code.object_key },
  })
  if user_data.image then
    local image = stack:image_asset({ directory = __dir .. "/image" })
    stack:output("Image", { Value = image.image_uri })
  end
end
"#;

fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn asset_project() -> (Project, std::path::PathBuf) {
  let project = Project::new();
  project.write("templates/handler/index.py", "def handler(event, context):\n    return {}\n");
  project.write("templates/image/Dockerfile", "FROM scratch\n");
  let file = project.write("templates/stack.lua", ASSET_STACK);
  (project, file)
}

fn toolkit(runner: &Rc<RecordingRunner>) -> Toolkit {
  Toolkit::new(
    runner.clone(),
    ConnectionSettings::new(Some("eu-west-1".to_string())),
    EnvironmentVariables::from([("HOME".to_string(), "/home/test".to_string())]),
  )
}

#[test]
fn bootstrapless_assets_fan_out_per_region() {
  let (project, file) = asset_project();
  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let runner = Rc::new(RecordingRunner::default());

  let builder = BootstraplessBuilder::new(
    toolkit(&runner),
    importer.import_class(&file, "CdkStack").unwrap(),
    options(&[
      ("file_asset_bucket_name", "deploy-assets"),
      ("file_asset_prefix", "lambda/"),
      ("file_asset_region_set", "us-east-1, eu-west-1"),
    ]),
  );
  let template = builder
    .build_template(&Context::new(), &serde_json::json!({}))
    .unwrap();

  assert_eq!(template["Resources"]["Function"]["Properties"]["Code"]["S3Bucket"], "deploy-assets");
  let key = template["Resources"]["Function"]["Properties"]["Code"]["S3Key"].as_str().unwrap();
  assert!(key.starts_with("lambda/") && key.ends_with(".zip"), "{}", key);

  let published = runner.published.borrow();
  assert_eq!(published.len(), 1);
  let asset = published[0]
    .files
    .iter()
    .find(|(name, _)| !name.ends_with(".template.json"))
    .map(|(_, asset)| asset)
    .unwrap();
  let regions: Vec<_> = asset.destinations.keys().cloned().collect();
  assert_eq!(regions, vec!["eu-west-1".to_string(), "us-east-1".to_string()]);
}

#[test]
fn in_process_publish_carries_no_bss_variables() {
  let (project, file) = asset_project();
  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let runner = Rc::new(RecordingRunner::default());

  let builder = BootstraplessBuilder::new(
    toolkit(&runner),
    importer.import_class(&file, "CdkStack").unwrap(),
    options(&[
      ("file_asset_bucket_name", "deploy-assets"),
      ("image_asset_repository_name", "images"),
    ]),
  );
  let template = builder
    .build_template(&Context::new(), &serde_json::json!({ "image": true }))
    .unwrap();
  assert!(template["Outputs"]["Image"]["Value"].is_object());

  let commands = runner.commands();
  assert_eq!(commands.len(), 1);
  let env = commands[0].env.as_ref().unwrap();
  assert!(env.keys().all(|key| !key.starts_with("BSS_")));
  assert_eq!(env["CDK_DEFAULT_REGION"], "eu-west-1");
  assert_eq!(env["HOME"], "/home/test");

  let published = runner.published.borrow();
  let image = published[0].docker_images.values().next().unwrap();
  assert_eq!(image.destinations[CURRENT_ENVIRONMENT].repository_name, "images");
}

#[test]
fn bootstrapped_template_without_assets_is_not_published() {
  let project = Project::new();
  let file = project.write(
    "templates/stack.lua",
    r#"
      local cdk = require("cdk")
      function CdkStack(app, id, user_data, props)
        local stack = cdk.stack(app, id, { description = "plain stack" })
        stack:parameter("Env", { Type = "String", Default = "dev" })
        stack:resource("Topic", "AWS::SNS::Topic", { TopicName = cdk.sub("${Env}-alerts") })
      end
    "#,
  );
  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let runner = Rc::new(RecordingRunner::default());

  let builder = BootstrappedBuilder::new(toolkit(&runner), importer.import_class(&file, "CdkStack").unwrap());
  let template = builder.build_template(&Context::new(), &Value::Null).unwrap();

  assert!(runner.commands().is_empty());
  assert_eq!(template["Description"], "plain stack");
  assert_eq!(template["Parameters"]["Env"]["Default"], "dev");
  assert_eq!(
    template["Resources"]["Topic"]["Properties"]["TopicName"],
    serde_json::json!({ "Fn::Sub": "${Env}-alerts" })
  );
}
