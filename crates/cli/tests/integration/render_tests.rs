//! Render command integration tests.

use predicates::prelude::*;
use serial_test::serial;

use super::common::{NPM_WITHOUT_PACKAGES, TestEnv};

const BUCKET_STACK: &str = r#"
local cdk = require("cdk")

function CdkStack(app, id, user_data, props)
  local stack = cdk.stack(app, id, props)
  stack:resource("Bucket", "AWS::S3::Bucket", {
    Tags = { { Key = "k", Value = user_data and user_data.k or "none" } },
  })
end
"#;

const ASSET_STACK: &str = r#"
local cdk = require("cdk")

function CdkStack(app, id, user_data, props)
  local stack = cdk.stack(app, id, props)
  local code = stack:file_asset({ path = __dir .. "/code" })
  stack:resource("Function", "AWS::Lambda::Function", {
    Code = { S3Bucket = code.bucket_name, S3Key = code.object_key },
  })
end
"#;

#[test]
#[serial]
fn render_bootstrapped_stack_without_publishing() {
  let env = TestEnv::with_tools();
  env.write_file("templates/stack.lua", BUCKET_STACK);
  env.write_file("user_data.json", r#"{"k": "v"}"#);
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\n");

  env
    .handler_cmd()
    .arg("render")
    .arg("--config")
    .arg(&args)
    .arg("--user-data")
    .arg(env.temp.path().join("user_data.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Type: AWS::S3::Bucket"))
    .stdout(predicate::str::contains("Value: v"))
    .stdout(predicate::str::contains("/cdk-bootstrap/hnb659fds/version"));

  let log = env.tool_log();
  assert!(log.contains("npm list cdk-assets"), "{}", log);
  assert_eq!(log.matches("npx cdk-assets").count(), 0, "{}", log);
}

#[test]
#[serial]
fn qualifier_reaches_the_template() {
  let env = TestEnv::with_tools();
  env.write_file("templates/stack.lua", BUCKET_STACK);
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\nbootstrap_qualifier: custom1\n");

  env
    .handler_cmd()
    .args(["render", "--config"])
    .arg(&args)
    .assert()
    .success()
    .stdout(predicate::str::contains("/cdk-bootstrap/custom1/version"));
}

#[test]
#[serial]
fn file_assets_are_published_once() {
  let env = TestEnv::with_tools();
  env.write_file("templates/stack.lua", ASSET_STACK);
  env.write_file("templates/code/index.js", "exports.handler = async () => {};\n");
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\n");

  env
    .handler_cmd()
    .args(["render", "--config"])
    .arg(&args)
    .assert()
    .success()
    .stdout(predicate::str::contains("AWS::Lambda::Function"));

  let log = env.tool_log();
  assert_eq!(log.matches("npx cdk-assets -v publish --path").count(), 1, "{}", log);
}

#[test]
#[serial]
fn render_cdk_json_project() {
  let env = TestEnv::with_tools();
  env.write_file("templates/app/cdk.json", r#"{"app": "node bin/app.js"}"#);
  let args = env.write_args(
    "path: app/cdk.json\n\
     deployment_type: cdk_json\n\
     stack_logical_id: AppStack\n\
     bootstrapless_config:\n  file_asset_bucket_name: assets\n",
  );

  env
    .handler_cmd()
    .args(["render", "--config"])
    .arg(&args)
    .assert()
    .success()
    .stdout(predicate::str::contains("Type: AWS::SQS::Queue"));

  let log = env.tool_log();
  assert!(log.contains("npx cdk synth AppStack -o"), "{}", log);
  assert!(log.contains("BSS_FILE_ASSET_BUCKET_NAME=assets"), "{}", log);
  assert_eq!(log.matches("npx cdk-assets").count(), 0, "{}", log);
}

#[test]
#[serial]
fn missing_command_stops_render() {
  let env = TestEnv::with_tools();
  env.remove_tool("npx");
  env.write_file("templates/stack.lua", BUCKET_STACK);
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\n");

  env
    .handler_cmd()
    .args(["render", "--config"])
    .arg(&args)
    .assert()
    .failure()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("Command prerequisite 'npx' not found"));
}

#[test]
#[serial]
fn missing_package_stops_render() {
  let env = TestEnv::with_tools();
  env.install_tool("npm", NPM_WITHOUT_PACKAGES);
  env.write_file("templates/stack.lua", BUCKET_STACK);
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\n");

  env
    .handler_cmd()
    .args(["render", "--config"])
    .arg(&args)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Node Package prerequisite 'cdk-assets' not found"));

  let log = env.tool_log();
  assert!(log.contains("npm list cdk-assets"), "{}", log);
  assert!(log.contains("npm --global list cdk-assets"), "{}", log);
}

#[test]
#[serial]
fn unknown_class_name_is_reported() {
  let env = TestEnv::with_tools();
  env.write_file("templates/stack.lua", BUCKET_STACK);
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\nclass_name: Missing\n");

  env
    .handler_cmd()
    .args(["render", "--config"])
    .arg(&args)
    .assert()
    .failure()
    .stderr(predicate::str::contains("No class named Missing on template at"));
}
