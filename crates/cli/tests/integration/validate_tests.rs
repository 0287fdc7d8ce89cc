//! Validate command integration tests.

use predicates::prelude::*;
use serial_test::serial;

use super::common::TestEnv;

#[test]
#[serial]
fn valid_arguments_pass() {
  let env = TestEnv::with_tools();
  env.write_file("templates/stack.lua", "function CdkStack() end\n");
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\nbootstrap_qualifier: abc\n");

  env
    .handler_cmd()
    .args(["validate", "--config"])
    .arg(&args)
    .assert()
    .success()
    .stderr(predicate::str::contains("is valid"))
    .stderr(predicate::str::contains("bootstrapped"));
}

#[test]
#[serial]
fn stack_definition_is_not_loaded() {
  let env = TestEnv::with_tools();
  env.write_file("templates/stack.lua", "this is not lua (\n");
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapless\n");

  env.handler_cmd().args(["validate", "--config"]).arg(&args).assert().success();

  let log = env.tool_log();
  assert!(!log.contains("npx"), "{}", log);
}

#[test]
#[serial]
fn cdk_json_requires_stack_logical_id() {
  let env = TestEnv::with_tools();
  env.write_file("templates/cdk.json", "{}");
  let args = env.write_args("path: cdk.json\ndeployment_type: cdk_json\n");

  env
    .handler_cmd()
    .args(["validate", "--config"])
    .arg(&args)
    .assert()
    .failure()
    .stderr(predicate::str::contains("stack_logical_id is required"));

  assert!(env.tool_log().is_empty());
}

#[test]
#[serial]
fn missing_node_is_reported() {
  let env = TestEnv::with_tools();
  env.remove_tool("node");
  env.write_file("templates/stack.lua", "function CdkStack() end\n");
  let args = env.write_args("path: stack.lua\ndeployment_type: bootstrapped\n");

  env
    .handler_cmd()
    .args(["validate", "--config"])
    .arg(&args)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Command prerequisite 'node' not found"));
}
