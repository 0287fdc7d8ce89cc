//! Check command integration tests.

use predicates::prelude::*;
use serial_test::serial;

use super::common::TestEnv;

#[test]
#[serial]
fn all_prerequisites_found() {
  let env = TestEnv::with_tools();

  env
    .handler_cmd()
    .args(["check", "--json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"name\": \"cdk-assets\""))
    .stdout(predicate::str::contains("\"found\": false").not());
}

#[test]
#[serial]
fn missing_tools_fail_the_check() {
  let env = TestEnv::without_tools();

  env
    .handler_cmd()
    .arg("check")
    .assert()
    .failure()
    .stderr(predicate::str::contains("command node not found"))
    .stderr(predicate::str::contains("3 prerequisite(s) missing"));
}
