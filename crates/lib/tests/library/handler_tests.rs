//! The handler through its public API.

use std::rc::Rc;

use cdk_handler_lib::config::HandlerArgs;
use cdk_handler_lib::environment::EnvironmentVariables;
use cdk_handler_lib::handler::{Handler, HandlerError};
use cdk_handler_lib::synth::QUALIFIER_CONTEXT_KEY;
use serde_json::json;

use super::common::{AllPresent, Project, RecordingRunner};

const BUCKET_STACK: &str = r#"
local cdk = require("cdk")

function CdkStack(app, id, user_data, props)
  cdk.stack(app, id, props):resource("Bucket", "AWS::S3::Bucket", {
    Tags = { { Key = "k", Value = user_data.k } },
  })
end
"#;

const TEMPLATE_ONLY_MANIFEST: &str = r#"{
  "version": "36.0.0",
  "files": { "AppStack.template.json": { "source": { "path": "AppStack.template.json" }, "destinations": {} } },
  "dockerImages": {}
}"#;

fn handler(project: &Project, args: &str, runner: &Rc<RecordingRunner>) -> Handler {
  Handler::new("test", HandlerArgs::from_yaml_str(args).unwrap(), &project.root)
    .with_runner(runner.clone())
    .with_prerequisites(Box::new(AllPresent))
    .with_base_env(EnvironmentVariables::new())
}

#[test]
fn single_bucket_stack_renders_without_publishing() {
  let project = Project::new();
  project.write("templates/stack.lua", BUCKET_STACK);
  let runner = Rc::new(RecordingRunner::default());

  let yaml = handler(&project, "path: stack.lua\ndeployment_type: bootstrapped\ncontext: {}\n", &runner)
    .with_user_data(json!({ "k": "v" }))
    .render()
    .unwrap();

  let template: serde_json::Value = serde_yaml::from_str(&yaml).unwrap();
  let resources = template["Resources"].as_object().unwrap();
  assert_eq!(resources.len(), 1);
  assert_eq!(resources["Bucket"]["Type"], "AWS::S3::Bucket");
  assert!(runner.commands().is_empty());
}

#[test]
fn cdk_json_receives_injected_qualifier_and_bss_environment() {
  let project = Project::new();
  project.write("templates/app/cdk.json", "{}");
  let runner = Rc::new(RecordingRunner::with_synth_outputs(&[
    ("AppStack.assets.json", TEMPLATE_ONLY_MANIFEST),
    ("AppStack.template.json", r#"{"Resources": {"Queue": {"Type": "AWS::SQS::Queue"}}}"#),
  ]));

  let yaml = handler(
    &project,
    "path: app/cdk.json\n\
     deployment_type: cdk_json\n\
     stack_logical_id: AppStack\n\
     bootstrap_qualifier: q123\n\
     context:\n  stage: prod\n\
     bootstrapless_config:\n  template_bucket_name: templates\n",
    &runner,
  )
  .render()
  .unwrap();
  assert!(yaml.contains("AWS::SQS::Queue"));

  let commands = runner.commands();
  assert_eq!(commands.len(), 1);
  let synth = &commands[0];
  assert_eq!(synth.cwd.as_deref(), Some(project.root.join("templates/app").as_path()));
  assert!(synth.args.contains(&format!("{}=q123", QUALIFIER_CONTEXT_KEY)));
  assert!(synth.args.contains(&"stage=prod".to_string()));
  assert_eq!(synth.env.as_ref().unwrap()["BSS_TEMPLATE_BUCKET_NAME"], "templates");
}

#[test]
fn explicit_context_qualifier_wins() {
  let project = Project::new();
  project.write("templates/stack.lua", BUCKET_STACK);
  let runner = Rc::new(RecordingRunner::default());

  let yaml = handler(
    &project,
    &format!(
      "path: stack.lua\ndeployment_type: bootstrapped\nbootstrap_qualifier: ignored\ncontext:\n  \"{}\": kept\n",
      QUALIFIER_CONTEXT_KEY
    ),
    &runner,
  )
  .with_user_data(json!({ "k": "v" }))
  .render()
  .unwrap();

  assert!(yaml.contains("/cdk-bootstrap/kept/version"));
  assert!(!yaml.contains("ignored"));
}

#[test]
fn construct_errors_name_the_class_and_file() {
  let project = Project::new();
  project.write(
    "templates/stack.lua",
    "function CdkStack(app, id, user_data, props)\n  error('no bucket name')\nend\n",
  );
  let runner = Rc::new(RecordingRunner::default());

  let err = handler(&project, "path: stack.lua\ndeployment_type: bootstrapless\n", &runner)
    .render()
    .unwrap_err();

  assert!(matches!(err, HandlerError::Build(_)));
  let message = err.to_string();
  assert!(message.contains("CdkStack"), "{}", message);
  assert!(message.contains("no bucket name"), "{}", message);
}
