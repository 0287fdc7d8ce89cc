//! Loading stack constructors from Lua files.

use cdk_handler_lib::lua::{ClassImporter, StackImporter};
use cdk_handler_lib::synth::{App, Context, StackConstructor};
use serde_json::{Value, json};
use tempfile::TempDir;

use super::common::Project;

/// Construct into a fresh app and return the `CDKStack` template.
fn synth(constructor: &dyn StackConstructor, user_data: Value) -> Value {
  let outdir = TempDir::new().unwrap();
  let app = App::new(Context::new(), outdir.path());
  constructor.construct(&app, "CDKStack", &user_data, None).unwrap();
  app.synth().unwrap().get_stack_by_name("CDKStack").unwrap().template.clone()
}

#[test]
fn reimport_yields_equivalent_constructor() {
  let project = Project::new();
  let file = project.write(
    "templates/stack.lua",
    r#"
      local cdk = require("cdk")
      function CdkStack(app, id, user_data, props)
        cdk.stack(app, id, props):resource("Topic", "AWS::SNS::Topic", { TopicName = user_data.name })
      end
    "#,
  );

  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let first = importer.import_class(&file, "CdkStack").unwrap();
  let roots = importer.search_roots();
  let second = importer.import_class(&file, "CdkStack").unwrap();

  assert_eq!(importer.search_roots()[..roots.len()], roots[..]);
  assert_eq!(
    synth(first.as_ref(), json!({ "name": "alerts" })),
    synth(second.as_ref(), json!({ "name": "alerts" }))
  );
}

#[test]
fn package_siblings_resolve_by_dotted_name() {
  let project = Project::new();
  project.write("templates/infra/init.lua", "return {}");
  project.write(
    "templates/infra/naming.lua",
    r#"
      return {
        bucket = function(env) return "data-" .. env end,
      }
    "#,
  );
  let file = project.write(
    "templates/infra/stack.lua",
    r#"
      local cdk = require("cdk")
      local naming = require("infra.naming")

      function CdkStack(app, id, user_data, props)
        local stack = cdk.stack(app, id, props)
        stack:resource("Bucket", "AWS::S3::Bucket", { BucketName = naming.bucket(user_data.env) })
      end
    "#,
  );

  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let constructor = importer.import_class(&file, "CdkStack").unwrap();

  let template = synth(constructor.as_ref(), json!({ "env": "prod" }));
  assert_eq!(template["Resources"]["Bucket"]["Properties"]["BucketName"], "data-prod");
  assert!(importer.search_roots().contains(&project.root.join("templates")));
}

#[test]
fn class_tables_are_called_with_new() {
  let project = Project::new();
  let file = project.write(
    "templates/queue.lua",
    r#"
      local cdk = require("cdk")

      local QueueStack = { retention = 1209600 }

      function QueueStack:new(app, id, user_data, props)
        local stack = cdk.stack(app, id, props)
        stack:resource("Queue", "AWS::SQS::Queue", { MessageRetentionPeriod = self.retention })
        return stack
      end

      return { QueueStack = QueueStack }
    "#,
  );

  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let constructor = importer.import_class(&file, "QueueStack").unwrap();

  let template = synth(constructor.as_ref(), Value::Null);
  assert_eq!(
    template["Resources"]["Queue"]["Properties"]["MessageRetentionPeriod"],
    1209600
  );
}

#[test]
fn same_named_files_do_not_share_globals() {
  let project = Project::new();
  let stack = |resource_type: &str| {
    format!(
      r#"
        local cdk = require("cdk")
        function CdkStack(app, id, user_data, props)
          cdk.stack(app, id, props):resource("Thing", "{}", {{}})
        end
      "#,
      resource_type
    )
  };
  let queue = project.write("templates/a/stack.lua", &stack("AWS::SQS::Queue"));
  let topic = project.write("templates/b/stack.lua", &stack("AWS::SNS::Topic"));

  let importer = ClassImporter::new().unwrap().with_working_dir(&project.root);
  let queue = importer.import_class(&queue, "CdkStack").unwrap();
  let topic = importer.import_class(&topic, "CdkStack").unwrap();

  assert_eq!(synth(queue.as_ref(), Value::Null)["Resources"]["Thing"]["Type"], "AWS::SQS::Queue");
  assert_eq!(synth(topic.as_ref(), Value::Null)["Resources"]["Thing"]["Type"], "AWS::SNS::Topic");
}
