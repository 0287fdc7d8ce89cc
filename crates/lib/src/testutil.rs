//! Shared fixtures for unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Stack definition registering a single S3 bucket named from user data.
pub const S3_BUCKET_STACK: &str = r#"
local cdk = require("cdk")

function CdkStack(app, id, user_data, props)
  local stack = cdk.stack(app, id, props)
  stack:resource("Bucket", "AWS::S3::Bucket", {
    Tags = { { Key = "k", Value = user_data.k } },
  })
end
"#;

/// A project directory with `templates/<relative>` containing `content`.
pub fn project_with_template(relative: &str, content: &str) -> (TempDir, PathBuf) {
  let temp = TempDir::new().unwrap();
  let template = temp.path().join("templates").join(relative);
  write_file(&template, content);
  (temp, template)
}

pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}
