//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Logs every invocation, then succeeds.
const NODE_SCRIPT: &str = "#!/bin/sh\necho \"node $*\" >> \"$CDK_HANDLER_TEST_LOG\"\nexit 0\n";

/// `npm list <pkg>` succeeds, so every package looks installed.
const NPM_SCRIPT: &str = "#!/bin/sh\necho \"npm $*\" >> \"$CDK_HANDLER_TEST_LOG\"\nexit 0\n";

/// `npm list` fails for every package.
pub const NPM_WITHOUT_PACKAGES: &str = "#!/bin/sh\necho \"npm $*\" >> \"$CDK_HANDLER_TEST_LOG\"\nexit 1\n";

/// Records each call; `cdk synth <id> -o <dir> ...` writes a template-only assembly.
const NPX_SCRIPT: &str = r#"#!/bin/sh
echo "npx $*" >> "$CDK_HANDLER_TEST_LOG"
echo "BSS_FILE_ASSET_BUCKET_NAME=${BSS_FILE_ASSET_BUCKET_NAME:-}" >> "$CDK_HANDLER_TEST_LOG"
if [ "$1" = "cdk" ] && [ "$2" = "synth" ]; then
  printf '{"version":"36.0.0","files":{"%s.template.json":{"source":{"path":"%s.template.json"},"destinations":{}}},"dockerImages":{}}' "$3" "$3" > "$5/$3.assets.json"
  printf '{"Resources":{"Queue":{"Type":"AWS::SQS::Queue"}}}' > "$5/$3.template.json"
fi
exit 0
"#;

/// Isolated test environment.
///
/// Each test gets a project directory, a `bin` directory that is the only
/// entry on `PATH`, and a log file the fake tools append to.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Environment with fake `node`, `npm` and `npx`.
  pub fn with_tools() -> Self {
    let env = Self::without_tools();
    env.install_tool("node", NODE_SCRIPT);
    env.install_tool("npm", NPM_SCRIPT);
    env.install_tool("npx", NPX_SCRIPT);
    env
  }

  /// Environment with an empty `bin` directory.
  pub fn without_tools() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("bin")).unwrap();
    std::fs::create_dir_all(temp.path().join("templates")).unwrap();
    std::fs::write(temp.path().join("tools.log"), "").unwrap();
    Self { temp }
  }

  /// Write an executable script into the `bin` directory.
  pub fn install_tool(&self, name: &str, script: &str) {
    let path = self.bin_dir().join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  pub fn remove_tool(&self, name: &str) {
    std::fs::remove_file(self.bin_dir().join(name)).unwrap();
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Write `args.yaml` and return its path.
  pub fn write_args(&self, content: &str) -> PathBuf {
    self.write_file("args.yaml", content);
    self.temp.path().join("args.yaml")
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.temp.path().join("bin")
  }

  /// Everything the fake tools were called with.
  pub fn tool_log(&self) -> String {
    std::fs::read_to_string(self.temp.path().join("tools.log")).unwrap()
  }

  /// Command for the binary with the isolated `PATH` and project directory.
  pub fn handler_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("cdk-handler");
    cmd
      .current_dir(self.temp.path())
      .env("PATH", self.bin_dir())
      .env("CDK_HANDLER_TEST_LOG", self.temp.path().join("tools.log"))
      .env("CDK_HANDLER_PROJECT_PATH", self.temp.path())
      .env_remove("RUST_LOG");
    cmd
  }
}
