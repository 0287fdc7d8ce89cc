mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{RenderOptions, cmd_check, cmd_render, cmd_validate};
use output::print_error;

/// cdk-handler - render CloudFormation templates from CDK stack definitions
#[derive(Parser)]
#[command(name = "cdk-handler")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate the handler arguments, build the stack and print the template as YAML
  Render {
    /// Handler arguments file (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Project root containing the `templates/` directory
    #[arg(long, env = "CDK_HANDLER_PROJECT_PATH", default_value = ".")]
    project_path: PathBuf,

    /// User data passed to the stack constructor (YAML or JSON)
    #[arg(long)]
    user_data: Option<PathBuf>,

    /// AWS region for CDK tooling
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Name used in log output (defaults to the arguments file stem)
    #[arg(long)]
    name: Option<String>,
  },

  /// Validate handler arguments and check tool prerequisites without building
  Validate {
    /// Handler arguments file (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Project root containing the `templates/` directory
    #[arg(long, env = "CDK_HANDLER_PROJECT_PATH", default_value = ".")]
    project_path: PathBuf,
  },

  /// Report which tool prerequisites are installed
  Check {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Render {
      config,
      project_path,
      user_data,
      region,
      name,
    } => cmd_render(&RenderOptions {
      config,
      project_path,
      user_data,
      region: region.or_else(|| std::env::var("AWS_DEFAULT_REGION").ok()),
      name,
    }),
    Commands::Validate { config, project_path } => cmd_validate(&config, &project_path),
    Commands::Check { json } => cmd_check(json),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
