use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trackq::config::Config;
use trackq::tracker::RestExecutor;
use trackq::{QueryOrchestrator, QueryRequest};

#[derive(Parser, Debug)]
#[command(name = "trackq")]
#[command(about = "Structured, cached searches against an issue tracker")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/trackq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Also write logs to a daily rotating file in this directory
  #[arg(long)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the backend query text for a request file
  Compile { file: PathBuf },
  /// Check a request file and print the validation report
  Validate { file: PathBuf },
  /// Execute the requests in a file against the configured tracker
  Run {
    file: PathBuf,
    /// Print cache health after the run
    #[arg(long)]
    stats: bool,
  },
}

/// A request file holds one request or a list of them (YAML or JSON).
#[derive(Deserialize)]
#[serde(untagged)]
enum RequestFile {
  Many(Vec<QueryRequest>),
  One(Box<QueryRequest>),
}

fn load_requests(path: &Path) -> Result<Vec<QueryRequest>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read request file {}: {}", path.display(), e))?;

  let file: RequestFile = serde_yaml::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse request file {}: {}", path.display(), e))?;

  Ok(match file {
    RequestFile::Many(requests) => requests,
    RequestFile::One(request) => vec![*request],
  })
}

fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trackq=info"));

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::daily(dir, "trackq.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      (
        Some(fmt::layer().with_ansi(false).with_writer(writer)),
        Some(guard),
      )
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.log_dir.as_deref())?;

  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Compile { file } => {
      let compiler = config.query.compiler();
      for request in load_requests(&file)? {
        let compiled = compiler.compile(&request)?;
        println!("{}", compiled.text);
        if let Some(order_by) = compiled.order_by {
          println!("sort by: {}", order_by);
        }
      }
    }
    Command::Validate { file } => {
      let validator = config.query.validator();
      let reports: Vec<_> = load_requests(&file)?
        .iter()
        .map(|request| validator.validate(request))
        .collect();
      println!("{}", serde_json::to_string_pretty(&reports)?);

      let invalid = reports.iter().filter(|r| !r.valid).count();
      if invalid > 0 {
        return Err(eyre!("{} of {} requests are invalid", invalid, reports.len()));
      }
    }
    Command::Run { file, stats } => {
      let requests = load_requests(&file)?;
      let executor = RestExecutor::new(config.backend()?)?;
      let orchestrator = QueryOrchestrator::new(executor, Arc::new(config.cache.build()))
        .with_compiler(config.query.compiler())
        .with_validator(config.query.validator())
        .with_result_ttl(config.cache.result_ttl_secs);

      let mut responses = Vec::with_capacity(requests.len());
      for request in &requests {
        responses.push(orchestrator.execute(request).await?);
      }

      let output = if stats {
        serde_json::json!({
          "results": responses,
          "cache": orchestrator.cache().health_metrics(),
        })
      } else {
        serde_json::to_value(&responses)?
      };
      println!("{}", serde_json::to_string_pretty(&output)?);
    }
  }

  Ok(())
}
