//! Command-line front end for inspecting and invoking toolforge capabilities.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use serde_json::Value;
use toolforge::Runtime;
use toolforge::config::ConfigLoader;
use toolforge::kernel::{InvocationRequest, function_response, gemini_tools, openai_tools};
use toolforge::tools::{InvocationContext, InvocationEvent};
use tracing::info;

/// Inspect and invoke toolforge capabilities.
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered capabilities
    List,
    /// Print the function declarations offered to the model
    Declarations {
        /// Provider shape
        #[arg(long, value_enum, default_value_t = Format::Plain)]
        format: Format,
    },
    /// Print the UI components
    Components,
    /// Print the discovery readiness report
    Status,
    /// Invoke a capability and stream its progress
    Invoke {
        /// Capability name
        name: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
        /// Caller origin
        #[arg(long, value_enum, default_value_t = CallerOrigin::Ui)]
        origin: CallerOrigin,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Plain,
    Gemini,
    Openai,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CallerOrigin {
    Ai,
    Ui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path.clone());
    }
    let config = loader.load().context("loading configuration")?;
    toolforge::telemetry::init(&config.telemetry.log_filter)?;

    let runtime = Runtime::bootstrap(config);
    info!(registered = runtime.report().registered, "capabilities discovered");

    match cli.command {
        Command::List => {
            for handle in runtime.engine().registry().iter() {
                let descriptor = handle.descriptor();
                println!(
                    "{:<24} {:<9} {}",
                    descriptor.name().as_str(),
                    descriptor.access_level().to_string(),
                    descriptor.description()
                );
            }
        }
        Command::Declarations { format } => {
            let declarations = runtime.declarations();
            let rendered = match format {
                Format::Plain => serde_json::to_value(&declarations)?,
                Format::Gemini => gemini_tools(&declarations),
                Format::Openai => openai_tools(&declarations),
            };
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Command::Components => {
            println!("{}", serde_json::to_string_pretty(&runtime.ui_components())?);
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&runtime.readiness())?);
        }
        Command::Invoke { name, args, origin } => {
            let arguments: Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let ctx = match origin {
                CallerOrigin::Ai => InvocationContext::ai(),
                CallerOrigin::Ui => InvocationContext::ui(),
            };
            let mut stream = runtime
                .engine()
                .invoke_streaming(InvocationRequest::new(name.clone(), arguments), ctx);

            while let Some(event) = stream.next().await {
                match event {
                    InvocationEvent::Chunk(chunk) => eprintln!("> {chunk}"),
                    InvocationEvent::Finished(envelope) => {
                        let rendered = match origin {
                            CallerOrigin::Ai => function_response(&name, &envelope),
                            CallerOrigin::Ui => envelope.to_value(),
                        };
                        println!("{}", serde_json::to_string_pretty(&rendered)?);
                    }
                }
            }
        }
    }

    Ok(())
}
