//! `lalo-smith` — manual invocation CLI for the Tool Executor reference
//! implementation. Exists so a developer can exercise a tool outside the
//! orchestrator while wiring up a new one.

use clap::{Parser, Subcommand};
use comfy_table::Table;
use lalo_kernel::tools::{SandboxPolicy, ToolExecutor, ToolOutcome};
use lalo_smith::SmithToolExecutor;

#[derive(Parser)]
#[command(name = "lalo-smith", about = "LALO tool executor reference CLI")]
struct Cli {
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tools this executor can resolve.
    List,
    /// Invoke a tool by id with a JSON arguments object.
    Run {
        /// Tool id, e.g. `echo` or `word_count`.
        tool: String,
        /// JSON object of arguments, e.g. `{"text": "hello"}`.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Sandbox timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let executor = SmithToolExecutor::default();

    match cli.command {
        Commands::List => {
            let mut table = Table::new();
            table.set_header(vec!["id", "description"]);
            for descriptor in executor.descriptors() {
                table.add_row(vec![descriptor.id, descriptor.description]);
            }
            println!("{table}");
        }
        Commands::Run { tool, args, timeout_secs } => {
            let arguments: serde_json::Value = serde_json::from_str(&args)?;
            let policy = SandboxPolicy {
                timeout: std::time::Duration::from_secs(timeout_secs),
                ..SandboxPolicy::default()
            };
            match executor.execute(&tool, arguments, &policy).await {
                Ok(ToolOutcome::Text(text)) => println!("{text}"),
                Ok(ToolOutcome::Structured(value)) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(err) => {
                    eprintln!("tool error: {err}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
