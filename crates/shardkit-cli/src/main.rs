mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{
    ShardingArgs, EXIT_FAILURE, EXIT_INTERNAL_ERROR, EXIT_INVALID_BUNDLE, EXIT_MANIFEST_ERROR,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shardkit",
    version,
    about = "Standalone shard generation for modular app bundles"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate one standalone package per ABI x screen density shard.
    Shard {
        /// Path to bundle manifest TOML file.
        #[arg(default_value = "shardkit.toml")]
        manifest: PathBuf,
        /// Write every package as <shard_id>.tar into this directory.
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        sharding: ShardingArgs,
    },
    /// Generate a system image for the device declared in the manifest.
    System {
        /// Path to bundle manifest TOML file.
        #[arg(default_value = "shardkit.toml")]
        manifest: PathBuf,
        /// Write every package as <shard_id>.tar into this directory.
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        sharding: ShardingArgs,
    },
    /// Generate one package per system image of an APEX module.
    Apex {
        /// Path to bundle manifest TOML file.
        #[arg(default_value = "shardkit.toml")]
        manifest: PathBuf,
        /// Name of the APEX module.
        #[arg(long)]
        module: String,
        /// Write every package as <shard_id>.tar into this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the shard definitions without fusing them.
    Plan {
        /// Path to bundle manifest TOML file.
        #[arg(default_value = "shardkit.toml")]
        manifest: PathBuf,
        #[command(flatten)]
        sharding: ShardingArgs,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SHARDKIT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Shard {
            manifest,
            output,
            sharding,
        } => commands::shard::run(&manifest, &sharding, output.as_deref(), json_output),
        Commands::System {
            manifest,
            output,
            sharding,
        } => commands::system::run(&manifest, &sharding, output.as_deref(), json_output),
        Commands::Apex {
            manifest,
            module,
            output,
        } => commands::apex::run(&manifest, &module, output.as_deref(), json_output),
        Commands::Plan { manifest, sharding } => {
            commands::plan::run(&manifest, &sharding, json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:") {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("invalid bundle:") {
                EXIT_INVALID_BUNDLE
            } else if msg.starts_with("internal error:") {
                EXIT_INTERNAL_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
