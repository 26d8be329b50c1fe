mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{
    action::ActionSubcommand, controllers::ControllersSubcommand, dlq::DlqSubcommand,
    proof::ProofSubcommand, sla::SlaSubcommand, verify::VerifySubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "optout",
    about = "Dispatch and track data removal requests across third-party controllers",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data directory holding the store, controller registry, and config
    #[arg(long, global = true, env = "OPTOUT_DATA_DIR", default_value = "./optout-data")]
    data_dir: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory with a default config and seed registry
    Init,

    /// Start the cron trigger server
    Serve {
        /// Port to listen on (default: config `port`)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Dispatch one removal request to a controller
    Dispatch {
        /// Controller key (e.g. naukri, spokeo)
        #[arg(long)]
        controller: String,

        /// Subject's full name
        #[arg(long)]
        name: Option<String>,

        /// Subject's email address
        #[arg(long)]
        email: Option<String>,

        /// Subject's phone number
        #[arg(long)]
        phone: Option<String>,

        /// Locale tag driving the legal basis (e.g. en-IN, de-DE)
        #[arg(long)]
        locale: Option<String>,

        /// Controller display name override for letter templates
        #[arg(long)]
        controller_name: Option<String>,
    },

    /// Inspect and cancel removal actions
    Action {
        #[command(subcommand)]
        subcommand: ActionSubcommand,
    },

    /// Inspect and drain the dead letter queue
    Dlq {
        #[command(subcommand)]
        subcommand: DlqSubcommand,
    },

    /// SLA deadline scheduling
    Sla {
        #[command(subcommand)]
        subcommand: SlaSubcommand,
    },

    /// Post-dispatch verification
    Verify {
        #[command(subcommand)]
        subcommand: VerifySubcommand,
    },

    /// Merkle proof ledger
    Proof {
        #[command(subcommand)]
        subcommand: ProofSubcommand,
    },

    /// Controller registry
    Controllers {
        #[command(subcommand)]
        subcommand: ControllersSubcommand,
    },

    /// Action counts, DLQ depth, and breaker state
    Status,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let data_dir = cli.data_dir;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&data_dir),
        Commands::Serve { port } => cmd::serve::run(data_dir.clone(), port),
        Commands::Dispatch {
            controller,
            name,
            email,
            phone,
            locale,
            controller_name,
        } => cmd::dispatch::run(
            &data_dir,
            cmd::dispatch::DispatchArgs {
                controller,
                controller_name,
                name,
                email,
                phone,
                locale,
            },
            cli.json,
        ),
        Commands::Action { subcommand } => cmd::action::run(&data_dir, subcommand, cli.json),
        Commands::Dlq { subcommand } => cmd::dlq::run(&data_dir, subcommand, cli.json),
        Commands::Sla { subcommand } => cmd::sla::run(&data_dir, subcommand, cli.json),
        Commands::Verify { subcommand } => cmd::verify::run(&data_dir, subcommand, cli.json),
        Commands::Proof { subcommand } => cmd::proof::run(&data_dir, subcommand, cli.json),
        Commands::Controllers { subcommand } => {
            cmd::controllers::run(&data_dir, subcommand, cli.json)
        }
        Commands::Status => cmd::status::run(&data_dir, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
