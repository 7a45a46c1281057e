use clap::{Parser, Subcommand};

use tron_alert_relay::address_codec;
use tron_alert_relay::{AppConfig, Database, HttpNodeClient, ProgressStore, RelayError};

#[derive(Parser)]
#[command(name = "tron-alert-relay-cli")]
#[command(about = "Operator tools for the TRON address alert relay")]
#[command(version)]
struct Cli {
    /// Database path (defaults to the configured store file)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a raw hex address into its public form
    Encode { hex: String },
    /// Decode a public address into raw hex
    Decode {
        address: String,
        /// Reject addresses whose checksum does not match
        #[arg(long)]
        verify: bool,
    },
    /// Inspect or change the last processed block
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },
    /// Print the node's latest solidified block height
    NodeHead {
        /// Node URL (defaults to the configured one)
        #[arg(long)]
        node_url: Option<String>,
    },
    /// Print a configuration file with every default filled in
    SampleConfig,
}

#[derive(Subcommand)]
enum ProgressAction {
    Show,
    /// Overwrite the stored height; the next run starts at HEIGHT + 1
    Set { height: u64 },
    /// Forget all progress; the next run starts at block 0
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Less verbose than the relay itself
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn execute(cli: Cli) -> Result<(), RelayError> {
    match cli.command {
        Commands::Encode { hex } => {
            println!("{}", address_codec::encode(&hex)?);
        }
        Commands::Decode { address, verify } => {
            let raw = if verify {
                address_codec::decode_checked(&address)?
            } else {
                address_codec::decode(&address)?
            };
            println!("{}", raw);
        }
        Commands::Progress { action } => {
            let config = AppConfig::load()?;
            let path = cli.database.unwrap_or(config.database.path);
            let database = Database::new(&path)?;

            match action {
                ProgressAction::Show => match database.load()? {
                    Some(height) => println!("Last processed block: {}", height),
                    None => println!("No block processed yet"),
                },
                ProgressAction::Set { height } => {
                    database.set_last_processed_block(Some(height))?;
                    println!("Last processed block set to {}", height);
                }
                ProgressAction::Reset => {
                    database.set_last_processed_block(None)?;
                    println!("Progress reset; the relay will start from block 0");
                }
            }
        }
        Commands::NodeHead { node_url } => {
            let config = AppConfig::load()?;
            let url = node_url.unwrap_or(config.node.url);
            let client = HttpNodeClient::new_with_config(url, config.node.timeout_seconds)?;
            println!("{}", client.get_now_block_number().await?);
        }
        Commands::SampleConfig => {
            print!("{}", AppConfig::generate_sample_config()?);
        }
    }

    Ok(())
}
