//! plantnode provisioner - CLI to set up a sensor over its access point
//!
//! Join the node's `PlantNode-XXXXX` network first, then:
//!
//!   plantnode-provisioner health
//!   plantnode-provisioner mac
//!   plantnode-provisioner scan
//!   plantnode-provisioner provision --ssid SSID --password PASS
//!   plantnode-provisioner connect
//!
//! `--node` points at a node other than the default access point address.

mod client;

use clap::{Parser, Subcommand};
use plantnode_proto::provisioning::DEFAULT_AP_ADDR;
use plantnode_proto::CREDENTIAL_SLOT_LEN;

use crate::client::NodeClient;

#[derive(Parser)]
#[command(name = "plantnode-provisioner")]
#[command(about = "Provision plantnode sensors over their access point")]
struct Cli {
    /// Node address, host or host:port
    #[arg(long, global = true, default_value = DEFAULT_AP_ADDR)]
    node: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the node answers
    Health,
    /// Print the node's device identity
    Mac,
    /// List networks the node can see
    Scan,
    /// Store network credentials on the node
    Provision {
        /// Network name
        #[arg(long)]
        ssid: String,
        /// Network password
        #[arg(long)]
        password: String,
    },
    /// Ask the node to join its stored network
    Connect,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let node = NodeClient::new(&cli.node);

    match cli.command {
        Commands::Health => {
            let body = node.health().await?;
            println!("{} is up ({body})", node.authority());
        }
        Commands::Mac => {
            println!("{}", node.mac().await?);
        }
        Commands::Scan => {
            let networks = node.scan().await?;
            if networks.is_empty() {
                println!("No networks found.");
            }
            for network in networks {
                let lock = if network.encryption.is_open() { " " } else { "*" };
                println!("  {lock} {}", network.ssid);
            }
        }
        Commands::Provision { ssid, password } => {
            if ssid.is_empty() || password.is_empty() {
                return Err("both --ssid and --password must be non-empty".into());
            }
            if ssid.len() > CREDENTIAL_SLOT_LEN || password.len() > CREDENTIAL_SLOT_LEN {
                return Err(format!("ssid and password are limited to {CREDENTIAL_SLOT_LEN} bytes").into());
            }

            println!("Sending credentials for \"{ssid}\"...");
            node.save_credentials(&ssid, &password).await?;
            println!("Credentials stored. The node is joining the network;");
            println!("its access point goes away once it succeeds.");
        }
        Commands::Connect => {
            node.connect().await?;
            println!("The node is joining its stored network.");
        }
    }

    Ok(())
}
