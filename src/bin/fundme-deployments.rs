#![forbid(unsafe_code)]
//! Lists the stored deployments of a network

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use fundme_deploy::config::{load_config, DEFAULT_CONFIG_PATH};
use fundme_deploy::persistence::{Database, DeploymentStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "List stored deployments", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Network whose deployments are listed
    #[arg(long)]
    network: String,

    /// Also show the addresses earlier deployments of each contract had
    #[arg(long, default_value_t = false)]
    history: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    // Unknown networks are a configuration error
    let network = config.network(&cli.network)?;

    let db = Database::open(&config.database.path)?;
    let records = db.list(&network.name)?;

    if records.is_empty() {
        println!(
            "{}",
            format!("No deployments stored for '{}'", network.name).yellow()
        );
        return Ok(());
    }

    let mut header = vec![
        Cell::new("Contract").add_attribute(Attribute::Bold),
        Cell::new("Address").add_attribute(Attribute::Bold),
        Cell::new("Arguments").add_attribute(Attribute::Bold),
        Cell::new("Block").add_attribute(Attribute::Bold),
        Cell::new("Deployed at").add_attribute(Attribute::Bold),
    ];
    if cli.history {
        header.push(Cell::new("Previous addresses").add_attribute(Attribute::Bold));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for record in &records {
        let args = record
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut row = vec![
            Cell::new(&record.name),
            Cell::new(record.address.to_string()),
            Cell::new(args),
            Cell::new(
                record
                    .block_number
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(record.deployed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ];
        if cli.history {
            // History includes the current address as its last entry
            let current = record.address.to_string();
            let previous = db
                .history(&network.name, &record.name)?
                .into_iter()
                .filter(|address| *address != current)
                .collect::<Vec<_>>();
            row.push(Cell::new(if previous.is_empty() {
                "-".to_string()
            } else {
                previous.join("\n")
            }));
        }
        table.add_row(row);
    }

    println!(
        "{}",
        format!("Deployments on '{}' (chain id {})", network.name, network.chain_id)
            .bright_cyan()
            .bold()
    );
    println!("{}", table);
    Ok(())
}
