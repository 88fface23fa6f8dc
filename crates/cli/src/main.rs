//! Pantry CLI - database migrations and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! pantry-cli migrate
//!
//! # Upsert catalog rows from a YAML file
//! pantry-cli seed products crates/cli/data/products.yaml
//!
//! # Set a product's available stock
//! pantry-cli product set-stock 3 40
//! ```
//!
//! The database URL is read from `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pantry_core::ProductId;

mod commands;

#[derive(Parser)]
#[command(name = "pantry-cli")]
#[command(author, version, about = "Pantry CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage catalog products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products from a YAML file
    Products {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Set a product's available stock
    SetStock {
        /// Product id
        id: i32,
        /// New stock (>= 0)
        stock: i32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Product { action } => match action {
            ProductAction::SetStock { id, stock } => {
                commands::product::set_stock(ProductId::new(id), stock).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_set_stock() {
        let cli = Cli::try_parse_from(["pantry-cli", "product", "set-stock", "3", "40"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Product {
                action: ProductAction::SetStock { id: 3, stock: 40 }
            })
        ));
    }
}
