//! Shopfloor CLI - migrations, seeding and manual cart/address operations.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! shopfloor migrate
//!
//! # Load products from a YAML file
//! shopfloor seed -f products.yaml
//!
//! # Create a user and give them an address
//! shopfloor user create
//! shopfloor address add -u <user> --house 12 --street "MG Road" --city Pune --pincode 411001
//!
//! # Cart operations
//! shopfloor cart add -u <user> -p <product>
//! shopfloor cart total -u <user>
//! shopfloor cart checkout -u <user>
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFLOOR_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SHOPFLOOR_LOG_FORMAT` - `pretty` (default) or `json`
//! - `RUST_LOG` - overrides the default log filter

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shopfloor_core::{AddressFields, AddressSlot};
use shopfloor_engine::config::EngineConfig;
use shopfloor_engine::gateway::CartOperation;
use shopfloor_engine::telemetry::{LogFormat, init_tracing};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "shopfloor")]
#[command(author, version, about = "Shopfloor CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert or replace catalog products from a YAML file
    Seed {
        /// Path to the products file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage a user's addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Mutate or inspect a user's cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show a user's order history
    Orders {
        /// User id
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an empty user and print its id
    Create,
}

#[derive(Args)]
struct AddressArgs {
    #[arg(long)]
    house: String,
    #[arg(long)]
    street: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    pincode: String,
}

impl From<AddressArgs> for AddressFields {
    fn from(args: AddressArgs) -> Self {
        Self {
            house: args.house,
            street: args.street,
            city: args.city,
            pincode: args.pincode,
        }
    }
}

#[derive(Subcommand)]
enum AddressAction {
    /// Add an address in the first free slot
    Add {
        #[arg(short, long)]
        user: String,
        #[command(flatten)]
        fields: AddressArgs,
    },
    /// Replace the address in a slot (`home` or `work`)
    Edit {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        slot: AddressSlot,
        #[command(flatten)]
        fields: AddressArgs,
    },
    /// Remove all of a user's addresses
    Clear {
        #[arg(short, long)]
        user: String,
    },
    /// Print how many addresses a user holds
    Count {
        #[arg(short, long)]
        user: String,
    },
    /// List a user's addresses
    List {
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add one unit of a product to the cart
    Add {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        product: String,
    },
    /// Remove one unit of a product from the cart
    Remove {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        product: String,
    },
    /// Print the cart total and its lines
    Total {
        #[arg(short, long)]
        user: String,
    },
    /// Turn the whole cart into an order
    Checkout {
        #[arg(short, long)]
        user: String,
    },
    /// Order a single product without touching the cart
    Buy {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        product: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::default());
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &EngineConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Seed { file } => commands::seed::products(config, &file).await?,
        Commands::User { action } => match action {
            UserAction::Create => commands::user::create(config).await?,
        },
        Commands::Address { action } => match action {
            AddressAction::Add { user, fields } => {
                commands::address::add(config, &user, fields.into()).await?;
            }
            AddressAction::Edit { user, slot, fields } => {
                commands::address::edit(config, &user, slot, fields.into()).await?;
            }
            AddressAction::Clear { user } => commands::address::clear(config, &user).await?,
            AddressAction::Count { user } => commands::address::count(config, &user).await?,
            AddressAction::List { user } => commands::address::list(config, &user).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Add { user, product } => {
                let product = Some(product.as_str());
                commands::cart::mutate(config, CartOperation::Add, &user, product).await?;
            }
            CartAction::Remove { user, product } => {
                let product = Some(product.as_str());
                commands::cart::mutate(config, CartOperation::Remove, &user, product).await?;
            }
            CartAction::Checkout { user } => {
                commands::cart::mutate(config, CartOperation::Checkout, &user, None).await?;
            }
            CartAction::Buy { user, product } => {
                let product = Some(product.as_str());
                commands::cart::mutate(config, CartOperation::InstantBuy, &user, product).await?;
            }
            CartAction::Total { user } => commands::cart::total(config, &user).await?,
        },
        Commands::Orders { user } => commands::cart::orders(config, &user).await?,
    }
    Ok(())
}
