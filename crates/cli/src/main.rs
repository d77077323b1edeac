//! Crafted Chapter CLI - Headless driver for the storefront client.
//!
//! Hosts the storefront the way a UI would: a file-backed key-value store
//! (so the session, cart snapshot and wishlist survive between runs), an
//! in-memory navigator and a notifier that writes to the log.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the password may also come from CHAPTER_PASSWORD)
//! chapter login -e reader@example.com
//!
//! # Browse and fill the cart
//! chapter products --genre Fantasy
//! chapter cart add 65a1f0c9e4b0a1b2c3d4e5f6
//! chapter cart show
//!
//! # Place an order and read the history
//! chapter checkout --street "12 MG Road" --city Pune --state MH --zipcode 411001 --country India
//! chapter orders
//! ```
//!
//! # Environment Variables
//!
//! See [`crafted_chapter_storefront::config`]; `CHAPTER_API_URL` is required.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use crafted_chapter_storefront::ClientConfig;
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "chapter")]
#[command(author, version, about = "The Crafted Chapter storefront from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "CHAPTER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "CHAPTER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out (the wishlist is kept)
    Logout,
    /// Show the signed-in account
    Profile,
    /// List the catalog
    Products {
        /// Only books in this genre
        #[arg(short, long)]
        genre: Option<String>,
    },
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Inspect or change the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Place an order for the current cart
    Checkout {
        #[arg(long)]
        street: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        zipcode: String,
        #[arg(long)]
        country: String,
    },
    /// Show order history
    Orders,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and total
    Show,
    /// Add one unit of a product
    Add { product_id: String },
    /// Remove one unit of a product
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Show wishlisted books
    List,
    /// Add a product if absent, remove it if present
    Toggle { product_id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Must be done before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crafted_chapter_storefront=info,crafted_chapter_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(config, &email, &SecretString::from(password)).await
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            commands::account::register(config, &name, &email, &SecretString::from(password)).await
        }
        Commands::Logout => commands::account::logout(config).await,
        Commands::Profile => commands::account::profile(config).await,
        Commands::Products { genre } => commands::shop::products(config, genre.as_deref()).await,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::shop::show_cart(config).await,
            CartAction::Add { product_id } => commands::shop::add(config, &product_id).await,
            CartAction::Remove { product_id } => commands::shop::remove(config, &product_id).await,
            CartAction::Clear => commands::shop::clear(config).await,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::shop::wishlist(config).await,
            WishlistAction::Toggle { product_id } => {
                commands::shop::toggle_wishlist(config, &product_id).await
            }
        },
        Commands::Checkout {
            street,
            city,
            state,
            zipcode,
            country,
        } => {
            let address = crafted_chapter_storefront::ShippingAddress {
                street,
                city,
                state,
                zipcode,
                country,
            };
            commands::orders::checkout(config, &address).await
        }
        Commands::Orders => commands::orders::history(config).await,
    }
}
