//! Marketplace command line client
//!
//! Reads marketplace records from an RPC node and assembles unsigned
//! instruction bundles for inspection.
//!
//! ## Features
//!
//! - **Record lookups**: global pool, user, listing, offer and auction records as JSON
//! - **Scans**: active listings, offers per mint, all auctions with drop counts
//! - **Dry runs**: every marketplace operation assembled for a payer, printed as a
//!   bundle summary without signing or submitting
//! - **Metrics**: Prometheus text dump of the run on request

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_client::market::InstructionBundle;
use market_client::metrics::MarketMetrics;
use market_client::{MarketClient, MarketConfig, RpcLedger};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the RPC endpoint from the configuration
    #[arg(long, env = "MARKET_RPC_URL")]
    rpc_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print collected metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Global pool record
    Status,
    /// User record of an owner
    UserStatus { owner: Pubkey },
    /// Listing record of a mint
    Listing { mint: Pubkey },
    /// Offer record of a buyer on a mint
    Offer { mint: Pubkey, buyer: Pubkey },
    /// Auction record of a mint
    Auction { mint: Pubkey },
    /// Every active listing
    Listings,
    /// Every offer on a mint
    Offers { mint: Pubkey },
    /// Every auction
    Auctions,
    /// Assemble an operation without signing or submitting
    #[command(subcommand)]
    DryRun(DryRun),
}

#[derive(Subcommand, Debug)]
enum DryRun {
    Initialize {
        admin: Pubkey,
    },
    UpdateFee {
        admin: Pubkey,
        #[arg(allow_negative_numbers = true)]
        sol_fee: i64,
        #[arg(allow_negative_numbers = true)]
        token_fee: i64,
    },
    AddTeamTreasury {
        admin: Pubkey,
        treasury: Pubkey,
        #[arg(allow_negative_numbers = true)]
        rate: i64,
    },
    RemoveTeamTreasury {
        admin: Pubkey,
        treasury: Pubkey,
    },
    InitUserPool {
        owner: Pubkey,
    },
    Deposit {
        owner: Pubkey,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        sol: i64,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        token: i64,
    },
    Withdraw {
        owner: Pubkey,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        sol: i64,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        token: i64,
    },
    InitSellData {
        payer: Pubkey,
        mint: Pubkey,
    },
    List {
        owner: Pubkey,
        mint: Pubkey,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        price_sol: i64,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        price_token: i64,
    },
    Delist {
        owner: Pubkey,
        mint: Pubkey,
    },
    Purchase {
        buyer: Pubkey,
        mint: Pubkey,
        #[arg(long)]
        by_token: bool,
        /// Team treasury wallets, in global-record order
        #[arg(long = "treasury")]
        treasuries: Vec<Pubkey>,
    },
    InitOfferData {
        buyer: Pubkey,
        mint: Pubkey,
    },
    MakeOffer {
        owner: Pubkey,
        mint: Pubkey,
        #[arg(allow_negative_numbers = true)]
        price: i64,
        #[arg(long)]
        by_token: bool,
    },
    CancelOffer {
        owner: Pubkey,
        mint: Pubkey,
    },
    AcceptOffer {
        mint: Pubkey,
        buyer: Pubkey,
        #[arg(long = "treasury")]
        treasuries: Vec<Pubkey>,
    },
    InitAuctionData {
        payer: Pubkey,
        mint: Pubkey,
    },
    CreateAuction {
        owner: Pubkey,
        mint: Pubkey,
        #[arg(allow_negative_numbers = true)]
        start_price: i64,
        #[arg(allow_negative_numbers = true)]
        min_increase: i64,
        /// Unix timestamp
        end_date: i64,
        #[arg(long)]
        by_token: bool,
    },
    PlaceBid {
        bidder: Pubkey,
        mint: Pubkey,
        #[arg(allow_negative_numbers = true)]
        price: i64,
    },
    ClaimAuction {
        bidder: Pubkey,
        mint: Pubkey,
        #[arg(long = "treasury")]
        treasuries: Vec<Pubkey>,
    },
    CancelAuction {
        creator: Pubkey,
        mint: Pubkey,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_json)?;

    let mut config = MarketConfig::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(url) = &args.rpc_url {
        config.rpc.rpc_url = url.clone();
    }
    info!(
        rpc_url = %config.rpc.rpc_url,
        program_id = %config.program.program_id,
        "Configuration loaded"
    );

    let metrics = if args.metrics || config.monitoring.enable_metrics {
        Some(Arc::new(MarketMetrics::new()?))
    } else {
        None
    };

    let mut ledger = RpcLedger::from_config(&config)?;
    debug!(endpoint = ledger.endpoint(), "RPC ledger ready");
    if let Some(metrics) = &metrics {
        ledger = ledger.with_metrics(Arc::clone(metrics));
    }
    let mut client = MarketClient::from_config(Arc::new(ledger), &config)?;
    if let Some(metrics) = &metrics {
        client = client.with_metrics(Arc::clone(metrics));
    }

    run(&client, args.command).await?;

    if args.metrics {
        if let Some(metrics) = &metrics {
            eprintln!("{}", metrics.render()?);
        }
    }
    Ok(())
}

/// Initialize logging subsystem
///
/// Logs go to stderr so stdout carries only JSON.
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "market_client=debug,market_cli=debug,info"
    } else {
        "market_client=info,market_cli=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
        }))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .init();

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(client: &MarketClient<RpcLedger>, command: Command) -> Result<()> {
    debug!(?command, "Running command");
    match command {
        Command::Status => print_json(&client.get_global_pool().await?),
        Command::UserStatus { owner } => print_json(&client.get_user_data(&owner).await?),
        Command::Listing { mint } => print_json(&client.get_sell_data(&mint).await?),
        Command::Offer { mint, buyer } => print_json(&client.get_offer_data(&mint, &buyer).await?),
        Command::Auction { mint } => print_json(&client.get_auction_data(&mint).await?),
        Command::Listings => print_json(&client.scan_listings().await?),
        Command::Offers { mint } => print_json(&client.scan_offers(&mint).await?),
        Command::Auctions => print_json(&client.scan_auctions().await?),
        Command::DryRun(dry_run) => {
            let bundle = assemble(client, dry_run).await?;
            print_json(&bundle.summary())
        }
    }
}

async fn assemble(client: &MarketClient<RpcLedger>, dry_run: DryRun) -> Result<InstructionBundle> {
    let bundle = match dry_run {
        DryRun::Initialize { admin } => client.initialize(&admin).await?,
        DryRun::UpdateFee {
            admin,
            sol_fee,
            token_fee,
        } => client.update_fee(&admin, sol_fee, token_fee).await?,
        DryRun::AddTeamTreasury {
            admin,
            treasury,
            rate,
        } => client.add_team_treasury(&admin, &treasury, rate).await?,
        DryRun::RemoveTeamTreasury { admin, treasury } => {
            client.remove_team_treasury(&admin, &treasury).await?
        }
        DryRun::InitUserPool { owner } => client.init_user_pool(&owner).await?,
        DryRun::Deposit { owner, sol, token } => client.deposit_to_escrow(&owner, sol, token).await?,
        DryRun::Withdraw { owner, sol, token } => {
            client.withdraw_from_escrow(&owner, sol, token).await?
        }
        DryRun::InitSellData { payer, mint } => client.init_sell_data(&payer, &mint).await?,
        DryRun::List {
            owner,
            mint,
            price_sol,
            price_token,
        } => {
            client
                .list_nft_for_sale(&owner, &mint, price_sol, price_token)
                .await?
        }
        DryRun::Delist { owner, mint } => client.delist_nft(&owner, &mint).await?,
        DryRun::Purchase {
            buyer,
            mint,
            by_token,
            treasuries,
        } => client.purchase(&buyer, &mint, by_token, &treasuries).await?,
        DryRun::InitOfferData { buyer, mint } => client.init_offer_data(&buyer, &mint).await?,
        DryRun::MakeOffer {
            owner,
            mint,
            price,
            by_token,
        } => client.make_offer(&owner, &mint, price, by_token).await?,
        DryRun::CancelOffer { owner, mint } => client.cancel_offer(&owner, &mint).await?,
        DryRun::AcceptOffer {
            mint,
            buyer,
            treasuries,
        } => client.accept_offer(&mint, &buyer, &treasuries).await?,
        DryRun::InitAuctionData { payer, mint } => client.init_auction_data(&payer, &mint).await?,
        DryRun::CreateAuction {
            owner,
            mint,
            start_price,
            min_increase,
            end_date,
            by_token,
        } => {
            client
                .create_auction(&owner, &mint, start_price, min_increase, by_token, end_date)
                .await?
        }
        DryRun::PlaceBid {
            bidder,
            mint,
            price,
        } => client.place_bid(&bidder, &mint, price).await?,
        DryRun::ClaimAuction {
            bidder,
            mint,
            treasuries,
        } => client.claim_auction(&bidder, &mint, &treasuries).await?,
        DryRun::CancelAuction { creator, mint } => client.cancel_auction(&creator, &mint).await?,
    };
    Ok(bundle)
}
