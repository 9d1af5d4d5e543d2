//! Print a `ton://transfer` link that claims an item of a compressed NFT
//! collection.
//!
//! Inputs are the documents served by the collection's index service, either
//! inline or saved to files. Logs go to stderr; stdout carries only the link.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, WrapErr};
use num_bigint::BigUint;
use ton_cnft::{
    prepare_claim, random_query_id, ClaimConfig, CollectionState, IndexEndpoints, ItemProof,
    CLAIM_AMOUNT_NANOTONS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Build the transfer link claiming a compressed NFT item")]
struct Args {
    /// Index of the item to claim
    #[arg(long, value_name = "N")]
    item_index: BigUint,

    /// Collection address (raw `wc:hex` or user-friendly)
    #[arg(long, conflicts_with = "state_file", required_unless_present_any = ["state_file", "print_endpoints"])]
    collection: Option<String>,

    /// Saved `GET /state` response
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Proof BoC in base64
    #[arg(long, conflicts_with = "item_file", required_unless_present_any = ["item_file", "print_endpoints"])]
    proof: Option<String>,

    /// Saved `GET /items/{index}` response
    #[arg(long, value_name = "PATH")]
    item_file: Option<PathBuf>,

    /// Query id (random when omitted)
    #[arg(long)]
    query_id: Option<u64>,

    /// Attached value in nanotons
    #[arg(long, default_value_t = CLAIM_AMOUNT_NANOTONS)]
    amount: u128,

    /// Mark the destination address as testnet
    #[arg(long)]
    testnet: bool,

    /// Render the destination address as non-bounceable
    #[arg(long)]
    non_bounceable: bool,

    /// Index service base URL (defaults to CNFT_INDEX_URL, then localhost)
    #[arg(long, value_name = "URL")]
    index_url: Option<String>,

    /// Print the index service URLs for this item and exit
    #[arg(long)]
    print_endpoints: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.print_endpoints {
        let endpoints = IndexEndpoints::resolve(args.index_url.clone());
        println!("{}", endpoints.state_url());
        println!("{}", endpoints.item_url(&args.item_index));
        return Ok(());
    }

    let state = load_state(&args)?;
    let item = load_item(&args)?;
    let query_id = args.query_id.unwrap_or_else(random_query_id);

    let config = ClaimConfig::new()
        .with_amount(args.amount)
        .with_bounceable(!args.non_bounceable)
        .with_testnet(args.testnet);

    let claim = prepare_claim(&state, &item, &args.item_index, query_id, &config)
        .wrap_err("failed to prepare claim")?;
    info!(query_id, item_index = %args.item_index, "claim prepared");

    println!("{}", claim.link);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_state(args: &Args) -> Result<CollectionState> {
    match (&args.collection, &args.state_file) {
        (Some(address), _) => Ok(CollectionState {
            address: address.clone(),
        }),
        (None, Some(path)) => {
            let json = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            Ok(CollectionState::from_json(&json)?)
        }
        (None, None) => eyre::bail!("either --collection or --state-file is required"),
    }
}

fn load_item(args: &Args) -> Result<ItemProof> {
    match (&args.proof, &args.item_file) {
        (Some(proof), _) => Ok(ItemProof {
            proof_cell: proof.clone(),
        }),
        (None, Some(path)) => {
            let json = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            Ok(ItemProof::from_json(&json)?)
        }
        (None, None) => eyre::bail!("either --proof or --item-file is required"),
    }
}
