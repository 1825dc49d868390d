//! Command-line wrapper around `harp_rs::docs::list_conversions`, for manual
//! inspection of the bundled rule catalogue. Not part of the engine's public
//! API surface; a convenience for engine developers.

use clap::Parser;
use clap_verbosity_flag::Verbosity;

use harp_rs::config::default_options_handle;
use harp_rs::docs::{list_all_conversions, list_conversions_for_product};
use harp_rs::logging;
use harp_rs::product::Product;
use harp_rs::registry::catalogue::build_default_registry;

#[derive(Parser)]
#[command(about = "List the conversions the derivation engine knows about")]
struct Cli {
    /// Only show rules that produce this variable name
    #[arg(long)]
    name: Option<String>,

    #[command(flatten)]
    verbosity: Verbosity<clap_verbosity_flag::InfoLevel>,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbosity.log_level_filter());

    let registry = build_default_registry();

    // No product is loaded by this demo binary, so every registered rule is
    // printed unconditionally; a host application would pass its own
    // in-memory product to `list_conversions_for_product` instead.
    let empty_product = Product::new();
    let options = default_options_handle();
    if empty_product.is_empty() {
        list_all_conversions(&registry, cli.name.as_deref(), |line| println!("{line}"));
    } else {
        list_conversions_for_product(&empty_product, &registry, &options, cli.name.as_deref(), |line| {
            println!("{line}")
        });
    }
}
