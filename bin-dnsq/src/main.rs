use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dns_resolver::cache::SharedCache;
use dns_resolver::resolve;

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// DNS recursive lookup utility
///
/// Resolves a host name to its IPv4 addresses by walking the DNS
/// hierarchy from the root hints. A trailing dot is appended if
/// absent. Set RUST_LOG to control log verbosity.
struct Args {
    /// Host name to resolve
    #[clap(value_parser)]
    host: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cache = SharedCache::new();

    match resolve(&cache, &args.host).await {
        Ok(addresses) => {
            for address in addresses {
                println!("{address}");
            }
        }
        Err(error) => {
            eprintln!(";; {error}");
            process::exit(1);
        }
    }
}
