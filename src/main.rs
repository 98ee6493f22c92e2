//! knmap CLI entry point.

use knmap_lib::cli::{self, Cli};
use knmap_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
