use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "phylotree-rust",
    version,
    about = "Turn organism labels on a rendered phylogenetic tree into image lookups"
)]
struct Cli {
    /// Rendered tree bitmap to annotate
    #[arg(short = 'i', long = "image")]
    image: Option<PathBuf>,

    /// Where to write the annotated tree (default from settings [paths])
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print the hot zones of the render cycle as JSON
    #[arg(long = "json")]
    json: bool,

    /// Click the hot zone with this label after annotating
    #[arg(short = 'c', long = "click")]
    click: Option<String>,

    /// Resolve an image for an organism name and exit
    #[arg(short = 'l', long = "lookup")]
    lookup: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    phylotree_rust::logging::init(cli.verbose)?;

    let config = phylotree_rust::Config {
        image: cli.image,
        output: cli.output,
        click: cli.click,
        lookup: cli.lookup,
        json: cli.json,
        settings_path: cli.read_settings,
    };
    let output = phylotree_rust::run(config).await?;
    println!("{}", output);
    Ok(())
}
