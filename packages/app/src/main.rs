#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Headless CLI entry point for the tree map pipeline.
//!
//! Resolves a school from the published registry, runs the full load
//! cycle against an in-process rendering surface, and reports what
//! would be rendered. Useful for validating a school's published data
//! before it goes live.

use clap::Parser;
use tree_map_app::{DEFAULT_SCHOOL_ID, LoadOutcome, Session};
use tree_map_map::{BasemapStyle, HeadlessSurface};

#[derive(Parser)]
#[command(name = "tree_map_app", about = "Tree inventory map loader")]
struct Cli {
    /// School identifier (registry key)
    #[arg(long, default_value = DEFAULT_SCHOOL_ID)]
    school: String,

    /// Base URL the registry and data tables are published under
    #[arg(long)]
    base_url: String,

    /// Basemap style to request after loading
    #[arg(long, default_value_t = BasemapStyle::default())]
    style: BasemapStyle,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let schools = tree_map_school::fetch_registry(&client, &cli.base_url).await?;
    log::info!("Registry lists {} schools", schools.len());

    let mut session = Session::new(HeadlessSurface::default(), schools);

    let outcome = session.load_school(&client, &cli.school).await?;
    let LoadOutcome::Applied(summary) = outcome else {
        // A single sequential load is never superseded.
        return Ok(());
    };

    println!(
        "{} ({}): {} trees, {} genera, boundary: {}",
        summary.school_name,
        summary.school_id,
        summary.tree_count,
        summary.genus_count,
        if summary.has_boundary { "yes" } else { "no" }
    );

    for (genus, style) in session.genus_styles().legend() {
        println!("  {genus}: {} {}-gon", style.color, style.shape.sides);
    }

    let request = session.change_basemap(cli.style);
    session.basemap_loaded(request)?;
    log::info!(
        "Basemap {} applied; {} markers live",
        cli.style,
        session.synchronizer().marker_count()
    );

    Ok(())
}
