//! Headless Molecad runner
//!
//! Loads a project, propagates it through the geometry worker, and prints
//! the census, any atom alerts, the project bounds and the bill of materials.
//!
//! ```bash
//! molecad bracket.maslowcreate
//! molecad --layout --save nested.maslowcreate bracket.maslowcreate
//! molecad --bom --settings ./settings.toml bracket.maslowcreate
//! ```

use anyhow::Context;
use clap::Parser;
use molecad::settings::SettingsPersistence;
use molecad::{compute_layouts, init_logging, open_project, problems, VERSION};
use std::path::PathBuf;
use std::process;
use tracing::info;

/// Evaluate a Molecad project without a user interface
#[derive(Parser, Debug)]
#[command(name = "molecad")]
#[command(version = VERSION, long_version = LONG_VERSION)]
#[command(about = "Evaluate Molecad projects from the command line", long_about = None)]
struct Args {
    /// Project file to evaluate
    #[arg(value_name = "PROJECT")]
    project: PathBuf,

    /// Settings file (TOML or JSON); defaults to the platform config directory
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Run the packing search of every Cut Layout
    #[arg(short, long)]
    layout: bool,

    /// Print the bill of materials as markdown
    #[arg(short, long)]
    bom: bool,

    /// Write the evaluated project, including new layouts, to this file
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("BUILD_DATE"),
    ")"
);

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args).await {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let settings = match &args.settings {
        Some(path) => SettingsPersistence::open(path)?,
        None => SettingsPersistence::open_default()?,
    };
    let level = if args.verbose {
        "debug"
    } else {
        settings.config().logging.level.as_str()
    };
    init_logging(level)?;

    let (mut project, geometry) = open_project(&args.project, settings.config())?;
    project.run_until_idle().await;

    if args.layout {
        let count = compute_layouts(&mut project)
            .await
            .context("Failed to compute layouts")?;
        info!("Computed {} layout(s)", count);
    }

    let census = project.census();
    println!(
        "{}: {} atoms, {} not yet computed",
        args.project.display(),
        census.total,
        census.to_process
    );
    for (atom, message) in problems(&project) {
        println!("  {}: {}", atom, message);
    }

    if project.output().is_some() {
        match geometry.bounding_box(project.root().id.clone()).await {
            Ok(Some(bounds)) => println!(
                "Bounds: {:.3} x {:.3} x {:.3} {}",
                bounds.width(),
                bounds.height(),
                bounds.depth(),
                project.units().key()
            ),
            Ok(None) => println!("Bounds: empty"),
            Err(err) => println!("Bounds unavailable: {}", err),
        }
    } else {
        println!("Project output is not ready");
    }

    if args.bom {
        println!("{}", project.bom_markdown());
    }

    if let Some(path) = &args.save {
        project.save(path)?;
        info!("Saved project to {}", path.display());
    }
    Ok(())
}
