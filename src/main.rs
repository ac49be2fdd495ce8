// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-05-14

//! CLI entry point for the volgen volume populator.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};

use volgen::{export_block_map, run_population, InsertSpec, MemVolume, PolicyContext, StdHost};

/// Populate a filesystem volume image from directories and device tables.
#[derive(Debug, Parser)]
#[command(author, version, about = "Populate a filesystem volume image")]
struct Cli {
    /// Graft a host directory, as <directory>[:<volume-dest>]. Repeatable.
    #[arg(short = 'd', long = "root", value_name = "DIR[:DST]")]
    root: Vec<String>,

    /// Interpret a device-table file, as <file>[:<volume-dest>]. Repeatable.
    #[arg(short = 'D', long = "devtable", value_name = "FILE[:DST]")]
    devtable: Vec<String>,

    /// Export a block map file for this volume path. Repeatable.
    #[arg(short = 'g', long = "block-map", value_name = "PATH")]
    block_map: Vec<String>,

    /// Squash owners, making all entries owned by root.
    #[arg(short = 'U', long = "squash-uids")]
    squash_uids: bool,

    /// Squash group and other permissions on all entries.
    #[arg(short = 'P', long = "squash-perms")]
    squash_perms: bool,

    /// Same as -U -P.
    #[arg(short = 'q', long = "squash")]
    squash: bool,

    /// Set creation timestamps to 0 (for reproducible images).
    #[arg(short = 'f', long = "faketime")]
    faketime: bool,

    /// Start an empty volume when the image file does not exist yet.
    #[arg(long)]
    create: bool,

    /// Verbose per-node logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Volume image path.
    image: PathBuf,
}

/// Merge `-d` and `-D` arguments back into command-line order, so a
/// table can populate directories grafted by an earlier `-d` and vice
/// versa.
fn ordered_specs(cli: &Cli, matches: &clap::ArgMatches) -> Vec<InsertSpec> {
    let mut ordered: Vec<(usize, &String)> = Vec::new();
    if let Some(indices) = matches.indices_of("root") {
        ordered.extend(indices.zip(cli.root.iter()));
    }
    if let Some(indices) = matches.indices_of("devtable") {
        ordered.extend(indices.zip(cli.devtable.iter()));
    }
    ordered.sort_by_key(|(index, _)| *index);
    ordered
        .into_iter()
        .map(|(_, arg)| InsertSpec::parse(arg))
        .collect()
}

fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let policy = PolicyContext {
        squash_uids: cli.squash_uids || cli.squash,
        squash_perms: cli.squash_perms || cli.squash,
        synthetic_ctime: cli.faketime.then_some(0),
    };

    let mut vol = if cli.image.exists() {
        MemVolume::open(&cli.image)
            .with_context(|| format!("error opening volume image {}", cli.image.display()))?
    } else if cli.create {
        MemVolume::create()
    } else {
        bail!("volume image {} does not exist", cli.image.display());
    };

    let specs = ordered_specs(&cli, &matches);

    let host = StdHost;
    run_population(&mut vol, &host, &specs, &policy).context("population failed")?;

    for vpath in &cli.block_map {
        let written = export_block_map(&vol, vpath, std::path::Path::new("."))
            .with_context(|| format!("block map export for {vpath}"))?;
        log::debug!("wrote block map {}", written.display());
    }

    vol.save(&cli.image)
        .with_context(|| format!("error writing volume image {}", cli.image.display()))?;
    Ok(())
}
