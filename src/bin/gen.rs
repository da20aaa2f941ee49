//! geodat-gen: CLI tool for building whitelisted geoip.dat / geosite.dat files.

use clap::{Parser, Subcommand};
use geodat::pipeline::{self, BuildSummary};
use geodat::proto::{category_info, FieldReader, FieldValue};
use geodat::remote::GitHubClient;
use geodat::Config;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "geodat-gen")]
#[command(version)]
#[command(about = "Append whitelist categories to V2Ray geoip.dat / geosite.dat", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the original databases from the latest releases
    Fetch {
        /// Download even if the local copy is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch whitelist sources and write list files
    Collect,

    /// Merge list files into the databases
    Build,

    /// Fetch, collect and build in one go
    All {
        /// Download even if the local copy is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// List the top-level entries of a database file
    Inspect {
        /// Database file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = || Config::load_or_default(&cli.config);

    match &cli.command {
        Commands::Fetch { force } => fetch(&GitHubClient::new(), &config()?, *force),
        Commands::Collect => collect(&GitHubClient::new(), &config()?),
        Commands::Build => build(&config()?),
        Commands::All { force } => {
            let config = config()?;
            let client = GitHubClient::new();
            fetch(&client, &config, *force)?;
            collect(&client, &config)?;
            build(&config)
        }
        Commands::Inspect { file } => inspect(file),
    }
}

fn fetch(client: &GitHubClient, config: &Config, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let changed = pipeline::fetch_databases(client, config, force)?;
    if changed.is_empty() {
        println!("Source databases already up to date in {:?}", config.paths.downloads);
    } else {
        for kind in changed {
            println!("Downloaded {}", config.original_path(kind).display());
        }
    }
    Ok(())
}

fn collect(client: &GitHubClient, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let lists = pipeline::collect_whitelist(client, config)?;

    println!("\n=== Summary ===");
    for list in &lists {
        println!("{:<16} {:>7}  {}", list.category, list.entries, list.path.display());
    }
    Ok(())
}

fn build(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let summary: BuildSummary = pipeline::build_databases(config)?;
    println!("{}", summary);
    Ok(())
}

fn inspect(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(file)?;
    println!("{}: {} bytes", file.display(), data.len());

    let mut count = 0;
    for field in FieldReader::new(&data) {
        let field = field?;
        count += 1;
        match field.value {
            FieldValue::Bytes(payload) => {
                let detail = match category_info(payload) {
                    Ok(info) => format!(
                        "code={} records={}",
                        info.code.as_deref().unwrap_or("?"),
                        info.records
                    ),
                    Err(_) => "not a category".to_string(),
                };
                println!(
                    "#{:<5} @{:<10} field {} len {:<9} {}",
                    count,
                    field.offset,
                    field.number,
                    payload.len(),
                    detail
                );
            }
            other => println!(
                "#{:<5} @{:<10} field {} {:?}",
                count, field.offset, field.number, other
            ),
        }
    }
    println!("{} top-level fields", count);
    Ok(())
}
