//! Command-line front end for murmur databases: create, info and dump.

use clap::{Parser, Subcommand};
use murmur::{AggregationMethod, Murmur};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// CLI-specific errors.
#[derive(Error, Debug)]
enum AppError {
    /// Library error (wraps all murmur errors)
    #[error(transparent)]
    Library(#[from] murmur::MurmurError),

    /// The target of `create` already exists
    #[error("refusing to overwrite existing file: {} (use --force)", .0.display())]
    AlreadyExists(PathBuf),
}

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Fixed-size, round-robin time series database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new database file
    Create {
        /// Path of the database file to create
        path: PathBuf,

        /// Archive specs, finest first, e.g. "10s:1m" "1m:5m"
        #[arg(required = true)]
        spec: Vec<String>,

        /// How points are folded during propagation
        /// (average, sum, last, max, min)
        #[arg(long, default_value_t = AggregationMethod::Average)]
        aggregation: AggregationMethod,

        /// Minimum percentage of known points required to propagate
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
        x_files_factor: u8,

        /// Overwrite the file if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Print header and archive information
    Info {
        /// Path of the database file
        path: PathBuf,
    },

    /// Print header information and every slot of every archive
    Dump {
        /// Path of the database file
        path: PathBuf,
    },
}

fn print_info(db: &Murmur) {
    println!("Max data age: {} seconds", db.max_retention());
    println!("Accumulation factor: {}", db.x_files_factor());
    println!("Aggregation method: {}", db.aggregation());
    println!("Number of archives: {}", db.archives().len());

    for (index, arch) in db.archives().iter().enumerate() {
        println!();
        println!("Archive {}:", index);
        println!("  Seconds per point: {}", arch.seconds_per_point);
        println!("  Points: {}", arch.points);
        println!("  Retention: {} seconds", arch.retention);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Create {
            path,
            spec,
            aggregation,
            x_files_factor,
            force,
        } => {
            if path.exists() && !force {
                return Err(AppError::AlreadyExists(path));
            }
            Murmur::create(&path, &spec, aggregation, x_files_factor)?;
            println!("created {}", path.display());
        }

        Commands::Info { path } => {
            let db = Murmur::open(&path)?;
            print_info(&db);
        }

        Commands::Dump { path } => {
            let mut db = Murmur::open(&path)?;
            print_info(&db);

            for index in 0..db.archives().len() {
                println!();
                println!("Archive {} slots:", index);
                for point in db.dump_archive(index)? {
                    println!("  {} = {}", point.interval, point.value());
                }
            }
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
