use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use iostore_container::{build_manifest, extract, pack, parse_container};

#[derive(Parser)]
#[command(
    name = "iostore",
    about = "Unpack and repack IoStore .utoc/.ucas containers",
    version,
    long_about = "Lists, extracts and rebuilds the paired .utoc/.ucas container \
                  files used by the engine's I/O store. Repacking requires the \
                  manifest JSON produced from a prior extraction."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the files packed inside a container
    List {
        /// Path to the .utoc file
        utoc: PathBuf,

        /// AES key as hex, required for encrypted containers
        #[arg(long)]
        aes_key: Option<String>,
    },

    /// Extract files from a container
    Unpack {
        /// Path to the .utoc file
        utoc: PathBuf,

        /// Path to the .ucas file
        ucas: PathBuf,

        /// Directory to extract into
        out_dir: PathBuf,

        /// Regular expression selecting the paths to extract
        #[arg(long, default_value = ".*")]
        filter: String,

        /// AES key as hex, required for encrypted containers
        #[arg(long)]
        aes_key: Option<String>,
    },

    /// Export the manifest JSON needed to repack a container
    Manifest {
        /// Path to the .utoc file
        utoc: PathBuf,

        /// Path to the .ucas file
        ucas: PathBuf,

        /// Where to write the manifest JSON
        out: PathBuf,

        /// AES key as hex, required for encrypted containers
        #[arg(long)]
        aes_key: Option<String>,
    },

    /// Pack a directory into a new container pair
    Pack {
        /// Directory holding the files to pack
        dir: PathBuf,

        /// Manifest JSON from a prior extraction
        manifest: PathBuf,

        /// Output stem; .utoc and .ucas extensions are appended
        out: PathBuf,

        /// Compression method (none, zlib)
        #[arg(long, default_value = "zlib")]
        compression: String,

        /// AES key as hex; encrypts the output container
        #[arg(long)]
        aes_key: Option<String>,
    },
}

fn parse_key(arg: Option<&str>) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    Ok(match arg {
        Some(hex) => Some(iostore_crypto::parse_key_hex(hex)?),
        None => None,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let result = run(cli.command);
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List { utoc, aes_key } => {
            let key = parse_key(aes_key.as_deref())?;
            let container = parse_container(&utoc, key.as_deref())?;
            for path in container.list_files() {
                println!("{path}");
            }
        }
        Commands::Unpack {
            utoc,
            ucas,
            out_dir,
            filter,
            aes_key,
        } => {
            let key = parse_key(aes_key.as_deref())?;
            let container = parse_container(&utoc, key.as_deref())?;
            let count = extract(&container, &ucas, &out_dir, &filter, key.as_deref())?;
            println!("Extracted {count} files to {}", out_dir.display());
        }
        Commands::Manifest {
            utoc,
            ucas,
            out,
            aes_key,
        } => {
            let key = parse_key(aes_key.as_deref())?;
            let container = parse_container(&utoc, key.as_deref())?;
            build_manifest(&container, &ucas, &out, key.as_deref())?;
            println!("Wrote manifest to {}", out.display());
        }
        Commands::Pack {
            dir,
            manifest,
            out,
            compression,
            aes_key,
        } => {
            let key = parse_key(aes_key.as_deref())?;
            let count = pack(&dir, &manifest, &out, &compression, key.as_deref())?;
            println!("Packed {count} files into {}.utoc/.ucas", out.display());
        }
    }
    Ok(())
}
