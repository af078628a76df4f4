use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use bof_archive::{pack_files, ArchiveConfig, ArchiveReader, BlockIndex};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bof", about = "Seekable block-compressed container tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show progress logs (honours RUST_LOG when set)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Decoded size of each block; must match the value used when packing
    #[arg(long, short = 'b', global = true, default_value_t = bof_archive::archive::DEFAULT_BLOCK_SIZE)]
    block_size: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a blob/index pair
    Pack {
        /// File to compress
        input: PathBuf,

        /// Destination of the compressed blob (.bof)
        #[arg(long)]
        blob: PathBuf,

        /// Destination of the block index (.idx)
        #[arg(long)]
        index: PathBuf,

        /// DEFLATE level, 0 (store) to 9 (best)
        #[arg(long, short = 'l', default_value_t = bof_archive::archive::config::DEFAULT_LEVEL)]
        level: u32,
    },

    /// Decompress a whole blob/index pair
    Unpack {
        blob: PathBuf,
        index: PathBuf,

        /// Destination of the decoded stream
        #[arg(long, short = 'o')]
        out: PathBuf,
    },

    /// Extract a byte range of the decoded stream
    Read {
        blob: PathBuf,
        index: PathBuf,

        /// Offset in the decoded stream
        #[arg(long)]
        offset: u64,

        /// Number of bytes to extract
        #[arg(long)]
        length: u64,

        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Describe an index file
    Info { index: PathBuf },
}

fn init_logging(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };

    // `log` records from the library are bridged by the subscriber's tracing-log layer.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> bof_archive::Result<()> {
    let config = ArchiveConfig::default().with_block_size(cli.block_size);
    config.validate()?;

    match cli.command {
        Commands::Pack { input, blob, index, level } => {
            let config = config.with_level(level);
            let packed = pack_files(&input, &blob, &index, &config)?;
            println!(
                "Packed {} bytes into {} blocks ({} compressed bytes)",
                packed.decoded_len(),
                packed.num_blocks(),
                packed.end_offset()
            );
        }
        Commands::Unpack { blob, index, out } => {
            let reader = ArchiveReader::open(&blob, &index, &config)?;
            let mut output = BufWriter::new(File::create(&out)?);
            for block in reader.blocks() {
                output.write_all(&block?)?;
            }
            output.flush()?;
            println!("Unpacked {} bytes to {}", reader.total_len(), out.display());
        }
        Commands::Read { blob, index, offset, length, out } => {
            let reader = ArchiveReader::open(&blob, &index, &config)?;
            let bytes = reader.read_range(offset, length)?;
            match out {
                Some(path) => std::fs::write(path, &bytes)?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
            }
        }
        Commands::Info { index } => {
            let index = BlockIndex::read_from(&mut File::open(&index)?)?;
            let decoded = index.decoded_len();
            let compressed = index.end_offset();

            println!("Index Information:");
            println!("  Blocks: {}", index.num_blocks());
            println!("  Decoded bytes: {}", decoded);
            println!("  Compressed bytes: {}", compressed);
            if decoded > 0 {
                println!("  Ratio: {:.3}", compressed as f64 / decoded as f64);
            }
            if index.reserved() != compressed {
                println!("  Reserved entry: {} (differs from compressed size)", index.reserved());
            }
            if let Err(e) = index.check_block_count(cli.block_size) {
                println!("  Warning: {}", e);
            }
        }
    }
    Ok(())
}
