use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 4096;

#[derive(Parser, Debug)]
#[command(name = "rwdata")]
#[command(version)]
#[command(about = "Inspects and loads the data files of the classic RenderWare games")]
pub struct CliArgs {
    #[arg(long, env = "RWDATA_DATA_DIR", default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Number of asset worker threads, defaults to the available parallelism.
    #[arg(long, env = "RWDATA_WORKERS")]
    pub workers: Option<usize>,

    /// The largest texture the renderer supports. Atlas pages are half of it in each axis.
    #[arg(long, default_value_t = DEFAULT_MAX_TEXTURE_SIZE, value_parser = parse_texture_size)]
    pub max_texture_size: u32,

    #[command(subcommand)]
    pub operation_mode: OperationMode,
}

pub fn default_data_dir() -> String {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("_data")
        .to_string_lossy()
        .to_string()
}

fn parse_texture_size(value: &str) -> Result<u32, String> {
    let size: u32 = value
        .parse()
        .map_err(|_| format!("{} is not a number", value))?;

    if size < 2 || !size.is_power_of_two() {
        return Err(format!("{} is not a power of two of at least 2", size));
    }
    Ok(size)
}

#[derive(Subcommand, Debug)]
pub enum OperationMode {
    /// Lists the entries of a container.
    List { archive: PathBuf },
    /// Copies a single entry out of a container.
    Extract {
        archive: PathBuf,
        name: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Runs the startup load sequence and reports what got loaded.
    Load,
    /// Resolves a logical name after the startup sequence and prints where it comes from.
    Open { name: String },
}

/// What the data store needs to know about its environment.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub worker_count: usize,
    pub max_texture_size: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(default_data_dir()),
            worker_count: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(2),
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
        }
    }
}

impl From<&CliArgs> for DataConfig {
    fn from(args: &CliArgs) -> Self {
        let defaults = DataConfig::default();
        Self {
            data_dir: PathBuf::from(&args.data_dir),
            worker_count: args.workers.unwrap_or(defaults.worker_count),
            max_texture_size: args.max_texture_size,
        }
    }
}
