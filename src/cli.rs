use clap::Parser;

use crate::io::SourceOptions;
use crate::zip::{DEFAULT_TAIL_WINDOW, OpenOptions};

#[derive(Parser, Debug)]
#[command(name = "tailzip")]
#[command(version)]
#[command(about = "Lazy ZIP reader for local files and HTTP URLs", long_about = None)]
#[command(after_help = "Examples:\n  \
  tailzip -l https://example.com/archive.zip   list files from remote ZIP\n  \
  tailzip -d out -c 8 data.zip                 extract with 8 concurrent entries\n  \
  tailzip --crx -l extension.crx               list files inside a CRX package")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub extract_dir: String,

    /// Password for encrypted entries
    #[arg(short = 'P', value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Number of entries extracted concurrently
    #[arg(short = 'c', value_name = "N", default_value_t = 1)]
    pub concurrency: usize,

    /// Archive is wrapped in a CRX container header
    #[arg(long)]
    pub crx: bool,

    /// Bytes searched at the end of the file for the end of central directory
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_TAIL_WINDOW)]
    pub tail_window: usize,

    /// Source is a concatenation of split volumes
    #[arg(long, requires_all = ["last_volume_size", "volume_count"])]
    pub multi_volume: bool,

    /// Size of the last volume of a split archive
    #[arg(long, value_name = "BYTES")]
    pub last_volume_size: Option<u64>,

    /// Number of volumes of a split archive
    #[arg(long, value_name = "N")]
    pub volume_count: Option<u64>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.quiet {
            0 if self.verbose => "info",
            0 => "warn",
            1 => "error",
            _ => "off",
        }
    }

    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::default()
            .tail_window_size(self.tail_window)
            .container_header(self.crx)
    }

    pub fn source_options(&self) -> SourceOptions {
        match (self.multi_volume, self.last_volume_size, self.volume_count) {
            (true, Some(last), Some(count)) => SourceOptions::multi_volume(last, count),
            _ => SourceOptions::default(),
        }
    }
}
