use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgmap", version, about = "Decode disk images and map their partitions")]
pub struct Cli {
    /// TOML config with [mapper] and [decoder] sections
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a raw, zip or xz image into a raw image file
    Decode {
        /// Source image (format detected from content)
        image: PathBuf,

        /// Where to write the raw image
        output: PathBuf,
    },

    /// Attach a raw image to a loop device and print its partitions and volumes
    Map {
        /// Raw disk image
        image: PathBuf,

        /// Leave the loop device attached after printing
        #[arg(long)]
        keep: bool,
    },

    /// Detach the loop device behind a loop or partition path (e.g. /dev/loop7p2)
    Detach {
        device: String,
    },
}
