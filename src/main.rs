use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use clustermap::fsctl::BITMAP_HEADER_SIZE;
use clustermap::{check_elevated, file_map, move_file, volume_map, ScratchLimits};

const GIT_HASH: &str = env!("GIT_HASH");

const MIB: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "clustermap")]
#[command(author, version, about = "Inspect and rearrange cluster allocation on a volume", long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    limits: LimitArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LimitArgs {
    /// Scratch buffer for the volume bitmap, in MiB
    #[arg(long, global = true, value_name = "MIB")]
    bitmap_buffer_mib: Option<usize>,

    /// Scratch buffer for file extent maps, in MiB
    #[arg(long, global = true, value_name = "MIB")]
    extent_buffer_mib: Option<usize>,
}

impl LimitArgs {
    fn to_limits(&self) -> Result<ScratchLimits> {
        let mut limits = ScratchLimits::new();
        if let Some(mib) = self.bitmap_buffer_mib {
            let bytes = mib
                .checked_mul(MIB)
                .and_then(|b| b.checked_add(BITMAP_HEADER_SIZE))
                .ok_or_else(|| anyhow::anyhow!("--bitmap-buffer-mib {} is too large", mib))?;
            limits = limits.bitmap_buffer_size(bytes);
        }
        if let Some(mib) = self.extent_buffer_mib {
            let bytes = mib
                .checked_mul(MIB)
                .ok_or_else(|| anyhow::anyhow!("--extent-buffer-mib {} is too large", mib))?;
            limits = limits.extent_buffer_size(bytes);
        }
        Ok(limits)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show cluster usage of a volume
    Bitmap {
        /// Volume name, e.g. C:
        volume: String,

        /// Also list the N largest free runs
        #[arg(short, long, value_name = "N", default_value_t = 0)]
        runs: usize,
    },

    /// Show where a file's clusters live on the volume
    Extents {
        /// Path to the file
        path: String,
    },

    /// Move a run of a file's clusters to another place on the volume
    Move {
        /// Volume holding the file, e.g. C:
        volume: String,

        /// Path to the file
        path: String,

        /// First virtual cluster of the file to move
        #[arg(long)]
        vcn: i64,

        /// Destination logical cluster on the volume
        #[arg(long)]
        lcn: i64,

        /// Number of clusters to move
        #[arg(long)]
        count: u32,
    },

    /// Show detailed version and build information
    Version,
}

fn warn_if_not_elevated() {
    if !check_elevated() {
        eprintln!("Warning: Volume handles usually require administrator privileges.");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let limits = cli.limits.to_limits()?;

    match cli.command {
        Commands::Bitmap { volume, runs } => {
            warn_if_not_elevated();
            let map = volume_map(&volume, &limits)
                .with_context(|| format!("Failed to read cluster bitmap of {}", volume))?;

            let total = map.len() as u64;
            let used = map.used_count();
            println!("Volume {}:", volume);
            println!("  Clusters: {}", total);
            println!(
                "  Used: {} ({:.2}%)",
                used,
                if total == 0 { 0.0 } else { used as f64 * 100.0 / total as f64 }
            );
            println!("  Free: {}", map.free_count());
            match map.largest_free_run() {
                Some(run) => println!(
                    "  Largest free run: {} clusters at LCN {}",
                    run.len, run.start
                ),
                None => println!("  Largest free run: none"),
            }

            if runs > 0 {
                let mut free: Vec<_> = map.free_runs().collect();
                free.sort_by(|a, b| b.len.cmp(&a.len).then(a.start.cmp(&b.start)));
                println!();
                println!("Largest free runs:");
                for run in free.iter().take(runs) {
                    println!("  LCN {:>12}  {:>12} clusters", run.start, run.len);
                }
            }
        }

        Commands::Extents { path } => {
            let map = file_map(&path, &limits)
                .with_context(|| format!("Failed to read extent map of {}", path))?;

            println!("File {}:", path);
            println!("  Extents: {}", map.len());
            println!("  Clusters: {}", map.total_clusters());
            println!("  Fragments: {}", map.fragment_count());
            println!();
            for extent in map.extents() {
                if extent.is_sparse() {
                    println!(
                        "  VCN {:>12} +{:<10} (sparse)",
                        extent.start_vcn, extent.length
                    );
                } else {
                    println!(
                        "  VCN {:>12} +{:<10} -> LCN {}",
                        extent.start_vcn, extent.length, extent.lcn
                    );
                }
            }
        }

        Commands::Move {
            volume,
            path,
            vcn,
            lcn,
            count,
        } => {
            warn_if_not_elevated();
            move_file(&volume, &path, vcn, lcn, count).with_context(|| {
                format!(
                    "Failed to move {} clusters of {} from VCN {} to LCN {}",
                    count, path, vcn, lcn
                )
            })?;
            println!(
                "Moved {} clusters of {} (VCN {}) to LCN {}.",
                count, path, vcn, lcn
            );
        }

        Commands::Version => {
            println!("clustermap {} (git:{})", env!("CARGO_PKG_VERSION"), GIT_HASH);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_from_mib() {
        let args = LimitArgs {
            bitmap_buffer_mib: Some(2),
            extent_buffer_mib: Some(3),
        };
        let limits = args.to_limits().unwrap();
        assert_eq!(limits.bitmap_buffer_size, 2 * MIB + BITMAP_HEADER_SIZE);
        assert_eq!(limits.extent_buffer_size, 3 * MIB);
    }

    #[test]
    fn test_limits_overflow_rejected() {
        let args = LimitArgs {
            bitmap_buffer_mib: Some(usize::MAX),
            extent_buffer_mib: None,
        };
        assert!(args.to_limits().is_err());

        let args = LimitArgs {
            bitmap_buffer_mib: None,
            extent_buffer_mib: Some(usize::MAX / 2),
        };
        assert!(args.to_limits().is_err());
    }
}
