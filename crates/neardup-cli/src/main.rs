use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use neardup_core::{action, Config, HashAlgorithm, Metric, NearDupFinder};

#[derive(Parser)]
#[command(name = "neardup")]
#[command(about = "Fast near-duplicate image search and delete")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    AverageHash,
    Dhash,
    Phash,
    Whash,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::AverageHash => HashAlgorithm::Average,
            AlgorithmArg::Dhash => HashAlgorithm::Difference,
            AlgorithmArg::Phash => HashAlgorithm::Perceptual,
            AlgorithmArg::Whash => HashAlgorithm::Wavelet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    Manhattan,
    Euclidean,
    Chebyshev,
    Minkowski,
}

#[derive(clap::Args)]
struct EngineArgs {
    /// Hash algorithm to fingerprint images with
    #[arg(long, value_enum, default_value = "phash")]
    hash_algorithm: AlgorithmArg,

    /// Hash grid side length (fingerprints carry hash-size² bits)
    #[arg(long, default_value_t = 8)]
    hash_size: u32,

    /// Distance metric for the nearest-neighbor index
    #[arg(short = 'd', long, value_enum, default_value = "manhattan")]
    distance_metric: MetricArg,

    /// Minkowski exponent, used with --distance-metric minkowski
    #[arg(long, default_value_t = 2.0)]
    minkowski_p: f64,

    /// Number of nearest neighbors per query
    #[arg(long, default_value_t = 5)]
    nearest_neighbors: usize,

    /// Leaf size of the k-d tree
    #[arg(long, default_value_t = 40)]
    leaf_size: usize,

    /// Maximum distance under which two images count as duplicates
    #[arg(long, default_value_t = 25.0)]
    threshold: f64,

    /// Parallelize hashing and querying over all CPUs
    #[arg(long)]
    parallel: bool,

    /// Batch size for parallel processing
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
}

impl EngineArgs {
    fn apply(&self, config: &mut Config) {
        config.algorithm = self.hash_algorithm.into();
        config.hash_size = self.hash_size;
        config.metric = match self.distance_metric {
            MetricArg::Manhattan => Metric::Manhattan,
            MetricArg::Euclidean => Metric::Euclidean,
            MetricArg::Chebyshev => Metric::Chebyshev,
            MetricArg::Minkowski => Metric::Minkowski(self.minkowski_p),
        };
        config.nearest_neighbors = self.nearest_neighbors;
        config.leaf_size = self.leaf_size;
        config.max_distance = self.threshold;
        config.parallel = self.parallel;
        config.batch_size = self.batch_size;
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find near-duplicate images and optionally delete the redundant copies
    Dedup {
        /// Directory containing images
        directory: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        /// Directory for retained copies and the JSON report
        #[arg(long, default_value = "output")]
        output: PathBuf,

        /// Actually copy and delete files instead of previewing
        #[arg(long)]
        delete: bool,

        /// Also delete each cluster's representative, keeping only images
        /// that matched nothing
        #[arg(long)]
        delete_keep: bool,

        /// Path to a JSON configuration file; command-line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the nearest neighbors of one image within a directory
    Search {
        /// Directory containing images
        directory: PathBuf,

        /// Path to the query image (must be inside the directory)
        #[arg(short, long)]
        query: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "neardup.json")]
        path: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dedup {
            directory,
            engine,
            output,
            delete,
            delete_keep,
            config,
        } => {
            let mut config = if let Some(config_path) = config {
                Config::from_file(&config_path)
                    .with_context(|| format!("loading config from {}", config_path.display()))?
            } else {
                Config::default()
            };
            engine.apply(&mut config);
            config.output_dir = output;
            config.dry_run = !delete;
            config.delete_keep = delete_keep;

            let finder = NearDupFinder::new(config)?;
            info!("Starting near-duplicate search...");
            let report = finder.run(&directory)?;
            report.log_summary(finder.config());

            println!(
                "{} images: {} kept, {} duplicates, {} survived",
                report.files.len(),
                report.partition.keep.len(),
                report.partition.remove.len(),
                report.partition.survived.len()
            );

            let report_path = if finder.config().dry_run {
                PathBuf::from("neardup-report.json")
            } else {
                std::fs::create_dir_all(&finder.config().output_dir)?;
                finder.config().output_dir.join("neardup-report.json")
            };
            report.write_json(&report_path)?;
            println!("Report written to {}", report_path.display());

            let plan = action::plan(&report, finder.config());
            let results = action::execute(&plan, finder.config())?;
            if finder.config().dry_run {
                println!(
                    "Dry run: {} planned operations logged, nothing touched (pass --delete to apply)",
                    plan.len()
                );
            } else {
                let failures = results.iter().filter(|r| !r.success).count();
                println!("{} operations applied, {} failed", results.len(), failures);
            }
            Ok(())
        }

        Commands::Search {
            directory,
            query,
            engine,
        } => {
            let mut config = Config::default();
            engine.apply(&mut config);

            let finder = NearDupFinder::new(config)?;
            let neighbors = finder.search(&directory, &query)?;

            if neighbors.is_empty() {
                println!("No neighbors of {} within threshold", query.display());
            } else {
                for (distance, path) in neighbors {
                    println!("{distance:>10.2}  {}", path.display());
                }
            }
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
