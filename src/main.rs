use clap::Parser;
use std::path::PathBuf;
use tonematch_recommend::processing::descriptors_to_datasets;
use tonematch_recommend::{default_output_name, recommend, DatasetMode, RecommendConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Recommend similar audio samples from a reference collection
#[derive(Parser, Debug)]
#[command(name = "tonematch")]
#[command(about = "Recommend similar audio samples", long_about = None)]
struct Args {
    /// Directory holding the descriptor files of the user's samples
    samples_directory: PathBuf,

    /// Result file (defaults to result_<w1>_<w2>_<w3>_<mode>_ds_mode.yaml)
    output_file: Option<PathBuf>,

    /// Metric weights for the low-level, timbre and high-level components
    #[arg(short, long, num_args = 3, value_names = ["LOWLEVEL", "TIMBRE", "HIGHLEVEL"])]
    weights: Option<Vec<f32>>,

    /// Search every sample type in one merged dataset
    #[arg(short, long)]
    one: bool,

    /// Print the result to stdout
    #[arg(short, long)]
    print: bool,

    /// Skip dataset creation and use the datasets already in the store
    #[arg(short, long)]
    no_processing: bool,

    /// YAML profile overriding the default settings
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Number of recommendations per sample
    #[arg(short, long)]
    quantity: Option<usize>,

    /// Directory holding the datasets
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tonematch v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.profile {
        Some(profile) => RecommendConfig::from_profile(profile)?,
        None => RecommendConfig::default(),
    };
    if let Some(weights) = &args.weights {
        if let [lowlevel, timbre, highlevel] = weights[..] {
            config = config.with_weights(lowlevel, timbre, highlevel);
        }
    }
    if args.one {
        config = config.with_mode(DatasetMode::One);
    }
    if let Some(quantity) = args.quantity {
        config = config.with_quantity(quantity);
    }
    config.validate()?;

    if !args.no_processing {
        info!("Building user datasets from {:?}", args.samples_directory);
        let datasets = descriptors_to_datasets(&args.samples_directory, &args.store, &config)?;
        info!("User datasets written: {}", datasets.len());
    }

    let result = recommend(&config, &args.store)?;
    if args.print {
        result.print_result()?;
    }

    let output = args
        .output_file
        .unwrap_or_else(|| PathBuf::from(default_output_name(&config.weights(), config.dataset_mode)));
    result.write_yaml(&output)?;
    info!("Recommendations for {} samples written to {:?}", result.len(), output);
    Ok(())
}
