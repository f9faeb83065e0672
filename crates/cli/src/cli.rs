use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Segment entities and forecast series from the command line.
///
/// Input files are JSON: a feature matrix is an array of equal-length rows,
/// a series is an array of numbers. Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "spine-analytics", about = "Clustering and forecasting ensembles")]
pub struct CliArgs {
    /// Path to a TOML config file (default: environment and .env)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration profile, e.g. PROD
    #[arg(long, global = true, env = "SPINE_PROFILE")]
    pub profile: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cluster the rows of a feature matrix
    Cluster {
        /// JSON file holding the feature matrix
        #[arg(long, short)]
        input: PathBuf,

        /// Number of clusters (chosen by silhouette when omitted)
        #[arg(long, short)]
        k: Option<usize>,

        /// kmeans, hierarchical, dbscan or ensemble
        #[arg(long, default_value = "ensemble")]
        method: String,

        /// Characterize clusters as segments of this built-in domain
        /// (booking_behavior, spending_pattern)
        #[arg(long)]
        domain: Option<String>,
    },

    /// Forecast a time series
    Forecast {
        /// JSON file holding the series
        #[arg(long, short)]
        input: PathBuf,

        /// Steps to forecast
        #[arg(long, default_value = "5")]
        horizon: usize,

        /// arima, exponential_smoothing, prophet, lstm, naive or ensemble
        #[arg(long, default_value = "ensemble")]
        method: String,

        /// Weight ensemble members by back-test error
        #[arg(long)]
        adaptive: bool,
    },

    /// Print the effective configuration
    Config,
}
