use clap::{Parser, Subcommand};
use datamarket_types::{DataFrequency, DatasetId};
use std::path::PathBuf;

/// Subscribe to, download and merge datasets from the on-chain marketplace
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "DATAMARKET_CONFIG", default_value = "config/mainnet.toml")]
    pub config: PathBuf,

    /// Address registry file; overrides `addresses.path`
    #[arg(long)]
    pub addresses: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered datasets
    List,

    /// Pay for and subscribe to a dataset
    Subscribe {
        dataset: DatasetId,

        /// Index of the paying address in the address file
        #[arg(long, default_value_t = 0)]
        address: usize,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Download a subscribed dataset and merge it into the local bundle
    Ingest {
        #[arg(long)]
        dataset: DatasetId,

        #[arg(long, default_value_t = 0)]
        address: usize,
    },

    /// Register a new dataset as its owner
    Register {
        #[arg(long)]
        dataset: DatasetId,

        /// Monthly price in whole tokens
        #[arg(long)]
        price: u128,

        #[arg(long)]
        frequency: DataFrequency,

        #[arg(long, default_value = "")]
        description: String,

        /// Historical data is available
        #[arg(long)]
        history: bool,

        /// Live updates are available
        #[arg(long)]
        live: bool,

        #[arg(long, default_value_t = 0)]
        address: usize,
    },

    /// Upload every CSV file in a directory
    Publish { dataset: DatasetId, dir: PathBuf },

    /// Delete local bundles of a dataset
    Clean {
        dataset: DatasetId,

        /// Only this frequency's bundle
        #[arg(long)]
        frequency: Option<DataFrequency>,
    },

    /// Print the rows of a local bundle
    Show {
        dataset: DatasetId,

        #[arg(long, default_value = "daily")]
        frequency: DataFrequency,

        /// Only rows on or after this date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<chrono::NaiveDate>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe() {
        let args = Args::parse_from(["datamarket", "subscribe", "GitHub", "--address", "1", "--yes"]);
        match args.command {
            Command::Subscribe {
                dataset,
                address,
                yes,
            } => {
                assert_eq!(dataset.as_str(), "github");
                assert_eq!(address, 1);
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_show_with_start() {
        let args = Args::parse_from([
            "datamarket",
            "--log-json",
            "show",
            "github",
            "--frequency",
            "hourly",
            "--start",
            "2024-01-31",
        ]);
        assert!(args.log_json);
        match args.command {
            Command::Show {
                frequency, start, ..
            } => {
                assert_eq!(frequency, DataFrequency::Hourly);
                assert_eq!(start, chrono::NaiveDate::from_ymd_opt(2024, 1, 31));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_frequency_is_rejected() {
        assert!(Args::try_parse_from(["datamarket", "clean", "github", "--frequency", "weekly"]).is_err());
    }
}
