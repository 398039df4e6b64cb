//! Command-line front end: gap-fill daily CSV price histories and run DCA
//! scenarios over two of them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dca_backtester::input_handler::{
    load_price_csv, read_csv, snapshots_to_df, write_csv, DAY_FIRST_DATE_FORMAT, ISO_DATE_FORMAT,
};
use dca_backtester::periods::prepare_monthly;
use dca_backtester::{gap_fill, DcaMetrics, DcaSimulator, FillMethod, RebalanceAnchor, StrategyConfig};
use std::path::PathBuf;
use time::{format_description, Date};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dca")]
#[command(about = "Dollar-cost averaging simulator for two assets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill missing calendar days in a CSV file
    Fill {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Fill method (linear, ffill, bfill, mean)
        #[arg(short, long, default_value = "linear")]
        method: String,

        /// Name of the date column
        #[arg(long, default_value = "Date")]
        date_column: String,

        /// Date format of the input, as a `time` format description
        #[arg(long, default_value = DAY_FIRST_DATE_FORMAT)]
        date_format: String,
    },

    /// Simulate DCA scenarios over two daily price histories
    Simulate {
        /// CSV file with the prices of asset A
        #[arg(long)]
        asset_a: PathBuf,

        /// CSV file with the prices of asset B
        #[arg(long)]
        asset_b: PathBuf,

        /// Display name of asset A
        #[arg(long, default_value = "Gold")]
        name_a: String,

        /// Display name of asset B
        #[arg(long, default_value = "S&P 500")]
        name_b: String,

        /// Price column in the file of asset A
        #[arg(long, default_value = "Price")]
        price_column_a: String,

        /// Price column in the file of asset B
        #[arg(long, default_value = "SP500")]
        price_column_b: String,

        /// Name of the date column in both files
        #[arg(long, default_value = "Date")]
        date_column: String,

        /// Date format of both files, as a `time` format description
        #[arg(long, default_value = ISO_DATE_FORMAT)]
        date_format: String,

        /// First date to simulate (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Fill method for missing days (linear, ffill, bfill, mean)
        #[arg(long, default_value = "linear")]
        fill_method: String,

        /// Scenario as AMOUNT:WEIGHT_A[:FREQUENCY], e.g. 300:0.5:quarterly
        #[arg(short, long = "scenario", required = true)]
        scenarios: Vec<String>,

        /// Count the first period toward the rebalance interval
        #[arg(long)]
        rebalance_from_first: bool,

        /// Directory for the per-scenario result files
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn parse_start(start: Option<&str>) -> Result<Option<Date>> {
    let Some(start) = start else {
        return Ok(None);
    };
    let format = format_description::parse(ISO_DATE_FORMAT)?;
    let date = Date::parse(start, &format)
        .with_context(|| format!("Invalid start date: {}", start))?;
    Ok(Some(date))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Fill {
            input,
            output,
            method,
            date_column,
            date_format,
        } => {
            let method: FillMethod = method.parse()?;
            let df = read_csv(&input)
                .with_context(|| format!("Error loading {}", input.display()))?;
            let mut filled = gap_fill::fill_missing_dates(
                &df,
                &date_column,
                &date_format,
                ISO_DATE_FORMAT,
                method,
            )?;
            write_csv(&mut filled, &output)?;
            println!("{}", filled);
        }

        Commands::Simulate {
            asset_a,
            asset_b,
            name_a,
            name_b,
            price_column_a,
            price_column_b,
            date_column,
            date_format,
            start,
            fill_method,
            scenarios,
            rebalance_from_first,
            output_dir,
        } => {
            let fill_method: FillMethod = fill_method.parse()?;
            let start = parse_start(start.as_deref())?;
            let anchor = if rebalance_from_first {
                RebalanceAnchor::FromFirst
            } else {
                RebalanceAnchor::EveryNth
            };
            let configs = scenarios
                .iter()
                .map(|s| {
                    s.parse::<StrategyConfig>()
                        .map(|c| c.with_anchor(anchor))
                        .with_context(|| format!("Invalid scenario: {}", s))
                })
                .collect::<Result<Vec<_>>>()?;

            let series_a =
                load_price_csv(&asset_a, &name_a, &date_column, &price_column_a, &date_format)
                    .with_context(|| format!("Error loading {}", asset_a.display()))?;
            let series_b =
                load_price_csv(&asset_b, &name_b, &date_column, &price_column_b, &date_format)
                    .with_context(|| format!("Error loading {}", asset_b.display()))?;
            let (monthly_a, monthly_b) = prepare_monthly(&series_a, &series_b, fill_method, start)?;
            info!("Simulating {} monthly periods", monthly_a.len());

            std::fs::create_dir_all(&output_dir)?;
            for (i, config) in configs.into_iter().enumerate() {
                let label = format!("DCA Scenario {}: {}", i + 1, config);
                let simulator = DcaSimulator::new(monthly_a.clone(), monthly_b.clone(), config);
                let snapshots = simulator
                    .run()
                    .with_context(|| format!("{} failed", label))?;
                let metrics = DcaMetrics::from_snapshots(&snapshots);

                let path = output_dir.join(format!("dca_scenario_{}.csv", i + 1));
                let mut df = snapshots_to_df(&snapshots)?;
                write_csv(&mut df, &path)?;

                println!("\n{}", label);
                println!("{:-<80}", "");
                println!("Periods:          {:>14}", metrics.num_periods);
                println!("Total invested:   {:>14.2}", metrics.total_invested);
                println!("Final value:      {:>14.2}", metrics.final_value);
                println!("Gain:             {:>14.2}", metrics.total_gain);
                println!("Return:           {:>13.2}%", metrics.total_return * 100.0);
                println!("Max drawdown:     {:>13.2}%", metrics.max_drawdown * 100.0);
                println!("Rebalances:       {:>14}", metrics.num_rebalances);
                println!("Results:          {}", path.display());
            }
        }
    }

    Ok(())
}
