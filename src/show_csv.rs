use anyhow::Result;
use clap::Parser;

mod report;

use report::ResultRow;

#[derive(Parser, Debug)]
#[command(name = "lights-table")]
#[command(about = "Print the comparison table from a results CSV written by nightlights.")]
struct Cli {
    /// Path to the results .csv file
    #[arg(short, long, default_value_t = String::from(report::DEFAULT_CSV))]
    csv: String,

    /// Only show rows whose light per capita is at least this value
    #[arg(long)]
    min_light_per_capita: Option<f64>,

    /// Also write the shown rows to this CSV
    #[arg(short, long)]
    out: Option<String>,
}

fn filter_rows(mut rows: Vec<ResultRow>, min_light_per_capita: Option<f64>) -> Vec<ResultRow> {
    if let Some(min) = min_light_per_capita {
        rows.retain(|row| row.light_per_capita >= min);
    }
    rows
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let rows = report::read_csv(&cli.csv)?;
    log::debug!("read {} rows from {}", rows.len(), cli.csv);
    let rows = filter_rows(rows, cli.min_light_per_capita);
    report::print_table(&rows);

    if let Some(out) = &cli.out {
        report::write_csv(out, &rows)?;
        println!("\nFiltered rows saved to {}", out);
    }

    Ok(())
}
