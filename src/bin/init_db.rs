//! Create the database tables and the default categories.

use std::process::ExitCode;

use clap::Parser;

use finance_bot::{category::seed_default_categories, db};

/// Initialize the finance bot database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The SQLite database file, optionally prefixed with `sqlite://`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let args = Args::parse();

    let result = db::open(&args.database_url).and_then(|connection| {
        db::initialize(&connection)?;
        seed_default_categories(&connection)
    });

    match result {
        Ok(inserted) => {
            tracing::info!(
                "Initialized {} with {inserted} new categories",
                db::database_path(&args.database_url).display()
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!("Could not initialize {}: {error}", args.database_url);
            ExitCode::FAILURE
        }
    }
}
