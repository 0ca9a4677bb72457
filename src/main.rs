use clap::{Parser, Subcommand};
use colored::Colorize;
use excel_micro_db::cli;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "emdb")]
#[command(about = "Excel micro-database: workbooks in, SQLite rows out, workbooks back.")]
#[command(long_about = "emdb - Excel micro-database
Extracts .xlsx workbooks into a normalized SQLite project (cells, formulas,
styles, merged ranges, charts), lets you edit single cells, and reconstructs
a new workbook from the stored records.

COMMANDS:
  import        - Extract a workbook into the project database
  export        - Reconstruct a workbook from the project database
  sheets        - List sheets in workbook order
  cells         - Show stored cells of a sheet
  styles        - Show style assignments of a sheet
  charts        - Show charts of a sheet
  set-cell      - Set or clear one cell
  rename-sheet  - Rename a sheet
  history       - Show the cell edit log of a sheet

EXAMPLES:
  emdb --db budget.db import budget.xlsx
  emdb --db budget.db set-cell Sheet1 B2 42
  emdb --db budget.db export rebuilt.xlsx

LOGGING:
  RUST_LOG=excel_micro_db=debug emdb import book.xlsx")]
#[command(version)]
struct Cli {
    /// Project database path
    #[arg(long, global = true, env = "EMDB_DB", default_value = "project.db")]
    db: PathBuf,

    /// Show progress and debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of the summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Extract an .xlsx workbook into the project database.

Sheets are stored in workbook order. A sheet already in the project is
replaced by name; other sheets are kept. Unreadable cells, styles and
charts are skipped with a warning and counted in the summary.

MODES:
  default        - Formula text is stored and formula records are emitted
  --values-only  - The last computed value is stored instead")]
    /// Extract a workbook into the project database
    Import {
        /// Path to the .xlsx workbook
        input: PathBuf,

        /// Store computed values instead of formula text
        #[arg(long)]
        values_only: bool,

        /// Merge identical styles on contiguous cells into range records
        #[arg(long)]
        coalesce_styles: bool,
    },

    /// Reconstruct a workbook from the project database
    Export {
        /// Output .xlsx path
        output: PathBuf,
    },

    /// List sheets in workbook order
    Sheets,

    /// Show stored cells of a sheet
    Cells {
        sheet: String,
    },

    /// Show style assignments of a sheet
    Styles {
        sheet: String,
    },

    /// Show charts of a sheet
    Charts {
        sheet: String,
    },

    #[command(long_about = "Set or clear one cell.

The value is parsed like grid input: numbers, then TRUE/FALSE, then text.
Text starting with '=' is stored as a formula. An empty value clears the cell.

EXAMPLES:
  emdb set-cell Sheet1 B2 42
  emdb set-cell Sheet1 C2 \"=SUM(A1:A5)\"
  emdb set-cell Sheet1 B2 \"\"")]
    /// Set or clear one cell
    SetCell {
        sheet: String,

        /// A1-style address
        address: String,

        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Rename a sheet
    RenameSheet {
        old: String,
        new: String,
    },

    /// Show the cell edit log of a sheet
    History {
        sheet: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "excel_micro_db=debug"
    } else {
        "excel_micro_db=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let db = cli.db.as_path();
    let result = match cli.command {
        Commands::Import {
            input,
            values_only,
            coalesce_styles,
        } => cli::import(db, input, values_only, coalesce_styles, cli.json, cli.verbose),

        Commands::Export { output } => cli::export(db, output, cli.json, cli.verbose),

        Commands::Sheets => cli::sheets(db, cli.json),

        Commands::Cells { sheet } => cli::cells(db, &sheet, cli.json),

        Commands::Styles { sheet } => cli::styles(db, &sheet, cli.json),

        Commands::Charts { sheet } => cli::charts(db, &sheet, cli.json),

        Commands::SetCell {
            sheet,
            address,
            value,
        } => cli::set_cell(db, &sheet, &address, &value),

        Commands::RenameSheet { old, new } => cli::rename_sheet(db, &old, &new),

        Commands::History { sheet } => cli::history(db, &sheet, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "❌ Error:".bold().red(), err);
            ExitCode::FAILURE
        }
    }
}
