use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use notenbildung::grade::GradeScale;
use notenbildung::gradebook::{build_engine, load_records, save_export, GradeExport};
use notenbildung::output;

const EXIT_SUCCESS: i32 = 0;
const EXIT_GRADE: i32 = 1;
const EXIT_INPUT: i32 = 2;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calculate the final grade of a grade book
    Calc {
        /// Grade book file (YAML, or JSON with a .json extension)
        file: PathBuf,

        /// Also calculate with the closed-form formula and compare
        #[arg(long)]
        cross_check: bool,

        /// Convert all grades to this scale before calculating (n, np)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show the grade after each record in date order
    Timeline {
        file: PathBuf,
    },
    /// List the records with their filled-in numbers and status
    List {
        file: PathBuf,

        /// Tab-separated output for scripting
        #[arg(long)]
        tsv: bool,
    },
    /// Write records, final grade and time series as JSON
    Export {
        file: PathBuf,

        /// Output file
        output: PathBuf,
    },
}

impl Commands {
    fn file(&self) -> &Path {
        match self {
            Commands::Calc { file, .. }
            | Commands::Timeline { file }
            | Commands::List { file, .. }
            | Commands::Export { file, .. } => file,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "notenbildung")]
#[command(about = "School grade calculation from a grade book", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/notenbildung/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Scale the grade book is written in (n, np)
    #[arg(short, long, global = true)]
    scale: Option<String>,

    /// Subject whose limits apply (M, Ph, PhLK, Inf)
    #[arg(long, global = true)]
    subject: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_scale(name: &str) -> GradeScale {
    match GradeScale::parse(name) {
        Some(scale) => scale,
        None => {
            eprintln!("Unknown scale '{}'. Use n (1-6) or np (0-15).", name);
            std::process::exit(EXIT_CONFIG);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let start_time = Instant::now();

    if let Err(e) = notenbildung::logging::init_tracing(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    // Load config
    let config_path = cli.config.map(PathBuf::from);
    let mut config = match notenbildung::config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Some(name) = cli.scale.as_deref() {
        config.scale = parse_scale(name);
    }
    if let Some(subject) = cli.subject {
        config.subject = Some(subject);
    }

    // Command line overrides are validated again
    if let Err(errors) = notenbildung::scoring::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let records = match load_records(cli.command.file()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(EXIT_INPUT);
        }
    };

    let mut engine = match build_engine(config, &records) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(EXIT_INPUT);
        }
    };

    tracing::debug!(
        records = engine.records().len(),
        school_year = %engine.school_year().map(|y| y.label()).unwrap_or_default(),
        "grade book ready"
    );

    let use_colors = output::should_use_colors();

    match cli.command {
        Commands::Calc { cross_check, to, .. } => {
            if let Some(name) = to.as_deref() {
                if let Err(e) = engine.convert_to(parse_scale(name)) {
                    eprintln!("Conversion failed: {}", e);
                    std::process::exit(EXIT_CONFIG);
                }
            }

            match engine.calculate_final_grade(true) {
                Ok(Some(result)) => {
                    println!("{}", output::format_result(&result, use_colors));

                    if cross_check {
                        match engine.calculate_direct() {
                            Ok(Some(direct)) => {
                                println!();
                                println!(
                                    "{}",
                                    output::format_cross_check(&result, &direct, use_colors)
                                );
                            }
                            Ok(None) => {}
                            Err(e) => eprintln!("Cross-check failed: {}", e),
                        }
                    }
                }
                Ok(None) => println!("No records found."),
                Err(e) => {
                    eprintln!("Grade calculation failed: {}", e);
                    std::process::exit(EXIT_GRADE);
                }
            }
        }
        Commands::Timeline { .. } => {
            println!("{}", output::format_timeline(&engine.time_series(), use_colors));
        }
        Commands::List { tsv, .. } => {
            let rows = engine.to_record_list();
            if tsv {
                println!("{}", output::format_tsv(&rows));
            } else {
                println!("{}", output::format_record_table(&rows, use_colors));
            }
        }
        Commands::Export { output: path, .. } => {
            let result = match engine.calculate_final_grade(false) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Grade calculation failed: {}", e);
                    std::process::exit(EXIT_GRADE);
                }
            };

            let export = GradeExport::new(&engine, result);
            if let Err(e) = save_export(&path, &export) {
                eprintln!("Export failed: {:#}", e);
                std::process::exit(EXIT_INPUT);
            }
            println!("Exported {} records to {}", export.records.len(), path.display());
        }
    }

    tracing::debug!(elapsed = ?start_time.elapsed(), "done");
    std::process::exit(EXIT_SUCCESS);
}
