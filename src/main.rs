//! Underwriting Engine CLI
//!
//! Command-line interface for recommendations, quick quotes and the health
//! calculators.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use underwriting_engine::client::{calculate_age_today, BmiCategory};
use underwriting_engine::format::{format_currency, format_currency_cents, format_percentage};
use underwriting_engine::rates::QuickQuoteInput;
use underwriting_engine::{
    calculate_bmi, DecisionEngine, DecisionEngineInput, DecisionEngineResult, EngineConfig, Gender,
    ProductCatalog, ProductType, QuickQuoter, RateClass,
};

#[derive(Parser)]
#[command(name = "underwriting_engine")]
#[command(about = "Life insurance underwriting decision engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank priced recommendations for one client
    Recommend {
        /// Catalog directory (products.csv, premium_matrix.csv, optional JSON files)
        #[arg(long)]
        catalog: PathBuf,
        /// DecisionEngineInput JSON file
        #[arg(long)]
        input: PathBuf,
        /// Engine config JSON (defaults to $UNDERWRITING_CONFIG, then built-in values)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
        /// Print a readable summary instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Quote three face amounts or three monthly budgets without underwriting
    QuickQuote {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        age: u32,
        /// male or female
        #[arg(long)]
        gender: String,
        #[arg(long)]
        tobacco: bool,
        /// Rate class, e.g. preferred_plus, standard
        #[arg(long, default_value = "standard")]
        health_class: String,
        /// Product types (comma-separated, e.g. "term_life,whole_life")
        #[arg(long, value_delimiter = ',', default_value = "term_life")]
        product_types: Vec<String>,
        /// Term length for term products
        #[arg(long)]
        term: Option<u32>,
        /// Three face amounts (comma-separated)
        #[arg(long, value_delimiter = ',', conflicts_with = "budget")]
        face: Vec<f64>,
        /// Three monthly budgets (comma-separated)
        #[arg(long, value_delimiter = ',')]
        budget: Vec<f64>,
    },

    /// Body mass index from height and weight
    Bmi {
        #[arg(long)]
        feet: f64,
        #[arg(long)]
        inches: f64,
        /// Weight in pounds
        #[arg(long)]
        weight: f64,
    },

    /// Age today from a date of birth (YYYY-MM-DD)
    Age {
        #[arg(long)]
        dob: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Recommend {
            catalog,
            input,
            config,
            pretty,
            summary,
        } => {
            let config = match config {
                Some(path) => EngineConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => EngineConfig::from_env()?,
            };
            let catalog = ProductCatalog::load_from(&catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            let raw = fs::read_to_string(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let request: DecisionEngineInput = serde_json::from_str(&raw).context("Invalid input JSON")?;

            let engine = DecisionEngine::new(catalog, config)?;
            let result = engine.get_recommendations(&request)?;

            if summary {
                print_summary(&result);
            } else if pretty {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", serde_json::to_string(&result)?);
            }
        }

        Commands::QuickQuote {
            catalog,
            age,
            gender,
            tobacco,
            health_class,
            product_types,
            term,
            face,
            budget,
        } => {
            let config = EngineConfig::from_env()?;
            let catalog = ProductCatalog::load_from(&catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            let quoter = QuickQuoter::from_catalog(&catalog)
                .with_default_term(config.default_quick_quote_term)
                .with_guardrail(config.premium_guardrail);

            let input = QuickQuoteInput {
                age,
                gender: Gender::parse(&gender)?,
                tobacco_use: tobacco,
                health_class: RateClass::parse(&health_class)?,
                product_types: product_types
                    .iter()
                    .map(|t| ProductType::parse(t))
                    .collect::<underwriting_engine::Result<_>>()?,
                term_years: term,
            };

            let (rows, budget_mode) = match (face.as_slice(), budget.as_slice()) {
                (&[a, b, c], []) => (quoter.quotes_for_coverage(&input, [a, b, c]), false),
                ([], &[a, b, c]) => (quoter.quotes_for_budget(&input, [a, b, c]), true),
                _ => bail!("Provide exactly three values with --face or with --budget"),
            };

            println!("{} matching products", rows.len());
            for row in &rows {
                let term = row.term_years.map(|t| format!(" {}yr", t)).unwrap_or_default();
                print!("{:<24} {:<28}{:<6}", row.carrier_name, row.product_name, term);
                for column in &row.columns {
                    let cell = match (column.premium, column.coverage) {
                        (Some(premium), Some(coverage)) if budget_mode => {
                            format!("{} @ {}", format_currency(coverage), format_currency_cents(premium))
                        }
                        (Some(premium), _) => format_currency_cents(premium),
                        _ => "-".to_string(),
                    };
                    print!(" {:>24}", cell);
                }
                println!();
            }
        }

        Commands::Bmi { feet, inches, weight } => {
            let bmi = calculate_bmi(feet, inches, weight);
            if bmi <= 0.0 {
                bail!("Height and weight must be positive");
            }
            println!("BMI {:.1} ({})", bmi, BmiCategory::from_bmi(bmi).label());
        }

        Commands::Age { dob } => {
            let dob = NaiveDate::parse_from_str(&dob, "%Y-%m-%d").context("Date of birth must be YYYY-MM-DD")?;
            println!("{}", calculate_age_today(dob));
        }
    }

    Ok(())
}

fn print_summary(result: &DecisionEngineResult) {
    let stats = &result.filtered;
    println!(
        "{} products: {} eligible, {} unknown, {} ineligible, {} priced ({}ms)",
        stats.total_products,
        stats.passed_eligibility,
        stats.unknown_eligibility,
        stats.ineligible,
        stats.with_premiums,
        result.processing_time
    );

    println!("\nRecommendations:");
    for rec in &result.recommendations {
        let term = rec.term_years.map(|t| format!(" ({}yr)", t)).unwrap_or_default();
        println!(
            "  {:<20} {} - {}{}: {}/mo, approval {}, class {}{}",
            rec.reason.label(),
            rec.carrier_name,
            rec.product_name,
            term,
            format_currency_cents(rec.monthly_premium),
            format_percentage(rec.approval_likelihood),
            rec.health_class_result.label(),
            if rec.was_fallback { " (fallback)" } else { "" },
        );
    }

    if !result.unknown_eligibility.is_empty() {
        println!("\nNeeds more information:");
        for product in &result.unknown_eligibility {
            let missing: Vec<&str> = product
                .eligibility
                .missing_fields
                .iter()
                .map(|m| m.field.as_str())
                .collect();
            println!(
                "  {} - {}: missing {}",
                product.product.carrier_name,
                product.product.product_name,
                missing.join(", ")
            );
        }
    }
}
