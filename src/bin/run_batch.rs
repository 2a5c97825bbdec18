//! Run recommendations for a CSV of clients
//!
//! Writes one summary row per client with the best-value recommendation.

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use underwriting_engine::{
    ClientProfile, CoverageRequest, DecisionEngine, DecisionEngineInput, DecisionEngineResult, EngineConfig,
    Gender, ProductCatalog, ProductType,
};

#[derive(Parser)]
#[command(name = "run_batch")]
#[command(about = "Top recommendation for every client in a CSV", long_about = None)]
struct Args {
    #[arg(long)]
    catalog: PathBuf,
    /// Client CSV
    #[arg(long)]
    clients: PathBuf,
    /// IMO the catalog is filtered for
    #[arg(long)]
    imo: String,
    #[arg(long, default_value = "batch_recommendations.csv")]
    output: PathBuf,
}

/// Input row; list columns are semicolon-separated
#[derive(Debug, Deserialize)]
struct ClientRow {
    client_id: String,
    age: u32,
    gender: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    tobacco: bool,
    face_amount: f64,
    #[serde(default)]
    product_types: Option<String>,
    #[serde(default)]
    term_years: Option<u32>,
    #[serde(default)]
    height_feet: Option<u32>,
    #[serde(default)]
    height_inches: Option<u32>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    health_conditions: Option<String>,
}

fn split_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or("")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ClientRow {
    fn to_input(&self, imo_id: &str) -> Result<DecisionEngineInput> {
        let mut client = ClientProfile::new(self.age, Gender::parse(&self.gender)?);
        client.state = self.state.clone().filter(|s| !s.is_empty());
        client.tobacco = self.tobacco;
        client.height_feet = self.height_feet;
        client.height_inches = self.height_inches;
        client.weight = self.weight;
        client.health_conditions = split_list(&self.health_conditions);
        if let (Some(feet), Some(inches), Some(weight)) = (self.height_feet, self.height_inches, self.weight) {
            let bmi = underwriting_engine::calculate_bmi(feet as f64, inches as f64, weight);
            client.bmi = (bmi > 0.0).then_some(bmi);
        }

        let mut coverage = CoverageRequest::new(self.face_amount);
        coverage.product_types = split_list(&self.product_types)
            .iter()
            .map(|t| ProductType::parse(t))
            .collect::<underwriting_engine::Result<_>>()?;

        Ok(DecisionEngineInput {
            client,
            coverage,
            imo_id: imo_id.to_string(),
            term_years: self.term_years,
        })
    }
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    client_id: String,
    eligible: usize,
    unknown: usize,
    carrier: String,
    product: String,
    term_years: Option<u32>,
    monthly_premium: Option<f64>,
    health_class: String,
    approval_likelihood: Option<f64>,
    error: String,
}

impl SummaryRow {
    fn from_result(client_id: &str, result: &DecisionEngineResult) -> Self {
        let top = result.recommendations.first();
        Self {
            client_id: client_id.to_string(),
            eligible: result.eligible_products.len(),
            unknown: result.unknown_eligibility.len(),
            carrier: top.map(|r| r.carrier_name.clone()).unwrap_or_default(),
            product: top.map(|r| r.product_name.clone()).unwrap_or_default(),
            term_years: top.and_then(|r| r.term_years),
            monthly_premium: top.map(|r| r.monthly_premium),
            health_class: top.map(|r| r.health_class_result.as_str().to_string()).unwrap_or_default(),
            approval_likelihood: top.map(|r| r.approval_likelihood),
            error: String::new(),
        }
    }

    fn failed(client_id: &str, error: &anyhow::Error) -> Self {
        Self {
            client_id: client_id.to_string(),
            eligible: 0,
            unknown: 0,
            carrier: String::new(),
            product: String::new(),
            term_years: None,
            monthly_premium: None,
            health_class: String::new(),
            approval_likelihood: None,
            error: format!("{:#}", error),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    println!("Loading catalog from {}...", args.catalog.display());
    let catalog = ProductCatalog::load_from(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let engine = DecisionEngine::new(catalog, EngineConfig::from_env()?)?;

    let mut reader = csv::Reader::from_path(&args.clients)
        .with_context(|| format!("Failed to open {}", args.clients.display()))?;
    let clients: Vec<ClientRow> = reader
        .deserialize()
        .collect::<std::result::Result<_, csv::Error>>()
        .context("Malformed client row")?;
    println!("Loaded {} clients in {:?}", clients.len(), start.elapsed());

    let run_start = Instant::now();
    let rows: Vec<SummaryRow> = clients
        .par_iter()
        .map(|row| {
            let outcome = row
                .to_input(&args.imo)
                .and_then(|input| Ok(engine.get_recommendations(&input)?));
            match outcome {
                Ok(result) => SummaryRow::from_result(&row.client_id, &result),
                Err(e) => SummaryRow::failed(&row.client_id, &e),
            }
        })
        .collect();
    println!("Recommendations complete in {:?}", run_start.elapsed());

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let recommended = rows.iter().filter(|r| r.monthly_premium.is_some()).count();
    let failed = rows.iter().filter(|r| !r.error.is_empty()).count();
    println!("Output written to {}", args.output.display());
    println!("\nBatch Summary:");
    println!("  Clients:     {}", rows.len());
    println!("  Recommended: {}", recommended);
    println!("  Failed:      {}", failed);
    println!("\nTotal time: {:?}", start.elapsed());

    Ok(())
}
