//! Mined lead record and natural-key helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored in place of any optional text the provider did not return.
pub const NOT_LOCATED: &str = "not located";

/// Provenance labels used when a response carries no source URIs.
pub const FALLBACK_SOURCES: [&str; 2] = ["Receita Federal", "Google Search"];

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;
pub const DEFAULT_SCORE: u8 = 3;

/// Normalizes a tax-registration number (CNPJ) to its digits.
///
/// `"12.345.678/0001-90"` and `"12345678000190"` map to the same key.
pub fn normalize_cnpj(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Clamps a provider score into `1..=5`, defaulting when absent.
pub fn clamp_score(score: Option<i64>) -> u8 {
    match score {
        Some(s) => s.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as u8,
        None => DEFAULT_SCORE,
    }
}

/// One candidate company discovered by a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MiningLead {
    pub id: String,
    pub job_id: String,
    /// Natural key, digits only.
    pub cnpj: String,
    pub trade_name: String,
    pub company_phone: String,
    pub company_email: String,
    #[serde(default)]
    pub partners: Vec<String>,
    pub decision_maker_name: String,
    pub decision_maker_phone: String,
    pub decision_maker_email: String,
    pub score: u8,
    pub debt_status: String,
    pub estimated_revenue: String,
    pub website: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub is_imported: bool,
    pub discovered_at: DateTime<Utc>,
}
