//! Dedup and persistence of discovered companies.
//!
//! A candidate becomes a [`MiningLead`] only if its normalized CNPJ is
//! non-empty and appears neither in the CRM collection, nor in the mined
//! collection, nor earlier in the same batch. This is the only place new
//! leads are written.

use std::collections::HashSet;

use chrono::Utc;
use tracing::debug;

use crate::environment::keys;
use crate::error::StoreError;
use crate::model::lead::clamp_score;
use crate::model::{normalize_cnpj, MiningJob, MiningLead, FALLBACK_SOURCES, NOT_LOCATED};
use crate::provider::{CandidateCompany, ProvenanceSource};
use crate::store::{Store, StoreTxn};

#[derive(Debug, Clone)]
pub struct LeadPipeline {
    store: Store,
}

impl LeadPipeline {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Merges every new candidate. Returns the number of leads created.
    pub fn persist(
        &self,
        job: &MiningJob,
        candidates: &[CandidateCompany],
        sources: &[ProvenanceSource],
    ) -> Result<usize, StoreError> {
        self.store
            .transaction(|txn| merge(txn, job, candidates, sources, None))
    }
}

/// Natural keys of the CRM collection. Entries without a usable `cnpj`
/// field are ignored.
fn crm_keys(txn: &StoreTxn<'_>) -> Result<HashSet<String>, StoreError> {
    let crm: Vec<serde_json::Value> = txn.load(keys::CRM_LEADS)?;
    Ok(crm
        .iter()
        .filter_map(|lead| lead.get("cnpj").and_then(|v| v.as_str()))
        .map(normalize_cnpj)
        .filter(|key| !key.is_empty())
        .collect())
}

pub(crate) fn merge(
    txn: &StoreTxn<'_>,
    job: &MiningJob,
    candidates: &[CandidateCompany],
    sources: &[ProvenanceSource],
    limit: Option<usize>,
) -> Result<usize, StoreError> {
    if limit == Some(0) || candidates.is_empty() {
        return Ok(0);
    }

    let mut leads: Vec<MiningLead> = txn.load(keys::LEADS)?;
    let crm = crm_keys(txn)?;
    let mut seen: HashSet<String> = leads.iter().map(|lead| lead.cnpj.clone()).collect();

    let provenance = provenance(sources);
    let mut added = 0;
    for candidate in candidates {
        if limit.is_some_and(|limit| added >= limit) {
            break;
        }

        let key = normalize_cnpj(&candidate.cnpj);
        if key.is_empty() {
            debug!(name = %candidate.name, "Skipping candidate without CNPJ");
            continue;
        }
        if crm.contains(&key) || !seen.insert(key.clone()) {
            continue;
        }

        leads.push(build_lead(job, key, candidate, provenance.clone()));
        added += 1;
    }

    if added > 0 {
        txn.save(keys::LEADS, &leads)?;
    }
    Ok(added)
}

fn provenance(sources: &[ProvenanceSource]) -> Vec<String> {
    let uris: Vec<String> = sources
        .iter()
        .map(|s| s.uri.trim())
        .filter(|uri| !uri.is_empty())
        .map(str::to_string)
        .collect();
    if uris.is_empty() {
        FALLBACK_SOURCES.iter().map(|s| s.to_string()).collect()
    } else {
        uris
    }
}

fn or_not_located(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_LOCATED.to_string(),
    }
}

fn build_lead(
    job: &MiningJob,
    cnpj: String,
    candidate: &CandidateCompany,
    sources: Vec<String>,
) -> MiningLead {
    MiningLead {
        id: uuid::Uuid::new_v4().to_string(),
        job_id: job.id.clone(),
        cnpj,
        trade_name: or_not_located(Some(&candidate.name)),
        company_phone: or_not_located(candidate.phone.as_deref()),
        company_email: or_not_located(candidate.email.as_deref()),
        partners: candidate
            .partners
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        decision_maker_name: or_not_located(candidate.decision_maker_name.as_deref()),
        decision_maker_phone: or_not_located(candidate.decision_maker_phone.as_deref()),
        decision_maker_email: or_not_located(candidate.decision_maker_email.as_deref()),
        score: clamp_score(candidate.score),
        debt_status: or_not_located(candidate.debt_status.as_deref()),
        estimated_revenue: or_not_located(candidate.estimated_revenue.as_deref()),
        website: or_not_located(candidate.website.as_deref()),
        segment: job.filters.segment.clone(),
        city: job.filters.city.clone(),
        state: job.filters.state.clone(),
        sources,
        is_imported: false,
        discovered_at: Utc::now(),
    }
}
