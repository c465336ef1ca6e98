//! Builders for jobs and scripted discovery pages.

#![allow(dead_code)]

use leadminer::model::{CompanySize, DebtFilter, JobFilters, NewJob};
use leadminer::provider::{CandidateCompany, ProvenanceSource};

/// Builder for creating `NewJob` requests.
pub struct JobBuilder {
    request: NewJob,
}

impl JobBuilder {
    pub fn new() -> Self {
        let filters = JobFilters {
            segment: "Dental clinics".to_string(),
            state: "SP".to_string(),
            city: "Campinas".to_string(),
            size: CompanySize::All,
            tax_regime: None,
            debt_filter: DebtFilter::Any,
        };
        Self {
            request: NewJob::new(filters, 10),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.request.name = name.to_string();
        self
    }

    pub fn segment(mut self, segment: &str) -> Self {
        self.request.filters.segment = segment.to_string();
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.request.filters.state = state.to_string();
        self
    }

    pub fn target(mut self, target: u32) -> Self {
        self.request.target_count = target;
        self
    }

    pub fn enrich(mut self) -> Self {
        self.request.enrich = true;
        self
    }

    pub fn build(self) -> NewJob {
        self.request
    }
}

/// A candidate with a formatted CNPJ derived from `n`.
pub fn company(n: u32) -> CandidateCompany {
    CandidateCompany {
        cnpj: format!("{:02}.{:03}.{:03}/0001-{:02}", n % 100, n, n, n % 100),
        name: format!("Company {}", n),
        phone: Some(format!("+55 11 9000-{:04}", n)),
        score: Some(4),
        ..Default::default()
    }
}

pub fn companies(range: std::ops::RangeInclusive<u32>) -> Vec<CandidateCompany> {
    range.map(company).collect()
}

/// Normalized key of [`company`]`(n)`.
pub fn company_key(n: u32) -> String {
    leadminer::model::normalize_cnpj(&company(n).cnpj)
}

pub fn source(uri: &str) -> ProvenanceSource {
    ProvenanceSource {
        uri: uri.to_string(),
        title: None,
    }
}
