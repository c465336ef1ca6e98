pub mod job;
pub mod lead;

pub use job::{CompanySize, DebtFilter, JobFilters, JobStatus, MiningJob, NewJob};
pub use lead::{normalize_cnpj, MiningLead, FALLBACK_SOURCES, NOT_LOCATED};
