mod sampler;
mod service;

pub use sampler::{DomainPool, domain_quota, sample_domain_quiz, sample_simulation};
pub use service::{SimulationService, SimulationSubmission};
