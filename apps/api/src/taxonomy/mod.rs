//! Skills taxonomy: the domains → subdomains → skills tree the interviewer draws topics from.
//!
//! Loaded once at startup and shared read-only by every session. A missing or malformed
//! file never takes the service down: `load_or_empty` logs and degrades to no domains.

pub mod handlers;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Taxonomy file not found at {0}")]
    NotFound(String),

    #[error("Failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in taxonomy file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid taxonomy: {0}")]
    Invalid(String),
}

/// Fields beyond the ones modelled here (`extra`) are kept and sent to the model
/// verbatim along with the rest of the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub domains: Vec<Domain>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub subdomains: Vec<Subdomain>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subdomain {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub core_skills: Vec<Skill>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Skills appear as bare names, as named objects carrying extra authoring metadata,
/// or as any other JSON value, which is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Skill {
    Name(String),
    Detailed(SkillDetail),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDetail {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Skill {
    pub fn name(&self) -> Option<&str> {
        match self {
            Skill::Name(name) => Some(name),
            Skill::Detailed(detail) => Some(&detail.name),
            Skill::Other(_) => None,
        }
    }
}

impl Taxonomy {
    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.name.as_str()).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loading & validation
// ────────────────────────────────────────────────────────────────────────────

/// Reads and parses a taxonomy JSON file. Does not validate beyond the serde shape.
pub fn load(path: &Path) -> Result<Taxonomy, TaxonomyError> {
    let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TaxonomyError::NotFound(path.display().to_string()),
        _ => TaxonomyError::Io(e),
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Structural checks serde cannot express: every domain and subdomain must be named.
pub fn validate(taxonomy: &Taxonomy) -> Result<(), TaxonomyError> {
    for domain in &taxonomy.domains {
        if domain.name.trim().is_empty() {
            return Err(TaxonomyError::Invalid(
                "Each domain must have a non-empty 'name' field".to_string(),
            ));
        }
        for subdomain in &domain.subdomains {
            if subdomain.name.trim().is_empty() {
                return Err(TaxonomyError::Invalid(format!(
                    "Each subdomain of '{}' must have a non-empty 'name' field",
                    domain.name
                )));
            }
        }
    }
    Ok(())
}

/// Loads and validates the taxonomy, substituting an empty domain list on any failure.
pub fn load_or_empty(path: &Path) -> Taxonomy {
    match load(path).and_then(|t| validate(&t).map(|_| t)) {
        Ok(taxonomy) => {
            info!(
                "Loaded taxonomy from {} ({} domains: {})",
                path.display(),
                taxonomy.domains.len(),
                taxonomy.domain_names().join(", ")
            );
            taxonomy
        }
        Err(e) => {
            warn!("Could not load taxonomy: {e}. Falling back to an empty domain list");
            Taxonomy::default()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Summary
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TaxonomySummary {
    pub total_domains: usize,
    pub domains: Vec<DomainSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub name: String,
    pub subdomains_count: usize,
    pub subdomains: Vec<SubdomainSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubdomainSummary {
    pub name: String,
    pub skills_count: usize,
    pub skills: Vec<String>,
}

pub fn summarize(taxonomy: &Taxonomy) -> TaxonomySummary {
    TaxonomySummary {
        total_domains: taxonomy.domains.len(),
        domains: taxonomy
            .domains
            .iter()
            .map(|domain| DomainSummary {
                name: domain.name.clone(),
                subdomains_count: domain.subdomains.len(),
                subdomains: domain
                    .subdomains
                    .iter()
                    .map(|sub| SubdomainSummary {
                        name: sub.name.clone(),
                        skills_count: sub.core_skills.len(),
                        skills: sub
                            .core_skills
                            .iter()
                            .filter_map(Skill::name)
                            .map(str::to_string)
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}
