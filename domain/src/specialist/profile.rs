//! Specialist profile value objects.

use crate::core::error::DomainError;
use crate::core::ids::SpecialistId;
use crate::generation::endpoint::CapabilityEndpoint;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whether a specialist drives the discussion or supports it.
///
/// Core specialists are allowed in early with a relaxed relevance threshold;
/// support specialists must be relevant from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistTier {
    Core,
    #[default]
    Support,
}

impl SpecialistTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistTier::Core => "core",
            SpecialistTier::Support => "support",
        }
    }
}

impl std::fmt::Display for SpecialistTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(SpecialistTier::Core),
            "support" => Ok(SpecialistTier::Support),
            other => Err(DomainError::InvalidId(format!("specialist tier '{}'", other))),
        }
    }
}

/// Relevance thresholds (fraction of expertise keywords that must match).
///
/// - `early` applies while the log is shorter than the early-stage cutoff
/// - `standard` applies afterwards
/// - `late_stage` is the stricter bar once the late-stage cutoff is reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceThresholds {
    pub early: f64,
    pub standard: f64,
    pub late_stage: f64,
}

impl RelevanceThresholds {
    pub const STANDARD: f64 = 0.1;
    pub const LATE_STAGE: f64 = 0.25;

    /// Default thresholds for a tier. Core specialists skip the gate early on.
    pub fn for_tier(tier: SpecialistTier) -> Self {
        let early = match tier {
            SpecialistTier::Core => 0.0,
            SpecialistTier::Support => Self::STANDARD,
        };
        Self {
            early,
            standard: Self::STANDARD,
            late_stage: Self::LATE_STAGE,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("early", self.early),
            ("standard", self.standard),
            ("late_stage", self.late_stage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration record for one specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistProfile {
    id: SpecialistId,
    tier: SpecialistTier,
    expertise: Vec<String>,
    thresholds: RelevanceThresholds,
    endpoint: CapabilityEndpoint,
    persona: String,
}

impl SpecialistProfile {
    /// Create a profile with tier-default thresholds and no expertise keywords.
    pub fn new(id: SpecialistId, tier: SpecialistTier, endpoint: CapabilityEndpoint) -> Self {
        Self {
            id,
            tier,
            expertise: Vec::new(),
            thresholds: RelevanceThresholds::for_tier(tier),
            endpoint,
            persona: String::new(),
        }
    }

    /// Set expertise keywords. Keywords are lowercased; blanks are dropped.
    pub fn with_expertise<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expertise = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn with_thresholds(mut self, thresholds: RelevanceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: CapabilityEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn id(&self) -> &SpecialistId {
        &self.id
    }

    pub fn tier(&self) -> SpecialistTier {
        self.tier
    }

    pub fn is_core(&self) -> bool {
        self.tier == SpecialistTier::Core
    }

    pub fn expertise(&self) -> &[String] {
        &self.expertise
    }

    pub fn thresholds(&self) -> &RelevanceThresholds {
        &self.thresholds
    }

    pub fn endpoint(&self) -> &CapabilityEndpoint {
        &self.endpoint
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.thresholds.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::endpoint::ProviderKind;

    fn endpoint() -> CapabilityEndpoint {
        CapabilityEndpoint::new(ProviderKind::Ollama, "llama3.1").unwrap()
    }

    #[test]
    fn core_thresholds_are_relaxed_early() {
        let core = RelevanceThresholds::for_tier(SpecialistTier::Core);
        let support = RelevanceThresholds::for_tier(SpecialistTier::Support);
        assert!(core.early < support.early);
        assert_eq!(core.standard, support.standard);
    }

    #[test]
    fn expertise_is_normalized() {
        let profile = SpecialistProfile::new(
            SpecialistId::try_new("Critical").unwrap(),
            SpecialistTier::Core,
            endpoint(),
        )
        .with_expertise(["Risks", "  ", " Security "]);
        assert_eq!(profile.expertise(), ["risks", "security"]);
        assert!(profile.is_core());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let profile = SpecialistProfile::new(
            SpecialistId::try_new("Quantifier").unwrap(),
            SpecialistTier::Support,
            endpoint(),
        )
        .with_thresholds(RelevanceThresholds {
            early: 0.1,
            standard: 0.1,
            late_stage: 1.2,
        });
        assert!(matches!(
            profile.validate(),
            Err(DomainError::InvalidThreshold {
                name: "late_stage",
                ..
            })
        ));
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("CORE".parse::<SpecialistTier>().unwrap(), SpecialistTier::Core);
        assert!("lead".parse::<SpecialistTier>().is_err());
    }
}
