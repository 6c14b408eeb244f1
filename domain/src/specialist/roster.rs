//! The configured set of specialists and the built-in default roster.

use super::profile::{SpecialistProfile, SpecialistTier};
use crate::core::error::DomainError;
use crate::core::ids::SpecialistId;
use crate::generation::endpoint::CapabilityEndpoint;
use std::collections::HashSet;

/// Built-in specialist: (id, tier, expertise keywords, persona).
type Builtin = (
    &'static str,
    SpecialistTier,
    &'static [&'static str],
    &'static str,
);

const BUILTIN: &[Builtin] = &[
    (
        "Divergent",
        SpecialistTier::Core,
        &[
            "options",
            "alternatives",
            "possibilities",
            "approaches",
            "ideas",
            "creative",
            "different ways",
            "what if",
        ],
        "You widen the solution space. Propose alternatives nobody has raised yet \
         and question framing that narrows the options too early.",
    ),
    (
        "Convergent",
        SpecialistTier::Core,
        &[
            "decide",
            "choose",
            "recommend",
            "best",
            "solution",
            "action",
            "implement",
            "plan",
            "synthesis",
        ],
        "You narrow the discussion toward a decision. Weigh the options on the \
         table and argue for a concrete recommendation.",
    ),
    (
        "Critical",
        SpecialistTier::Core,
        &[
            "risks",
            "problems",
            "concerns",
            "issues",
            "validate",
            "verify",
            "wrong",
            "fail",
            "security",
            "flaws",
        ],
        "You stress-test proposals. Point out risks, failure modes and unstated \
         assumptions, and say what would have to be true for an idea to work.",
    ),
    (
        "Pragmatist",
        SpecialistTier::Support,
        &[
            "practical",
            "feasible",
            "implement",
            "resources",
            "cost",
            "timeline",
            "realistic",
            "constraints",
        ],
        "You ground the discussion in execution. Estimate effort, cost and \
         sequencing, and flag ideas that will not survive real constraints.",
    ),
    (
        "UserProxy",
        SpecialistTier::Support,
        &[
            "user",
            "experience",
            "usability",
            "customer",
            "audience",
            "accessible",
            "interface",
            "ux",
        ],
        "You speak for the people who will live with the outcome. Describe how \
         each option feels to its users and who gets left out.",
    ),
    (
        "Quantifier",
        SpecialistTier::Support,
        &[
            "metrics",
            "numbers",
            "measure",
            "data",
            "performance",
            "benchmark",
            "statistics",
            "quantify",
        ],
        "You make claims measurable. Attach numbers, propose metrics and explain \
         how the group would know whether a choice worked.",
    ),
];

/// The set of specialists available to discussions.
///
/// Ids are unique. Order is preserved and used when spawning units.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    profiles: Vec<SpecialistProfile>,
}

impl Roster {
    /// Build a roster, rejecting duplicate ids and invalid thresholds.
    pub fn new(profiles: Vec<SpecialistProfile>) -> Result<Self, DomainError> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            profile.validate()?;
            if !seen.insert(profile.id().clone()) {
                return Err(DomainError::DuplicateSpecialist(profile.id().to_string()));
            }
        }
        Ok(Self { profiles })
    }

    /// The six built-in specialists, all served by `endpoint`.
    pub fn builtin(endpoint: &CapabilityEndpoint) -> Self {
        let profiles = BUILTIN
            .iter()
            .filter_map(|(id, tier, keywords, persona)| {
                let id = SpecialistId::try_new(*id).ok()?;
                Some(
                    SpecialistProfile::new(id, *tier, endpoint.clone())
                        .with_expertise(keywords.iter())
                        .with_persona(*persona),
                )
            })
            .collect();
        Self { profiles }
    }

    /// Names of the built-in specialists.
    pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(id, ..)| *id)
    }

    pub fn get(&self, id: &SpecialistId) -> Option<&SpecialistProfile> {
        self.profiles.iter().find(|p| p.id() == id)
    }

    /// Resolve a list of ids, failing on the first unknown one.
    pub fn resolve(&self, ids: &[SpecialistId]) -> Result<Vec<SpecialistProfile>, SpecialistId> {
        ids.iter()
            .map(|id| self.get(id).cloned().ok_or_else(|| id.clone()))
            .collect()
    }

    pub fn ids(&self) -> Vec<SpecialistId> {
        self.profiles.iter().map(|p| p.id().clone()).collect()
    }

    pub fn profiles(&self) -> &[SpecialistProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
