//! Specialist roster configuration from TOML (`[roster]`, `[[specialists]]`, `[synthesizer]`)

use council_domain::{
    CapabilityEndpoint, ConfigIssue, ConfigIssueCode, RelevanceThresholds, Roster, SpecialistId,
    SpecialistProfile, SpecialistTier,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Roster-wide settings
///
/// # Example
///
/// ```toml
/// [roster]
/// endpoint = "ollama:llama3.1:8b"   # default endpoint for every specialist
/// builtin = true                    # start from the six built-in specialists
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRosterConfig {
    pub endpoint: String,
    pub builtin: bool,
}

impl Default for FileRosterConfig {
    fn default() -> Self {
        Self {
            endpoint: "ollama:llama3.1:8b".to_string(),
            builtin: true,
        }
    }
}

/// One `[[specialists]]` entry. An id matching a built-in specialist
/// overrides that specialist's fields.
///
/// ```toml
/// [[specialists]]
/// id = "Security"
/// tier = "support"
/// expertise = ["security", "threat", "auth"]
/// endpoint = "openrouter:anthropic/claude-3.5-sonnet"
/// late_stage = 0.3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSpecialistConfig {
    pub id: String,
    pub tier: Option<String>,
    pub expertise: Option<Vec<String>>,
    pub endpoint: Option<String>,
    pub persona: Option<String>,
    pub early: Option<f64>,
    pub standard: Option<f64>,
    pub late_stage: Option<f64>,
}

/// Endpoint for rolling summaries and the final synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSynthesizerConfig {
    /// Defaults to the first assigned specialist's endpoint
    pub endpoint: Option<String>,
}

impl FileSynthesizerConfig {
    pub fn parse_endpoint(&self) -> (Option<CapabilityEndpoint>, Vec<ConfigIssue>) {
        match &self.endpoint {
            None => (None, vec![]),
            Some(raw) => match parse_endpoint("synthesizer.endpoint", raw) {
                Ok(endpoint) => (Some(endpoint), vec![]),
                Err(issue) => (None, vec![issue]),
            },
        }
    }
}

/// Build the roster from `[roster]` and `[[specialists]]`.
///
/// Returns `None` when an error-level issue makes the roster unusable.
pub fn build_roster(
    roster: &FileRosterConfig,
    specialists: &[FileSpecialistConfig],
) -> (Option<Roster>, Vec<ConfigIssue>) {
    let mut issues = Vec::new();

    let default_endpoint = match parse_endpoint("roster.endpoint", &roster.endpoint) {
        Ok(endpoint) => endpoint,
        Err(issue) => return (None, vec![issue]),
    };

    let mut profiles: Vec<SpecialistProfile> = if roster.builtin {
        Roster::builtin(&default_endpoint).profiles().to_vec()
    } else {
        Vec::new()
    };

    let mut seen = HashSet::new();
    for (index, entry) in specialists.iter().enumerate() {
        let field = format!("specialists[{}]", index);
        let id = match SpecialistId::try_new(entry.id.as_str()) {
            Ok(id) => id,
            Err(_) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidValue {
                        field: format!("{}.id", field),
                        value: entry.id.clone(),
                    },
                    format!("{}.id: '{}' is not a valid specialist id", field, entry.id),
                ));
                continue;
            }
        };
        if !seen.insert(id.clone()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::DuplicateSpecialist { id: id.to_string() },
                format!("specialist '{}' is configured twice", id),
            ));
            continue;
        }

        let existing = profiles.iter().position(|p| p.id() == &id);
        let base = match existing {
            Some(i) => profiles[i].clone(),
            None => SpecialistProfile::new(id.clone(), SpecialistTier::default(), default_endpoint.clone()),
        };
        match apply_entry(base, entry, &field) {
            Ok(profile) => match existing {
                Some(i) => profiles[i] = profile,
                None => profiles.push(profile),
            },
            Err(issue) => issues.push(issue),
        }
    }

    if profiles.is_empty() {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::EmptyRoster,
            "no specialists configured and the built-in roster is disabled",
        ));
        return (None, issues);
    }

    if issues.iter().any(|i| i.severity == council_domain::Severity::Error) {
        return (None, issues);
    }
    match Roster::new(profiles) {
        Ok(roster) => (Some(roster), issues),
        Err(e) => {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValue {
                    field: "specialists".to_string(),
                    value: String::new(),
                },
                e.to_string(),
            ));
            (None, issues)
        }
    }
}

fn apply_entry(
    mut profile: SpecialistProfile,
    entry: &FileSpecialistConfig,
    field: &str,
) -> Result<SpecialistProfile, ConfigIssue> {
    if let Some(raw) = &entry.tier {
        let tier: SpecialistTier = raw.parse().map_err(|_| {
            ConfigIssue::error(
                ConfigIssueCode::InvalidValue {
                    field: format!("{}.tier", field),
                    value: raw.clone(),
                },
                format!("{}.tier: expected 'core' or 'support', got '{}'", field, raw),
            )
        })?;
        // Rebuild so tier-default thresholds follow the new tier.
        let rebuilt = SpecialistProfile::new(profile.id().clone(), tier, profile.endpoint().clone())
            .with_expertise(profile.expertise().iter())
            .with_persona(profile.persona());
        profile = rebuilt;
    }
    if let Some(raw) = &entry.endpoint {
        profile = profile.with_endpoint(parse_endpoint(&format!("{}.endpoint", field), raw)?);
    }
    if let Some(expertise) = &entry.expertise {
        profile = profile.with_expertise(expertise.iter());
    }
    if let Some(persona) = &entry.persona {
        profile = profile.with_persona(persona.as_str());
    }

    let mut thresholds: RelevanceThresholds = *profile.thresholds();
    for (name, value, slot) in [
        ("early", entry.early, &mut thresholds.early),
        ("standard", entry.standard, &mut thresholds.standard),
        ("late_stage", entry.late_stage, &mut thresholds.late_stage),
    ] {
        if let Some(value) = value {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigIssue::error(
                    ConfigIssueCode::ThresholdOutOfRange {
                        field: format!("{}.{}", field, name),
                    },
                    format!("{}.{}: {} is outside 0.0..=1.0", field, name, value),
                ));
            }
            *slot = value;
        }
    }
    Ok(profile.with_thresholds(thresholds))
}

fn parse_endpoint(field: &str, raw: &str) -> Result<CapabilityEndpoint, ConfigIssue> {
    raw.parse::<CapabilityEndpoint>().map_err(|e| {
        ConfigIssue::error(
            ConfigIssueCode::InvalidValue {
                field: field.to_string(),
                value: raw.to_string(),
            },
            format!("{}: {}", field, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::ProviderKind;

    fn id(s: &str) -> SpecialistId {
        SpecialistId::try_new(s).unwrap()
    }

    #[test]
    fn builtin_roster_by_default() {
        let (roster, issues) = build_roster(&FileRosterConfig::default(), &[]);
        let roster = roster.unwrap();
        assert!(issues.is_empty());
        assert_eq!(roster.len(), 6);
        let critical = roster.get(&id("Critical")).unwrap();
        assert!(critical.is_core());
        assert_eq!(critical.endpoint().model(), "llama3.1:8b");
    }

    #[test]
    fn entry_overrides_builtin_and_adds_new() {
        let specialists = vec![
            FileSpecialistConfig {
                id: "Critical".to_string(),
                endpoint: Some("openrouter:anthropic/claude-3.5-sonnet".to_string()),
                late_stage: Some(0.4),
                ..Default::default()
            },
            FileSpecialistConfig {
                id: "Security".to_string(),
                tier: Some("support".to_string()),
                expertise: Some(vec!["Security".to_string(), "auth".to_string()]),
                ..Default::default()
            },
        ];
        let (roster, issues) = build_roster(&FileRosterConfig::default(), &specialists);
        assert!(issues.is_empty());
        let roster = roster.unwrap();
        assert_eq!(roster.len(), 7);

        let critical = roster.get(&id("Critical")).unwrap();
        assert_eq!(critical.endpoint().provider(), ProviderKind::OpenRouter);
        assert_eq!(critical.thresholds().late_stage, 0.4);
        assert!(!critical.expertise().is_empty());

        let security = roster.get(&id("Security")).unwrap();
        assert_eq!(security.expertise(), &["security".to_string(), "auth".to_string()]);
        assert!(!security.is_core());
    }

    #[test]
    fn empty_roster_is_an_error() {
        let roster = FileRosterConfig {
            builtin: false,
            ..Default::default()
        };
        let (built, issues) = build_roster(&roster, &[]);
        assert!(built.is_none());
        assert_eq!(issues[0].code, ConfigIssueCode::EmptyRoster);
    }

    #[test]
    fn duplicate_and_out_of_range_entries() {
        let specialists = vec![
            FileSpecialistConfig {
                id: "Analyst".to_string(),
                early: Some(1.5),
                ..Default::default()
            },
            FileSpecialistConfig {
                id: "Analyst".to_string(),
                ..Default::default()
            },
        ];
        let (built, issues) = build_roster(&FileRosterConfig::default(), &specialists);
        assert!(built.is_none());
        assert!(issues.iter().any(|i| matches!(
            i.code,
            ConfigIssueCode::ThresholdOutOfRange { .. }
        )));
        assert!(issues.iter().any(|i| matches!(
            i.code,
            ConfigIssueCode::DuplicateSpecialist { .. }
        )));
    }

    #[test]
    fn invalid_endpoint_reported() {
        let roster = FileRosterConfig {
            endpoint: "nowhere".to_string(),
            builtin: true,
        };
        let (built, issues) = build_roster(&roster, &[]);
        assert!(built.is_none());
        assert!(matches!(issues[0].code, ConfigIssueCode::InvalidValue { .. }));
    }
}
