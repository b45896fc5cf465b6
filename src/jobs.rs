use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::ai::JobTriage;
use crate::db::{Database, JobDraft, TriagePatch};
use crate::errors::AppError;
use crate::models::{Job, UserProfile};

/// Below this the description isn't worth a model call.
pub const MIN_AUTO_TRIAGE_CHARS: usize = 200;

#[derive(Debug, Default, Clone)]
pub struct ManualJobInput {
    pub role: String,
    pub company: String,
    pub source_url: Option<String>,
    pub location: Option<String>,
    pub seniority: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub auto_triage: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ManualTriageReport {
    pub attempted: bool,
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ManualJobOutcome {
    pub job: Job,
    pub triage: ManualTriageReport,
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Manually entered posting. Creation always succeeds on valid input; the
/// optional coarse triage afterwards is best-effort and reports its result
/// instead of failing the call.
pub fn create_manual_job(
    db: &Database,
    triage: &dyn JobTriage,
    profile: &UserProfile,
    input: ManualJobInput,
    now: DateTime<Utc>,
) -> Result<ManualJobOutcome, AppError> {
    let role = input.role.trim().to_string();
    let company = input.company.trim().to_string();
    if role.is_empty() {
        return Err(AppError::validation("Role is required."));
    }
    if company.is_empty() {
        return Err(AppError::validation("Company is required."));
    }

    let now_iso = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let description = normalize(input.description);
    let draft = JobDraft {
        external_id: None,
        source: "Manual".to_string(),
        role,
        company,
        location: normalize(input.location).unwrap_or_else(|| "Remote".to_string()),
        seniority: normalize(input.seniority).unwrap_or_else(|| "Unspecified".to_string()),
        tags: input
            .tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        description: description.clone(),
        source_url: normalize(input.source_url),
        published_at: normalize(input.published_at).or_else(|| Some(now_iso.clone())),
    };

    let created = db.create_job(&draft, &now_iso)?;

    let should_triage = input.auto_triage != Some(false)
        && description
            .as_deref()
            .map(|d| d.chars().count() >= MIN_AUTO_TRIAGE_CHARS)
            .unwrap_or(false);
    if !should_triage {
        return Ok(ManualJobOutcome {
            job: created,
            triage: ManualTriageReport {
                attempted: false,
                updated: false,
                error: None,
            },
        });
    }

    match triage.coarse(&created, profile) {
        Ok(Some(decision)) => {
            let updated = db.update_triage(
                created.id,
                &TriagePatch {
                    status: decision.status,
                    reasons: decision.reasons,
                    triaged_at: now_iso,
                    provider: decision.provider,
                    version: profile.profile_version,
                },
            )?;
            Ok(ManualJobOutcome {
                job: updated,
                triage: ManualTriageReport {
                    attempted: true,
                    updated: true,
                    error: None,
                },
            })
        }
        Ok(None) => Ok(ManualJobOutcome {
            job: created,
            triage: ManualTriageReport {
                attempted: true,
                updated: false,
                error: None,
            },
        }),
        Err(error) => Ok(ManualJobOutcome {
            job: created,
            triage: ManualTriageReport {
                attempted: true,
                updated: false,
                error: Some(error.to_string()),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::TriageDecision;
    use crate::models::{Provider, TriageStatus};

    struct ScriptedTriage {
        decision: Option<TriageDecision>,
        fails: bool,
    }

    impl JobTriage for ScriptedTriage {
        fn coarse(
            &self,
            _job: &Job,
            _profile: &UserProfile,
        ) -> anyhow::Result<Option<TriageDecision>> {
            if self.fails {
                anyhow::bail!("Ollama is unreachable");
            }
            Ok(self.decision.clone())
        }

        fn disambiguate(
            &self,
            _job: &Job,
            _profile: &UserProfile,
            _previous: &TriageDecision,
        ) -> anyhow::Result<Option<TriageDecision>> {
            Ok(None)
        }

        fn disambiguation_available(&self) -> bool {
            false
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-02-03T12:00:00Z".parse().unwrap()
    }

    fn long_description() -> String {
        "We are hiring a frontend engineer to build accessible interfaces. ".repeat(5)
    }

    fn shortlist_decision() -> TriageDecision {
        TriageDecision {
            status: TriageStatus::Shortlist,
            reasons: vec!["good fit".to_string()],
            provider: Provider::Ollama,
            confidence: Some(0.9),
            tags: vec![],
        }
    }

    #[test]
    fn requires_role_and_company() {
        let db = Database::open_in_memory().unwrap();
        let triage = ScriptedTriage {
            decision: None,
            fails: false,
        };

        let missing_role = create_manual_job(
            &db,
            &triage,
            &UserProfile::default(),
            ManualJobInput {
                company: "Acme".to_string(),
                ..Default::default()
            },
            now(),
        );
        assert!(matches!(missing_role, Err(AppError::Validation(_))));

        let missing_company = create_manual_job(
            &db,
            &triage,
            &UserProfile::default(),
            ManualJobInput {
                role: "Engineer".to_string(),
                company: "   ".to_string(),
                ..Default::default()
            },
            now(),
        );
        assert!(matches!(missing_company, Err(AppError::Validation(_))));
    }

    #[test]
    fn fills_defaults_for_optional_fields() {
        let db = Database::open_in_memory().unwrap();
        let triage = ScriptedTriage {
            decision: None,
            fails: false,
        };

        let outcome = create_manual_job(
            &db,
            &triage,
            &UserProfile::default(),
            ManualJobInput {
                role: " Frontend Engineer ".to_string(),
                company: "Acme".to_string(),
                tags: vec![" react ".to_string(), "".to_string()],
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        let job = outcome.job;
        assert_eq!(job.role, "Frontend Engineer");
        assert_eq!(job.source, "Manual");
        assert_eq!(job.location, "Remote");
        assert_eq!(job.seniority, "Unspecified");
        assert_eq!(job.tags, vec!["react"]);
        assert_eq!(job.external_id, None);
        assert_eq!(job.published_at.as_deref(), Some("2026-02-03T12:00:00Z"));
        assert!(!outcome.triage.attempted);
    }

    #[test]
    fn long_descriptions_trigger_auto_triage() {
        let db = Database::open_in_memory().unwrap();
        let triage = ScriptedTriage {
            decision: Some(shortlist_decision()),
            fails: false,
        };
        let profile = UserProfile::default();

        let outcome = create_manual_job(
            &db,
            &triage,
            &profile,
            ManualJobInput {
                role: "Frontend Engineer".to_string(),
                company: "Acme".to_string(),
                description: Some(long_description()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        assert_eq!(
            outcome.triage,
            ManualTriageReport {
                attempted: true,
                updated: true,
                error: None,
            }
        );
        assert_eq!(outcome.job.triage_status, Some(TriageStatus::Shortlist));
        assert_eq!(outcome.job.triage_version, Some(profile.profile_version));
    }

    #[test]
    fn short_descriptions_and_opt_outs_skip_auto_triage() {
        let db = Database::open_in_memory().unwrap();
        let triage = ScriptedTriage {
            decision: Some(shortlist_decision()),
            fails: false,
        };

        let short = create_manual_job(
            &db,
            &triage,
            &UserProfile::default(),
            ManualJobInput {
                role: "Engineer".to_string(),
                company: "Acme".to_string(),
                description: Some("Short blurb.".to_string()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert!(!short.triage.attempted);

        let opted_out = create_manual_job(
            &db,
            &triage,
            &UserProfile::default(),
            ManualJobInput {
                role: "Engineer".to_string(),
                company: "Acme".to_string(),
                description: Some(long_description()),
                auto_triage: Some(false),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert!(!opted_out.triage.attempted);
    }

    #[test]
    fn triage_failure_reports_but_keeps_the_job() {
        let db = Database::open_in_memory().unwrap();
        let triage = ScriptedTriage {
            decision: None,
            fails: true,
        };

        let outcome = create_manual_job(
            &db,
            &triage,
            &UserProfile::default(),
            ManualJobInput {
                role: "Engineer".to_string(),
                company: "Acme".to_string(),
                description: Some(long_description()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        assert!(outcome.triage.attempted);
        assert!(!outcome.triage.updated);
        assert!(outcome
            .triage
            .error
            .as_deref()
            .unwrap()
            .contains("unreachable"));
        assert_eq!(outcome.job.triage_status, None);
        assert!(db.get_job(outcome.job.id).unwrap().is_some());
    }
}
