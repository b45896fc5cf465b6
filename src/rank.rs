use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::ai::JobRanker;
use crate::db::{Database, JobFilter, RankPatch, TriageFilter};
use crate::errors::AppError;
use crate::models::{Job, Provider, TriageStatus, UserProfile};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RankOutcome {
    pub processed: usize,
    pub ranked: usize,
    pub skipped: usize,
    pub provider: Provider,
}

/// Idempotence gate: nothing to score without a description, and a score
/// computed by the current provider under the current profile version is
/// already up to date.
fn should_rank(job: &Job, provider: Provider, profile_version: i64) -> bool {
    if job
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
    {
        return false;
    }
    if job.rank_score.is_none() {
        return true;
    }
    if job.rank_provider != Some(provider) {
        return true;
    }
    if job.rank_version != Some(profile_version) {
        return true;
    }
    false
}

/// Scores shortlisted jobs. Ranking is a refinement layer: a provider
/// failure on one job degrades to a skip instead of aborting the batch
/// (repository write failures still abort).
pub fn rank_shortlist(
    db: &Database,
    ranker: &dyn JobRanker,
    profile: &UserProfile,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<RankOutcome, AppError> {
    let provider = ranker.provider();

    let mut candidates = db.list_jobs(&JobFilter {
        triage: Some(TriageFilter::Status(TriageStatus::Shortlist)),
        ..Default::default()
    })?;
    if let Some(limit) = limit {
        candidates.truncate(limit);
    }

    let ranked_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut ranked = 0;
    let mut skipped = 0;

    for job in &candidates {
        if !should_rank(job, provider, profile.profile_version) {
            skipped += 1;
            continue;
        }

        let decision = match ranker.rank(job, profile) {
            Ok(Some(decision)) => decision,
            Ok(None) => {
                skipped += 1;
                continue;
            }
            Err(error) => {
                tracing::warn!(job_id = job.id, error = %error, "ranking call failed; skipping job");
                skipped += 1;
                continue;
            }
        };

        db.update_rank(
            job.id,
            &RankPatch {
                score: decision.score,
                reason: decision.reason,
                provider: decision.provider,
                version: profile.profile_version,
            },
            &ranked_at,
        )?;
        ranked += 1;
    }

    tracing::info!(
        processed = candidates.len(),
        ranked,
        skipped,
        provider = provider.as_str(),
        "rank batch finished"
    );

    Ok(RankOutcome {
        processed: candidates.len(),
        ranked,
        skipped,
        provider,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::ai::RankDecision;
    use crate::db::tests::upsert_record;
    use crate::db::TriagePatch;

    struct ScriptedRanker {
        provider: Provider,
        decision: Option<RankDecision>,
        fails: bool,
        calls: Cell<usize>,
    }

    impl ScriptedRanker {
        fn scoring(score: i64) -> Self {
            Self {
                provider: Provider::Ollama,
                decision: Some(RankDecision {
                    score,
                    reason: "solid fit".to_string(),
                    provider: Provider::Ollama,
                }),
                fails: false,
                calls: Cell::new(0),
            }
        }
    }

    impl JobRanker for ScriptedRanker {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn rank(
            &self,
            _job: &Job,
            _profile: &UserProfile,
        ) -> anyhow::Result<Option<RankDecision>> {
            self.calls.set(self.calls.get() + 1);
            if self.fails {
                anyhow::bail!("Ollama is unreachable");
            }
            Ok(self.decision.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-02-03T12:00:00Z".parse().unwrap()
    }

    fn shortlist_job(db: &Database, external_id: &str, description: Option<&str>) -> i64 {
        let mut record = upsert_record(external_id, "Frontend Engineer");
        record.description = description.map(|d| d.to_string());
        db.upsert_jobs(&[record], "2026-02-01T10:00:00Z").unwrap();
        let job = db
            .list_jobs(&JobFilter::default())
            .unwrap()
            .into_iter()
            .find(|job| job.external_id.as_deref() == Some(external_id))
            .unwrap();
        db.update_triage(
            job.id,
            &TriagePatch {
                status: TriageStatus::Shortlist,
                reasons: vec![],
                triaged_at: "2026-02-01T11:00:00Z".to_string(),
                provider: Provider::Ollama,
                version: 1,
            },
        )
        .unwrap();
        job.id
    }

    #[test]
    fn ranks_shortlisted_jobs_and_persists_the_score() {
        let db = Database::open_in_memory().unwrap();
        let id = shortlist_job(&db, "a", Some("Plenty of React work."));
        let ranker = ScriptedRanker::scoring(82);

        let outcome =
            rank_shortlist(&db, &ranker, &UserProfile::default(), None, now()).unwrap();
        assert_eq!(
            outcome,
            RankOutcome {
                processed: 1,
                ranked: 1,
                skipped: 0,
                provider: Provider::Ollama,
            }
        );

        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.rank_score, Some(82));
        assert_eq!(job.rank_reason.as_deref(), Some("solid fit"));
        assert_eq!(job.rank_provider, Some(Provider::Ollama));
        assert_eq!(job.rank_version, Some(1));
    }

    #[test]
    fn second_run_with_same_provider_and_version_skips_everything() {
        let db = Database::open_in_memory().unwrap();
        shortlist_job(&db, "a", Some("Plenty of React work."));
        let ranker = ScriptedRanker::scoring(82);
        let profile = UserProfile::default();

        rank_shortlist(&db, &ranker, &profile, None, now()).unwrap();
        let second = rank_shortlist(&db, &ranker, &profile, None, now()).unwrap();

        assert_eq!(second.ranked, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(ranker.calls.get(), 1);
    }

    #[test]
    fn profile_version_bump_recomputes() {
        let db = Database::open_in_memory().unwrap();
        shortlist_job(&db, "a", Some("Plenty of React work."));
        let ranker = ScriptedRanker::scoring(82);

        rank_shortlist(&db, &ranker, &UserProfile::default(), None, now()).unwrap();

        let mut bumped = UserProfile::default();
        bumped.profile_version = 2;
        let outcome = rank_shortlist(&db, &ranker, &bumped, None, now()).unwrap();
        assert_eq!(outcome.ranked, 1);
        assert_eq!(ranker.calls.get(), 2);
    }

    #[test]
    fn jobs_without_description_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        shortlist_job(&db, "a", None);
        let ranker = ScriptedRanker::scoring(82);

        let outcome =
            rank_shortlist(&db, &ranker, &UserProfile::default(), None, now()).unwrap();
        assert_eq!(outcome.ranked, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(ranker.calls.get(), 0);
    }

    #[test]
    fn provider_failures_degrade_to_skips_without_aborting() {
        let db = Database::open_in_memory().unwrap();
        shortlist_job(&db, "a", Some("React."));
        shortlist_job(&db, "b", Some("More React."));
        let ranker = ScriptedRanker {
            fails: true,
            ..ScriptedRanker::scoring(50)
        };

        let outcome =
            rank_shortlist(&db, &ranker, &UserProfile::default(), None, now()).unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.ranked, 0);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn limit_truncates_the_candidate_set() {
        let db = Database::open_in_memory().unwrap();
        shortlist_job(&db, "a", Some("React."));
        shortlist_job(&db, "b", Some("React."));
        let ranker = ScriptedRanker::scoring(60);

        let outcome =
            rank_shortlist(&db, &ranker, &UserProfile::default(), Some(1), now()).unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.ranked, 1);
    }

    #[test]
    fn only_shortlisted_jobs_are_candidates() {
        let db = Database::open_in_memory().unwrap();
        let mut record = upsert_record("plain", "Frontend Engineer");
        record.description = Some("React.".to_string());
        db.upsert_jobs(&[record], "2026-02-01T10:00:00Z").unwrap();
        let ranker = ScriptedRanker::scoring(60);

        let outcome =
            rank_shortlist(&db, &ranker, &UserProfile::default(), None, now()).unwrap();
        assert_eq!(outcome.processed, 0);
    }
}
