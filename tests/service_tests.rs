/// Orchestrator tests against an in-memory profile store.
///
/// Covers the individual pipeline (error taxonomy, trust-score create vs
/// update asymmetry, idempotent re-scoring), the group pipeline (order
/// preservation, missing-member tolerance, mean and risk distribution,
/// empty-group behavior), and the financial summary read path.
use async_trait::async_trait;
use chrono::Utc;
use credit_scoring_api::errors::AppError;
use credit_scoring_api::models::{
    FinancialProfile, GroupMemberFinancials, GroupOverview, MemberProfile, RiskLevel, TrustScore,
    TrustScoreUpsert, UserRecord,
};
use credit_scoring_api::services::ScoringService;
use credit_scoring_api::store::ProfileStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory store so the orchestrators can be exercised in isolation.
/// The upsert mirrors the SQL `ON CONFLICT` semantics exactly: create seeds
/// every column, update touches only the engine-owned triple.
#[derive(Default)]
struct InMemoryProfileStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
    profiles: Mutex<HashMap<Uuid, FinancialProfile>>,
    trust_scores: Mutex<HashMap<Uuid, TrustScore>>,
    groups: Mutex<HashMap<Uuid, GroupOverview>>,
    fail_writes: AtomicBool,
}

impl InMemoryProfileStore {
    fn insert_user(&self, user_id: Uuid, name: &str) {
        self.users.lock().unwrap().insert(
            user_id,
            UserRecord {
                id: user_id,
                name: name.to_string(),
            },
        );
    }

    fn insert_profile(&self, profile: FinancialProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.user_id, profile);
    }

    fn trust_score(&self, user_id: Uuid) -> Option<TrustScore> {
        self.trust_scores.lock().unwrap().get(&user_id).cloned()
    }

    fn fail_next_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<FinancialProfile>, AppError> {
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn find_profiles_bulk(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<MemberProfile>, AppError> {
        let users = self.users.lock().unwrap();
        let profiles = self.profiles.lock().unwrap();

        // Deliberately return members in REVERSE input order: the
        // orchestrator must reorder by input index.
        let mut members: Vec<MemberProfile> = user_ids
            .iter()
            .filter_map(|id| {
                let user = users.get(id)?;
                let profile = profiles.get(id)?;
                Some(MemberProfile {
                    user_id: *id,
                    user_name: user.name.clone(),
                    profile: profile.clone(),
                })
            })
            .collect();
        members.reverse();

        Ok(members)
    }

    async fn upsert_trust_score(
        &self,
        user_id: Uuid,
        update: &TrustScoreUpsert,
    ) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(sqlx::Error::PoolClosed));
        }

        let mut scores = self.trust_scores.lock().unwrap();
        match scores.get_mut(&user_id) {
            Some(existing) => {
                // Update path: score, financial stability, economic
                // activity, updated_at. Nothing else.
                existing.score = f64::from(update.score);
                existing.financial_stability = update.financial_stability;
                existing.economic_activity = update.economic_activity;
                existing.updated_at = Utc::now();
            }
            None => {
                let now = Utc::now();
                scores.insert(
                    user_id,
                    TrustScore {
                        user_id,
                        score: f64::from(update.score),
                        financial_stability: update.financial_stability,
                        economic_activity: update.economic_activity,
                        community_participation: update.community_participation,
                        payment_history: 0.0,
                        community_trust: update.community_trust,
                        identity_verification: 0.0,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }

        Ok(())
    }

    async fn find_trust_score(&self, user_id: Uuid) -> Result<Option<TrustScore>, AppError> {
        Ok(self.trust_scores.lock().unwrap().get(&user_id).cloned())
    }

    async fn find_group_overview(
        &self,
        group_id: Uuid,
    ) -> Result<Option<GroupOverview>, AppError> {
        Ok(self.groups.lock().unwrap().get(&group_id).cloned())
    }
}

fn service_with_store() -> (ScoringService, Arc<InMemoryProfileStore>) {
    let store = Arc::new(InMemoryProfileStore::default());
    let service = ScoringService::new(store.clone());
    (service, store)
}

/// Weighted 95.5 -> score 96, LOW.
fn strong_profile(user_id: Uuid) -> FinancialProfile {
    FinancialProfile {
        user_id,
        monthly_income: 6000.0,
        housing_expense: 1000.0,
        property_value: 120_000.0,
        savings_value: 5000.0,
        business_type: "shop".to_string(),
        business_registration: true,
        community_role: "treasurer".to_string(),
        social_connections: "strong".to_string(),
        bank_account: "acct-001".to_string(),
        ..FinancialProfile::default()
    }
}

/// Weighted 61.5 -> score 62, MEDIUM.
fn middling_profile(user_id: Uuid) -> FinancialProfile {
    FinancialProfile {
        user_id,
        monthly_income: 6000.0,
        housing_expense: 1500.0,
        property_value: 3000.0,
        bank_account: "acct-002".to_string(),
        ..FinancialProfile::default()
    }
}

/// Weighted 3.0 -> score 3, HIGH.
fn empty_profile(user_id: Uuid) -> FinancialProfile {
    FinancialProfile {
        user_id,
        ..FinancialProfile::default()
    }
}

// ---------------------------------------------------------------------------
// Individual pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scoring_unknown_user_fails_with_profile_not_found() {
    let (service, _store) = service_with_store();

    let err = service.score_individual(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::ProfileNotFound(_)));
}

#[tokio::test]
async fn scoring_user_without_profile_fails_distinctly() {
    let (service, store) = service_with_store();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id, "Amina");

    let err = service.score_individual(user_id).await.unwrap_err();
    // Distinct from ProfileNotFound so the caller can redirect to profile
    // completion.
    assert!(matches!(err, AppError::FinancialProfileMissing(_)));
}

#[tokio::test]
async fn first_scoring_creates_trust_score_with_seeded_defaults() {
    let (service, store) = service_with_store();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id, "Amina");
    store.insert_profile(strong_profile(user_id));

    let result = service.score_individual(user_id).await.unwrap();
    assert_eq!(result.user_name, "Amina");
    assert_eq!(result.result.score, 96);
    assert_eq!(result.result.risk_level, RiskLevel::Low);

    let trust = store.trust_score(user_id).expect("trust score created");
    assert_eq!(trust.score, 96.0);
    assert_eq!(trust.financial_stability, 100.0);
    assert_eq!(trust.economic_activity, 80.0);
    assert_eq!(trust.community_participation, 90.0);
    assert_eq!(trust.community_trust, 90.0);
    // Owned by other collaborators; only seeded here.
    assert_eq!(trust.payment_history, 0.0);
    assert_eq!(trust.identity_verification, 0.0);
}

#[tokio::test]
async fn rescoring_updates_only_engine_owned_fields() {
    let (service, store) = service_with_store();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id, "Amina");
    store.insert_profile(strong_profile(user_id));

    service.score_individual(user_id).await.unwrap();

    // Simulate a payment-tracking collaborator writing its own field.
    {
        let mut scores = store.trust_scores.lock().unwrap();
        scores.get_mut(&user_id).unwrap().payment_history = 55.0;
    }

    // Profile changes: community role dropped, business deregistered.
    let mut changed = strong_profile(user_id);
    changed.community_role = String::new();
    changed.social_connections = String::new();
    changed.business_registration = false;
    store.insert_profile(changed);

    let second = service.score_individual(user_id).await.unwrap();
    assert_ne!(second.result.score, 96);

    let trust = store.trust_score(user_id).unwrap();
    // Engine-owned triple follows the new computation...
    assert_eq!(trust.score, f64::from(second.result.score));
    assert_eq!(trust.economic_activity, 60.0);
    // ...but community fields keep their create-time values, and the
    // collaborator-owned field is untouched.
    assert_eq!(trust.community_participation, 90.0);
    assert_eq!(trust.community_trust, 90.0);
    assert_eq!(trust.payment_history, 55.0);
    assert_eq!(trust.identity_verification, 0.0);
}

#[tokio::test]
async fn rescoring_unchanged_profile_is_idempotent() {
    let (service, store) = service_with_store();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id, "Amina");
    store.insert_profile(middling_profile(user_id));

    let first = service.score_individual(user_id).await.unwrap();
    let second = service.score_individual(user_id).await.unwrap();

    assert_eq!(first.result.score, second.result.score);
    assert_eq!(first.result.factors, second.result.factors);
    assert_eq!(first.result.recommendations, second.result.recommendations);
}

#[tokio::test]
async fn persistence_failure_fails_the_whole_call() {
    let (service, store) = service_with_store();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id, "Amina");
    store.insert_profile(strong_profile(user_id));
    store.fail_next_writes();

    let err = service.score_individual(user_id).await.unwrap_err();
    // The computed score is never returned when the upsert fails.
    assert!(matches!(err, AppError::WithContext { .. }));
    assert!(store.trust_score(user_id).is_none());
}

// ---------------------------------------------------------------------------
// Group pipeline
// ---------------------------------------------------------------------------

fn seeded_group(store: &InMemoryProfileStore) -> (Uuid, Uuid, Uuid) {
    let low_risk = Uuid::new_v4();
    let medium_risk = Uuid::new_v4();
    let high_risk = Uuid::new_v4();

    store.insert_user(low_risk, "Amina");
    store.insert_user(medium_risk, "Bakari");
    store.insert_user(high_risk, "Chiku");

    store.insert_profile(strong_profile(low_risk));
    store.insert_profile(middling_profile(medium_risk));
    store.insert_profile(empty_profile(high_risk));

    (low_risk, medium_risk, high_risk)
}

#[tokio::test]
async fn empty_user_id_list_is_invalid_input() {
    let (service, _store) = service_with_store();

    let err = service.score_group(&[]).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn group_results_preserve_input_order() {
    let (service, store) = service_with_store();
    let (u1, u2, u3) = seeded_group(&store);

    // The in-memory store returns members in reverse order on purpose.
    let result = service.score_group(&[u3, u1, u2]).await.unwrap();

    let order: Vec<Uuid> = result
        .individual_results
        .iter()
        .map(|r| r.user_id)
        .collect();
    assert_eq!(order, vec![u3, u1, u2]);
}

#[tokio::test]
async fn group_mean_and_distribution() {
    let (service, store) = service_with_store();
    let (low, medium, high) = seeded_group(&store);

    let result = service.score_group(&[low, medium, high]).await.unwrap();

    assert_eq!(result.individual_results.len(), 3);
    let scores: Vec<i32> = result
        .individual_results
        .iter()
        .map(|r| r.result.score)
        .collect();
    assert_eq!(scores, vec![96, 62, 3]);

    // round((96 + 62 + 3) / 3) = round(53.67) = 54
    assert_eq!(result.group_score, 54);
    assert_eq!(result.group_risk_distribution.low, 1);
    assert_eq!(result.group_risk_distribution.medium, 1);
    assert_eq!(result.group_risk_distribution.high, 1);

    assert_eq!(result.group_recommendations.len(), 3);
    assert_eq!(
        result.group_recommendations[0],
        "Group average credit score: 54"
    );
    assert_eq!(
        result.group_recommendations[1],
        "Risk distribution: 1 low risk, 1 medium risk, 1 high risk members"
    );
    assert_eq!(
        result.group_recommendations[2],
        "This group may benefit from financial literacy programs and support"
    );
}

#[tokio::test]
async fn group_narrative_tiers_follow_rounded_group_score() {
    let (service, store) = service_with_store();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    store.insert_user(a, "Amina");
    store.insert_user(b, "Bakari");
    store.insert_profile(strong_profile(a));
    store.insert_profile(strong_profile(b));

    let result = service.score_group(&[a, b]).await.unwrap();
    assert_eq!(result.group_score, 96);
    assert_eq!(
        result.group_recommendations[2],
        "This group shows strong collective financial health"
    );
}

#[tokio::test]
async fn unresolvable_members_are_dropped_silently() {
    let (service, store) = service_with_store();
    let valid = Uuid::new_v4();
    store.insert_user(valid, "Amina");
    store.insert_profile(strong_profile(valid));

    let nonexistent = Uuid::new_v4();
    let result = service.score_group(&[valid, nonexistent]).await.unwrap();

    assert_eq!(result.individual_results.len(), 1);
    assert_eq!(result.individual_results[0].user_id, valid);
    assert_eq!(result.group_score, 96);
}

#[tokio::test]
async fn group_with_no_resolvable_members_returns_defined_empty_result() {
    let (service, _store) = service_with_store();

    let result = service
        .score_group(&[Uuid::new_v4(), Uuid::new_v4()])
        .await
        .unwrap();

    assert_eq!(result.group_score, 0);
    assert!(result.individual_results.is_empty());
    assert_eq!(result.group_risk_distribution.low, 0);
    assert_eq!(result.group_risk_distribution.medium, 0);
    assert_eq!(result.group_risk_distribution.high, 0);
    assert_eq!(
        result.group_recommendations,
        vec!["No group members with completed financial profiles were found".to_string()]
    );
}

#[tokio::test]
async fn group_scoring_persists_nothing() {
    let (service, store) = service_with_store();
    let (low, medium, high) = seeded_group(&store);

    service.score_group(&[low, medium, high]).await.unwrap();

    assert!(store.trust_score(low).is_none());
    assert!(store.trust_score(medium).is_none());
    assert!(store.trust_score(high).is_none());
}

// ---------------------------------------------------------------------------
// Financial summary read path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_summary_projects_persisted_state() {
    let (service, store) = service_with_store();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id, "Amina");
    store.insert_profile(strong_profile(user_id));
    service.score_individual(user_id).await.unwrap();

    let summary = service.user_financial_summary(user_id).await.unwrap();
    assert_eq!(summary.user_id, user_id);
    assert!(summary.financial_profile.is_some());
    assert_eq!(summary.trust_score.unwrap().score, 96.0);
}

#[tokio::test]
async fn user_summary_for_unknown_user_fails() {
    let (service, _store) = service_with_store();

    let err = service
        .user_financial_summary(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProfileNotFound(_)));
}

#[tokio::test]
async fn group_summary_aggregates_members() {
    let (service, store) = service_with_store();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let group_id = Uuid::new_v4();

    store.groups.lock().unwrap().insert(
        group_id,
        GroupOverview {
            group_id,
            group_name: "Umoja Savings Circle".to_string(),
            balance_pool: 1200.0,
            members: vec![
                GroupMemberFinancials {
                    user_id: a,
                    trust_score: Some(80.0),
                    profile: Some(strong_profile(a)),
                },
                GroupMemberFinancials {
                    user_id: b,
                    trust_score: None,
                    profile: None,
                },
            ],
        },
    );

    let summary = service.group_financial_summary(group_id).await.unwrap();
    assert_eq!(summary.group_name, "Umoja Savings Circle");
    assert_eq!(summary.member_count, 2);
    // Members without a trust score count as 0 toward the average.
    assert_eq!(summary.average_score, 40.0);
    // 120000 property + 5000 savings from the one profile present.
    assert_eq!(summary.total_assets, 125_000.0);
    assert_eq!(summary.balance_pool, 1200.0);
}

#[tokio::test]
async fn group_summary_with_no_members_guards_division() {
    let (service, store) = service_with_store();
    let group_id = Uuid::new_v4();

    store.groups.lock().unwrap().insert(
        group_id,
        GroupOverview {
            group_id,
            group_name: "Empty Circle".to_string(),
            balance_pool: 0.0,
            members: vec![],
        },
    );

    let summary = service.group_financial_summary(group_id).await.unwrap();
    assert_eq!(summary.member_count, 0);
    assert_eq!(summary.average_score, 0.0);
    assert_eq!(summary.total_assets, 0.0);
}

#[tokio::test]
async fn group_summary_for_unknown_group_fails() {
    let (service, _store) = service_with_store();

    let err = service
        .group_financial_summary(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProfileNotFound(_)));
}
