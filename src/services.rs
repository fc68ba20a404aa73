/// Scoring orchestrators.
///
/// The individual pipeline loads one profile, runs the pure scoring core,
/// and persists the result with an atomic upsert. The group pipeline runs
/// the pure core for every resolvable member of a cohort and folds the
/// results into cohort statistics, persisting nothing.
use crate::errors::{AppError, ResultExt};
use crate::models::{
    GroupFinancialSummary, GroupScoreResult, IndividualScore, MemberProfile, RiskDistribution,
    TrustScoreUpsert, UserFinancialSummary,
};
use crate::scoring::calculate_credit_score;
use crate::store::ProfileStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const NO_RESOLVABLE_MEMBERS: &str =
    "No group members with completed financial profiles were found";

pub struct ScoringService {
    store: Arc<dyn ProfileStore>,
}

impl ScoringService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Score one user and persist the outcome.
    ///
    /// Fails with `ProfileNotFound` when the user record does not exist and
    /// with `FinancialProfileMissing` when the user has never submitted a
    /// financial profile. A failed upsert fails the whole call; the engine
    /// never returns a score it could not persist.
    pub async fn score_individual(&self, target_user_id: Uuid) -> Result<IndividualScore, AppError> {
        let user = self
            .store
            .find_user(target_user_id)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound("User not found".to_string()))?;

        let profile = self.store.find_profile(target_user_id).await?.ok_or_else(|| {
            AppError::FinancialProfileMissing(
                "Financial profile not found. Please complete your financial profile first."
                    .to_string(),
            )
        })?;

        let result = calculate_credit_score(&profile);

        tracing::debug!(
            user_id = %user.id,
            score = result.score,
            risk_level = %result.risk_level,
            "credit score computed"
        );

        let upsert = TrustScoreUpsert {
            score: result.score,
            financial_stability: result.factors.income_stability,
            economic_activity: result.factors.business_activity,
            community_participation: result.factors.community_engagement,
            community_trust: result.factors.community_engagement,
        };

        self.store
            .upsert_trust_score(user.id, &upsert)
            .await
            .context("persisting trust score")?;

        Ok(IndividualScore {
            user_id: user.id,
            user_name: user.name,
            result,
            calculated_at: Utc::now(),
        })
    }

    /// Score a cohort of users without persisting anything.
    ///
    /// Members whose profiles cannot be resolved are dropped silently.
    /// Result ordering follows the input id order, never completion order.
    pub async fn score_group(&self, user_ids: &[Uuid]) -> Result<GroupScoreResult, AppError> {
        if user_ids.is_empty() {
            return Err(AppError::InvalidInput(
                "User IDs array required for group calculation".to_string(),
            ));
        }

        let members = self.store.find_profiles_bulk(user_ids).await?;
        let mut members_by_id: HashMap<Uuid, MemberProfile> = members
            .into_iter()
            .map(|member| (member.user_id, member))
            .collect();

        let calculated_at = Utc::now();
        let mut individual_results = Vec::with_capacity(user_ids.len());
        let mut distribution = RiskDistribution::default();
        let mut score_sum: i64 = 0;

        for user_id in user_ids {
            let Some(member) = members_by_id.remove(user_id) else {
                tracing::debug!(user_id = %user_id, "skipping unresolvable group member");
                continue;
            };

            let result = calculate_credit_score(&member.profile);
            distribution.record(result.risk_level);
            score_sum += i64::from(result.score);

            individual_results.push(IndividualScore {
                user_id: member.user_id,
                user_name: member.user_name,
                result,
                calculated_at,
            });
        }

        // A cohort where nobody has a profile is not an error: return a
        // well-defined empty result instead of dividing by zero.
        if individual_results.is_empty() {
            return Ok(GroupScoreResult {
                group_score: 0,
                group_risk_distribution: RiskDistribution::default(),
                group_recommendations: vec![NO_RESOLVABLE_MEMBERS.to_string()],
                individual_results,
                calculated_at,
            });
        }

        let group_score =
            (score_sum as f64 / individual_results.len() as f64).round() as i32;

        // Narrative thresholds apply to the ROUNDED group score, unlike
        // individual risk tiering which uses the unrounded weighted score.
        let narrative = if group_score > 75 {
            "This group shows strong collective financial health"
        } else if group_score > 60 {
            "This group has moderate financial stability with room for improvement"
        } else {
            "This group may benefit from financial literacy programs and support"
        };

        let group_recommendations = vec![
            format!("Group average credit score: {}", group_score),
            format!(
                "Risk distribution: {} low risk, {} medium risk, {} high risk members",
                distribution.low, distribution.medium, distribution.high
            ),
            narrative.to_string(),
        ];

        tracing::info!(
            members = individual_results.len(),
            group_score,
            "group scoring complete"
        );

        Ok(GroupScoreResult {
            group_score,
            group_risk_distribution: distribution,
            group_recommendations,
            individual_results,
            calculated_at,
        })
    }

    /// Read-only projection of a user's last persisted financial state.
    pub async fn user_financial_summary(
        &self,
        user_id: Uuid,
    ) -> Result<UserFinancialSummary, AppError> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound("User not found".to_string()))?;

        let financial_profile = self.store.find_profile(user.id).await?;
        let trust_score = self.store.find_trust_score(user.id).await?;
        let last_updated = financial_profile.as_ref().and_then(|p| p.updated_at);

        Ok(UserFinancialSummary {
            user_id: user.id,
            financial_profile,
            trust_score,
            last_updated,
        })
    }

    /// Aggregate summary over a cooperative's members, computed from the
    /// persisted trust scores rather than a fresh scoring run.
    pub async fn group_financial_summary(
        &self,
        group_id: Uuid,
    ) -> Result<GroupFinancialSummary, AppError> {
        let overview = self
            .store
            .find_group_overview(group_id)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound("Group not found".to_string()))?;

        let member_count = overview.members.len();
        let average_score = if member_count == 0 {
            0.0
        } else {
            overview
                .members
                .iter()
                .map(|m| m.trust_score.unwrap_or(0.0))
                .sum::<f64>()
                / member_count as f64
        };

        let total_assets = overview
            .members
            .iter()
            .filter_map(|m| m.profile.as_ref())
            .map(|p| p.total_assets())
            .sum();

        Ok(GroupFinancialSummary {
            group_id: overview.group_id,
            group_name: overview.group_name,
            member_count,
            average_score,
            total_assets,
            balance_pool: overview.balance_pool,
        })
    }
}
