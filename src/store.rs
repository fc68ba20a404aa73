use crate::errors::AppError;
use crate::models::{
    FinancialProfile, GroupMemberFinancials, GroupOverview, MemberProfile, TrustScore,
    TrustScoreUpsert, UserRecord,
};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence boundary of the scoring engine.
///
/// This is the only component permitted to perform I/O; orchestrators and
/// calculators are pure given their inputs. An in-memory implementation
/// backs the orchestrator tests.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Resolve a user record, or `None` when the user does not exist.
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError>;

    /// Fetch a user's financial profile, or `None` when they have never
    /// submitted one.
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<FinancialProfile>, AppError>;

    /// Bulk profile lookup for group scoring. Unresolvable ids are silently
    /// omitted; no ordering is guaranteed (callers collect by input index).
    async fn find_profiles_bulk(&self, user_ids: &[Uuid])
        -> Result<Vec<MemberProfile>, AppError>;

    /// Atomically create or update the trust score row for a user.
    ///
    /// Create seeds every column (collaborator-owned fields at 0); update
    /// overwrites ONLY score, financial stability, economic activity, and
    /// the updated-at timestamp. Must be a single atomic operation so that
    /// concurrent scoring calls for the same user cannot interleave.
    async fn upsert_trust_score(
        &self,
        user_id: Uuid,
        update: &TrustScoreUpsert,
    ) -> Result<(), AppError>;

    /// Read the persisted trust score row, if any.
    async fn find_trust_score(&self, user_id: Uuid) -> Result<Option<TrustScore>, AppError>;

    /// Resolve a cooperative and its members' persisted financial state.
    async fn find_group_overview(&self, group_id: Uuid)
        -> Result<Option<GroupOverview>, AppError>;
}

/// PostgreSQL-backed store adapter.
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MemberProfileRow {
    id: Uuid,
    name: String,
    #[sqlx(flatten)]
    profile: FinancialProfile,
}

const PROFILE_COLUMNS: &str = r#"
    fp.user_id, fp.monthly_income, fp.seasonal_income, fp.income_source,
    fp.income_variation, fp.housing_expense, fp.food_expense,
    fp.transportation_expense, fp.utilities_expense, fp.healthcare_expense,
    fp.education_expense, fp.other_expenses, fp.property_value,
    fp.vehicles_value, fp.livestock_value, fp.equipment_value,
    fp.savings_value, fp.other_assets_value, fp.business_type,
    fp.business_registration, fp.farm_ownership, fp.community_role,
    fp.social_connections, fp.bank_account, fp.existing_debts,
    fp.spending_patterns, fp.updated_at
"#;

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT id, name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<FinancialProfile>, AppError> {
        let query = format!(
            "SELECT {} FROM financial_profiles fp WHERE fp.user_id = $1",
            PROFILE_COLUMNS
        );

        let profile = sqlx::query_as::<_, FinancialProfile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn find_profiles_bulk(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<MemberProfile>, AppError> {
        let query = format!(
            r#"
            SELECT u.id, u.name, {}
            FROM financial_profiles fp
            JOIN users u ON u.id = fp.user_id
            WHERE fp.user_id = ANY($1)
            "#,
            PROFILE_COLUMNS
        );

        let rows = sqlx::query_as::<_, MemberProfileRow>(&query)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| MemberProfile {
                user_id: row.id,
                user_name: row.name,
                profile: row.profile,
            })
            .collect())
    }

    async fn upsert_trust_score(
        &self,
        user_id: Uuid,
        update: &TrustScoreUpsert,
    ) -> Result<(), AppError> {
        // Single-statement upsert: no existence-check round trip, so two
        // concurrent scoring calls for the same user cannot interleave.
        // The DO UPDATE column list is intentionally narrower than the
        // insert list: community_participation, community_trust,
        // payment_history, and identity_verification are create-only from
        // this engine's side.
        sqlx::query(
            r#"
            INSERT INTO trust_scores (
                user_id, score, financial_stability, economic_activity,
                community_participation, payment_history, community_trust,
                identity_verification, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, 0, now(), now())
            ON CONFLICT (user_id) DO UPDATE
            SET score = EXCLUDED.score,
                financial_stability = EXCLUDED.financial_stability,
                economic_activity = EXCLUDED.economic_activity,
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(f64::from(update.score))
        .bind(update.financial_stability)
        .bind(update.economic_activity)
        .bind(update.community_participation)
        .bind(update.community_trust)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_trust_score(&self, user_id: Uuid) -> Result<Option<TrustScore>, AppError> {
        let trust_score = sqlx::query_as::<_, TrustScore>(
            r#"
            SELECT user_id, score, financial_stability, economic_activity,
                   community_participation, payment_history, community_trust,
                   identity_verification, created_at, updated_at
            FROM trust_scores
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trust_score)
    }

    async fn find_group_overview(
        &self,
        group_id: Uuid,
    ) -> Result<Option<GroupOverview>, AppError> {
        // Sequential queries instead of one wide join keep the row mapping
        // simple and sqlx-friendly.
        let cooperative = sqlx::query_as::<_, (Uuid, String, f64)>(
            "SELECT id, name, balance_pool FROM cooperatives WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((group_id, group_name, balance_pool)) = cooperative else {
            return Ok(None);
        };

        let member_rows = sqlx::query_as::<_, (Uuid, Option<f64>)>(
            r#"
            SELECT u.id, ts.score
            FROM cooperative_members cm
            JOIN users u ON u.id = cm.user_id
            LEFT JOIN trust_scores ts ON ts.user_id = u.id
            WHERE cm.cooperative_id = $1
            ORDER BY cm.joined_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        let member_ids: Vec<Uuid> = member_rows.iter().map(|(id, _)| *id).collect();
        let query = format!(
            "SELECT {} FROM financial_profiles fp WHERE fp.user_id = ANY($1)",
            PROFILE_COLUMNS
        );
        let profiles = sqlx::query_as::<_, FinancialProfile>(&query)
            .bind(&member_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut profiles_by_user: std::collections::HashMap<Uuid, FinancialProfile> =
            profiles.into_iter().map(|p| (p.user_id, p)).collect();

        let members = member_rows
            .into_iter()
            .map(|(user_id, trust_score)| GroupMemberFinancials {
                user_id,
                trust_score,
                profile: profiles_by_user.remove(&user_id),
            })
            .collect();

        Ok(Some(GroupOverview {
            group_id,
            group_name,
            balance_pool,
            members,
        }))
    }
}
