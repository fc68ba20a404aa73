use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Risk classification derived from the unrounded weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Lenient amount deserializer applied once at the input boundary.
///
/// Profile records originate from loosely-typed form submissions, so a
/// numeric field may arrive as a JSON number, a numeric string, or be
/// absent entirely. Coercion rules: absent or non-numeric => 0.0.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Empty-string-as-absent deserializer for optional text fields.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// A user's self-reported financial profile.
///
/// Owned by the profile store; the engine only reads it. All numeric fields
/// default to 0 and all text fields to "" so the calculators never have to
/// handle missing data themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub user_id: Uuid,

    // Income
    #[serde(default, deserialize_with = "lenient_amount")]
    pub monthly_income: f64,
    #[serde(default)]
    pub seasonal_income: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub income_source: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub income_variation: String,

    // Monthly expenses
    #[serde(default, deserialize_with = "lenient_amount")]
    pub housing_expense: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub food_expense: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub transportation_expense: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub utilities_expense: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub healthcare_expense: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub education_expense: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub other_expenses: f64,

    // Assets
    #[serde(default, deserialize_with = "lenient_amount")]
    pub property_value: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub vehicles_value: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub livestock_value: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub equipment_value: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub savings_value: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub other_assets_value: f64,

    // Business
    #[serde(default, deserialize_with = "lenient_text")]
    pub business_type: String,
    #[serde(default)]
    pub business_registration: bool,
    #[serde(default)]
    pub farm_ownership: bool,

    // Community & banking
    #[serde(default, deserialize_with = "lenient_text")]
    pub community_role: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub social_connections: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub bank_account: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub existing_debts: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub spending_patterns: String,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FinancialProfile {
    /// Sum of the seven monthly expense fields.
    pub fn total_expenses(&self) -> f64 {
        self.housing_expense
            + self.food_expense
            + self.transportation_expense
            + self.utilities_expense
            + self.healthcare_expense
            + self.education_expense
            + self.other_expenses
    }

    /// Sum of the six asset fields.
    pub fn total_assets(&self) -> f64 {
        self.property_value
            + self.vehicles_value
            + self.livestock_value
            + self.equipment_value
            + self.savings_value
            + self.other_assets_value
    }

    pub fn has_income(&self) -> bool {
        self.monthly_income > 0.0
    }

    pub fn has_business(&self) -> bool {
        !self.business_type.is_empty()
    }

    pub fn has_community_role(&self) -> bool {
        !self.community_role.is_empty()
    }

    pub fn has_bank_account(&self) -> bool {
        !self.bank_account.is_empty()
    }
}

/// The seven factor sub-scores, each nominally in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditFactors {
    pub income_stability: f64,
    pub debt_to_income_ratio: f64,
    pub asset_value: f64,
    pub expense_management: f64,
    pub business_activity: f64,
    pub community_engagement: f64,
    pub financial_discipline: f64,
}

/// Output of the scoring core for one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditScoreResult {
    /// Rounded weighted composite in [0, 100].
    pub score: i32,
    pub factors: CreditFactors,
    /// Human-readable guidance, in calculator order. May be empty.
    pub recommendations: Vec<String>,
    pub risk_level: RiskLevel,
}

/// Individual scoring response: the in-memory result annotated with the
/// user's identity and a computation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualScore {
    pub user_id: Uuid,
    pub user_name: String,
    #[serde(flatten)]
    pub result: CreditScoreResult,
    pub calculated_at: DateTime<Utc>,
}

/// Member counts per risk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
}

impl RiskDistribution {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }
}

/// Cohort scoring output. Purely derived; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupScoreResult {
    pub group_score: i32,
    pub group_risk_distribution: RiskDistribution,
    pub group_recommendations: Vec<String>,
    pub individual_results: Vec<IndividualScore>,
    pub calculated_at: DateTime<Utc>,
}

/// Persisted trust score, keyed by user id (one row per user).
///
/// `payment_history` and `identity_verification` are owned by other
/// collaborators: this engine seeds them to 0 on create and never writes
/// them again.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrustScore {
    pub user_id: Uuid,
    pub score: f64,
    pub financial_stability: f64,
    pub economic_activity: f64,
    pub community_participation: f64,
    pub payment_history: f64,
    pub community_trust: f64,
    pub identity_verification: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Engine-owned fields written to the trust score row.
///
/// `community_participation` and `community_trust` are only applied on the
/// create path; the update path writes score, financial stability, and
/// economic activity exclusively.
#[derive(Debug, Clone, Copy)]
pub struct TrustScoreUpsert {
    pub score: i32,
    pub financial_stability: f64,
    pub economic_activity: f64,
    pub community_participation: f64,
    pub community_trust: f64,
}

/// Minimal identity projection of a stored user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
}

/// One cohort member as resolved by the bulk profile lookup.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub user_name: String,
    pub profile: FinancialProfile,
}

/// A cohort member's persisted financial state, for the summary read path.
#[derive(Debug, Clone)]
pub struct GroupMemberFinancials {
    pub user_id: Uuid,
    pub trust_score: Option<f64>,
    pub profile: Option<FinancialProfile>,
}

/// A cooperative and its members' persisted financial state.
#[derive(Debug, Clone)]
pub struct GroupOverview {
    pub group_id: Uuid,
    pub group_name: String,
    pub balance_pool: f64,
    pub members: Vec<GroupMemberFinancials>,
}

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// POST /api/v1/credit/score body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    /// Target user; defaults to the authenticated caller.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// POST /api/v1/credit/score/group body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupScoreRequest {
    #[serde(default)]
    pub user_ids: Option<Vec<Uuid>>,
}

/// GET /api/v1/credit/summary query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

/// Read-only projection of a user's last persisted financial state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFinancialSummary {
    pub user_id: Uuid,
    pub financial_profile: Option<FinancialProfile>,
    pub trust_score: Option<TrustScore>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregate summary over a cooperative's members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFinancialSummary {
    pub group_id: Uuid,
    pub group_name: String,
    pub member_count: usize,
    pub average_score: f64,
    pub total_assets: f64,
    pub balance_pool: f64,
}
