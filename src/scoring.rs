/// Deterministic credit scoring core.
///
/// Seven pure factor calculators, each turning one slice of a financial
/// profile into a sub-score, combined by a fixed-weight aggregator into a
/// composite score, a risk tier, and a recommendation list. Everything in
/// this module is side-effect free; missing data never fails a calculation,
/// it floors the sub-score and emits a recommendation instead.
use crate::models::{CreditFactors, CreditScoreResult, FinancialProfile, RiskLevel};

/// Aggregation weights in calculator order. Must sum to exactly 1.0.
pub const WEIGHTS: [f64; 7] = [0.25, 0.20, 0.15, 0.10, 0.15, 0.10, 0.05];

pub const REC_DIVERSIFY_INCOME: &str =
    "Consider diversifying income sources to reduce seasonal dependency";
pub const REC_PROVIDE_INCOME: &str =
    "Please provide monthly income information for better credit assessment";
pub const REC_REDUCE_EXPENSES: &str =
    "Consider reducing monthly expenses to improve financial stability";
pub const REC_BUILD_ASSETS: &str = "Building assets can significantly improve your credit profile";
pub const REC_SAVE_INCOME: &str = "Try to save at least 10% of your monthly income";
pub const REC_START_BUSINESS: &str =
    "Consider starting a small business to improve your economic profile";
pub const REC_COMMUNITY: &str = "Active community participation can enhance your credit profile";
pub const REC_BANK_ACCOUNT: &str = "Having a bank account demonstrates financial responsibility";

/// Income stability (weight 25%).
///
/// Tiered on monthly income, dampened by 0.8 after tiering when income is
/// seasonal. An absent income floors the factor at 0.
fn income_stability(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    if !profile.has_income() {
        return (0.0, Some(REC_PROVIDE_INCOME));
    }

    let mut score = if profile.monthly_income > 5000.0 {
        100.0
    } else if profile.monthly_income > 2000.0 {
        80.0
    } else if profile.monthly_income > 1000.0 {
        60.0
    } else {
        40.0
    };

    if profile.seasonal_income {
        score *= 0.8;
        return (score, Some(REC_DIVERSIFY_INCOME));
    }

    (score, None)
}

/// Debt-to-income ratio (weight 20%).
///
/// Only computed when income is present and total expenses are positive;
/// otherwise the factor stays at 0 without a recommendation.
fn debt_to_income_ratio(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    let total_expenses = profile.total_expenses();
    if !profile.has_income() || total_expenses <= 0.0 {
        return (0.0, None);
    }

    let ratio = total_expenses / profile.monthly_income;
    let score = if ratio < 0.3 {
        100.0
    } else if ratio < 0.5 {
        80.0
    } else if ratio < 0.7 {
        60.0
    } else {
        30.0
    };

    let recommendation = if ratio > 0.6 {
        Some(REC_REDUCE_EXPENSES)
    } else {
        None
    };

    (score, recommendation)
}

/// Asset value (weight 15%). Always computed; the floor tier is 20.
fn asset_value(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    let total_assets = profile.total_assets();
    let score = if total_assets > 100_000.0 {
        100.0
    } else if total_assets > 50_000.0 {
        80.0
    } else if total_assets > 20_000.0 {
        60.0
    } else if total_assets > 5_000.0 {
        40.0
    } else {
        20.0
    };

    let recommendation = if total_assets < 10_000.0 {
        Some(REC_BUILD_ASSETS)
    } else {
        None
    };

    (score, recommendation)
}

/// Expense management (weight 10%). Same precondition as the debt ratio.
fn expense_management(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    let total_expenses = profile.total_expenses();
    if !profile.has_income() || total_expenses <= 0.0 {
        return (0.0, None);
    }

    let savings_rate = (profile.monthly_income - total_expenses) / profile.monthly_income;
    let score = if savings_rate > 0.3 {
        100.0
    } else if savings_rate > 0.2 {
        80.0
    } else if savings_rate > 0.1 {
        60.0
    } else if savings_rate > 0.0 {
        40.0
    } else {
        20.0
    };

    let recommendation = if savings_rate < 0.1 {
        Some(REC_SAVE_INCOME)
    } else {
        None
    };

    (score, recommendation)
}

/// Business activity (weight 15%).
///
/// Base 60 for any declared business, raised to 80 when registered. Farm
/// ownership ADDS 20 on top of either base rather than overwriting it, and
/// the result is intentionally not clamped here (max reachable is 100 with
/// the current constants).
fn business_activity(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    if !profile.has_business() {
        return (0.0, Some(REC_START_BUSINESS));
    }

    let mut score = 60.0;
    if profile.business_registration {
        score = 80.0;
    }
    if profile.farm_ownership {
        score += 20.0;
    }

    (score, None)
}

/// Community engagement (weight 10%).
///
/// Unlike business activity, strong social connections OVERWRITE the base
/// score instead of adding to it.
fn community_engagement(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    if !profile.has_community_role() {
        return (0.0, Some(REC_COMMUNITY));
    }

    let score = if profile.social_connections == "strong" {
        90.0
    } else {
        70.0
    };

    (score, None)
}

/// Financial discipline (weight 5%). Positive savings overwrite the base.
fn financial_discipline(profile: &FinancialProfile) -> (f64, Option<&'static str>) {
    if !profile.has_bank_account() {
        return (0.0, Some(REC_BANK_ACCOUNT));
    }

    let score = if profile.savings_value > 0.0 { 90.0 } else { 70.0 };

    (score, None)
}

/// Risk tier from the UNROUNDED weighted score.
pub fn risk_level(weighted_score: f64) -> RiskLevel {
    if weighted_score >= 80.0 {
        RiskLevel::Low
    } else if weighted_score >= 60.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Weighted composite of the seven sub-scores.
pub fn weighted_score(factors: &CreditFactors) -> f64 {
    factors.income_stability * WEIGHTS[0]
        + factors.debt_to_income_ratio * WEIGHTS[1]
        + factors.asset_value * WEIGHTS[2]
        + factors.expense_management * WEIGHTS[3]
        + factors.business_activity * WEIGHTS[4]
        + factors.community_engagement * WEIGHTS[5]
        + factors.financial_discipline * WEIGHTS[6]
}

/// Run all seven calculators and the aggregator for one profile.
///
/// All calculators always run; recommendations are concatenated in
/// calculator order without deduplication. The risk tier is taken from the
/// unrounded weighted score, while the returned integer score is the
/// rounded (half-up) composite, clamped to [0, 100].
pub fn calculate_credit_score(profile: &FinancialProfile) -> CreditScoreResult {
    let mut recommendations = Vec::new();

    let calculators: [fn(&FinancialProfile) -> (f64, Option<&'static str>); 7] = [
        income_stability,
        debt_to_income_ratio,
        asset_value,
        expense_management,
        business_activity,
        community_engagement,
        financial_discipline,
    ];

    let mut scores = [0.0f64; 7];
    for (slot, calculator) in scores.iter_mut().zip(calculators.iter()) {
        let (score, recommendation) = calculator(profile);
        *slot = score;
        if let Some(text) = recommendation {
            recommendations.push(text.to_string());
        }
    }

    let factors = CreditFactors {
        income_stability: scores[0],
        debt_to_income_ratio: scores[1],
        asset_value: scores[2],
        expense_management: scores[3],
        business_activity: scores[4],
        community_engagement: scores[5],
        financial_discipline: scores[6],
    };

    let weighted = weighted_score(&factors);

    CreditScoreResult {
        score: (weighted.round() as i32).clamp(0, 100),
        factors,
        recommendations,
        risk_level: risk_level(weighted),
    }
}
