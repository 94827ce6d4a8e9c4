use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{BoundaryRule, CancellationPolicy, FeeRate, FeeTier};

const SECONDS_PER_HOUR: i64 = 3600;
const FULL_BPS: u32 = 10_000;

/// Fee owed for cancelling at `cancelled_at` a booking that starts at
/// `scheduled_at`, under `policy`. Always within `[0, price_cents]`.
pub fn compute_cancellation_fee(
    policy: &CancellationPolicy,
    price_cents: i64,
    scheduled_at: DateTime<Utc>,
    cancelled_at: DateTime<Utc>,
) -> i64 {
    let notice_secs = (scheduled_at - cancelled_at).num_seconds();
    let rate = select_rate(policy, notice_secs);
    apply_rate(rate, price_cents)
}

fn select_rate(policy: &CancellationPolicy, notice_secs: i64) -> FeeRate {
    if notice_secs < 0 {
        if let Some(rate) = policy.after_start {
            return rate;
        }
        return least_notice_tier(&policy.tiers)
            .map(|t| t.rate)
            .unwrap_or(FeeRate::FREE);
    }

    let matched = policy.tiers.iter().find(|tier| {
        let lower = tier.min_hours as i64 * SECONDS_PER_HOUR;
        let upper = tier.max_hours.map(|h| h as i64 * SECONDS_PER_HOUR);
        match policy.boundary {
            BoundaryRule::ClientFavorable => {
                notice_secs >= lower && upper.map_or(true, |u| notice_secs < u)
            }
            BoundaryRule::ProviderFavorable => {
                (notice_secs > lower || (lower == 0 && notice_secs == 0))
                    && upper.map_or(true, |u| notice_secs <= u)
            }
        }
    });

    match matched {
        Some(tier) => tier.rate,
        None => {
            tracing::warn!(policy_id = %policy.id, notice_secs, "no tier matched; policy has a gap");
            least_notice_tier(&policy.tiers)
                .map(|t| t.rate)
                .unwrap_or(FeeRate::FREE)
        }
    }
}

fn least_notice_tier(tiers: &[FeeTier]) -> Option<&FeeTier> {
    tiers.iter().min_by_key(|t| t.min_hours)
}

/// `min(price, fixed + price * pct)`, percentage rounded half up to the cent.
fn apply_rate(rate: FeeRate, price_cents: i64) -> i64 {
    let price = price_cents.max(0);
    let percent_part =
        (price as i128 * rate.percent_bps as i128 + (FULL_BPS / 2) as i128) / FULL_BPS as i128;
    let fee = rate.fixed_cents.max(0) as i128 + percent_part;
    fee.clamp(0, price as i128) as i64
}

/// Checks that tiers partition `[0, ∞)` hours with no gaps or overlaps and that
/// the fee never drops as notice shrinks.
pub fn validate_tiers(tiers: &[FeeTier], after_start: Option<FeeRate>) -> Result<(), AppError> {
    let invalid = |msg: String| -> Result<(), AppError> { Err(AppError::Validation(msg)) };

    if tiers.is_empty() {
        return invalid("policy needs at least one tier".to_string());
    }

    for tier in tiers {
        if tier.rate.percent_bps > FULL_BPS {
            return invalid(format!(
                "tier starting at {}h charges more than 100%",
                tier.min_hours
            ));
        }
        if tier.rate.fixed_cents < 0 {
            return invalid(format!("tier starting at {}h has a negative fee", tier.min_hours));
        }
        if let Some(max) = tier.max_hours {
            if max <= tier.min_hours {
                return invalid(format!("tier {}h-{}h is empty", tier.min_hours, max));
            }
        }
    }

    let mut sorted: Vec<&FeeTier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.min_hours);

    if sorted[0].min_hours != 0 {
        return invalid(format!(
            "tiers must start at 0h, first starts at {}h",
            sorted[0].min_hours
        ));
    }

    for pair in sorted.windows(2) {
        let (less_notice, more_notice) = (pair[0], pair[1]);
        match less_notice.max_hours {
            None => {
                return invalid(format!(
                    "unbounded tier at {}h overlaps tier at {}h",
                    less_notice.min_hours, more_notice.min_hours
                ))
            }
            Some(max) if max != more_notice.min_hours => {
                return invalid(format!(
                    "tiers leave a gap or overlap between {max}h and {}h",
                    more_notice.min_hours
                ))
            }
            Some(_) => {}
        }
        if more_notice.rate.percent_bps > less_notice.rate.percent_bps
            || more_notice.rate.fixed_cents > less_notice.rate.fixed_cents
        {
            return invalid(format!(
                "tier at {}h charges more than the later tier at {}h",
                more_notice.min_hours, less_notice.min_hours
            ));
        }
    }

    if let Some(last) = sorted.last() {
        if last.max_hours.is_some() {
            return invalid("the tier with the most notice must be unbounded".to_string());
        }
    }

    if let Some(rate) = after_start {
        if rate.percent_bps > FULL_BPS || rate.fixed_cents < 0 {
            return invalid("after-start fee is out of range".to_string());
        }
        let least_notice = sorted[0].rate;
        if rate.percent_bps < least_notice.percent_bps || rate.fixed_cents < least_notice.fixed_cents
        {
            return invalid(
                "after-start fee is lower than the fee for cancelling just before start"
                    .to_string(),
            );
        }
    }

    Ok(())
}
