//! The reward calculator: translates a matched rule event into a signed,
//! floor-truncated integer reward.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::model::{BreakdownEntry, ComputationTrace, EventInput, FactMap, FactValue, Market, RewardCategory};
use crate::rules::MatchedRuleEvent;

/// Fixed category mapping from rule-event `type` → reporting category.
/// Unmapped types fall back to `Other`.
fn category_for(calculation_type: &str) -> RewardCategory {
    match calculation_type {
        "INTERACTION_REGISTRY_POINT" => RewardCategory::Registration,
        "ORDER_BASE_POINT" => RewardCategory::BasePurchase,
        "ORDER_MULTIPLE_POINT_LIMIT" | "ORDER_MULTIPLE_POINT" => RewardCategory::TierOrProductBonus,
        "FLEXIBLE_CAMPAIGN_BONUS" | "FIRST_PURCHASE_BIRTH_MONTH_BONUS" => RewardCategory::CampaignBonus,
        "FLEXIBLE_VIP_MULTIPLIER" | "FLEXIBLE_PRODUCT_MULTIPLIER" | "FLEXIBLE_COMBO_PRODUCT_MULTIPLIER" => {
            RewardCategory::TierOrProductBonus
        }
        "FLEXIBLE_BASKET_AMOUNT" => RewardCategory::SpendingThreshold,
        "INTERACTION_ADJUST_POINT_TIMES_PER_YEAR" => RewardCategory::Recycling,
        "CONSULTATION_BONUS" => RewardCategory::Consultation,
        "INTERACTION_ADJUST_POINT_BY_MANAGER" => RewardCategory::ManualAdjustment,
        "REDEMPTION_DEDUCTION" => RewardCategory::Redemption,
        _ => RewardCategory::Other,
    }
}

fn param(params: &FactMap, key: &str) -> Option<Decimal> {
    params.get(key).and_then(FactValue::as_number)
}

fn attr(attributes: &FactMap, key: &str) -> Option<Decimal> {
    attributes.get(key).and_then(FactValue::as_number)
}

fn floor_to_i64(d: Decimal) -> i64 {
    d.floor().to_i64().unwrap_or(0)
}

fn first_of(values: &[Option<Decimal>], default: Decimal) -> Decimal {
    values.iter().flatten().next().copied().unwrap_or(default)
}

/// `amount := attributes.srpAmount ∨ attributes.amount`.
fn transaction_amount(event: &EventInput) -> Decimal {
    attr(&event.attributes, "srpAmount")
        .or_else(|| attr(&event.attributes, "amount"))
        .unwrap_or(Decimal::ZERO)
}

/// Market-resolved base rate: JP uses `conversionRate`/`rate` with a 0.1
/// default; everywhere else uses `rate`/`standardRate` with a 1.0 default.
fn base_rate(params: &FactMap, market: Market) -> Decimal {
    if market == Market::Jp {
        first_of(&[param(params, "conversionRate"), param(params, "rate")], Decimal::new(1, 1))
    } else {
        first_of(&[param(params, "rate"), param(params, "standardRate")], Decimal::ONE)
    }
}

/// `base := floor(amount × baseRate); bonus := floor(base × multiplier) − base`.
fn multiple_point_bonus(amount: Decimal, rate: Decimal, multiplier: Decimal) -> (i64, i64) {
    let base = floor_to_i64(amount * rate);
    let bonus = floor_to_i64(Decimal::from(base) * multiplier) - base;
    (base, bonus)
}

struct Formula {
    points: i64,
    formula: String,
    inputs: FactMap,
}

fn formula_inputs(pairs: &[(&str, Decimal)]) -> FactMap {
    pairs.iter().map(|(k, v)| (k.to_string(), FactValue::Number(*v))).collect()
}

fn compute_formula(matched: &MatchedRuleEvent, event: &EventInput) -> Result<Formula, String> {
    let params = &matched.params;
    match matched.event_type.as_str() {
        "INTERACTION_REGISTRY_POINT" => {
            let bonus = first_of(
                &[param(params, "registrationBonus"), param(params, "bonus"), param(params, "reward")],
                Decimal::ZERO,
            );
            Ok(Formula {
                points: floor_to_i64(bonus),
                formula: format!("floor({bonus}) = {}", floor_to_i64(bonus)),
                inputs: formula_inputs(&[("bonus", bonus)]),
            })
        }

        "ORDER_BASE_POINT" => {
            let amount = transaction_amount(event);
            let rate = base_rate(params, event.market);
            let points = floor_to_i64(amount * rate);
            Ok(Formula {
                points,
                formula: format!("floor({amount} × {rate}) = {points}"),
                inputs: formula_inputs(&[("amount", amount), ("rate", rate)]),
            })
        }

        "ORDER_MULTIPLE_POINT_LIMIT" | "ORDER_MULTIPLE_POINT" => {
            let amount = transaction_amount(event);
            let rate = base_rate(params, event.market);
            let multiplier = param(params, "multiplier").unwrap_or(Decimal::ONE);
            let (base, bonus) = multiple_point_bonus(amount, rate, multiplier);
            Ok(Formula {
                points: bonus,
                formula: format!("floor(floor({amount} × {rate}) × {multiplier}) − {base} = {bonus}"),
                inputs: formula_inputs(&[("amount", amount), ("rate", rate), ("multiplier", multiplier)]),
            })
        }

        "FLEXIBLE_CAMPAIGN_BONUS" => {
            if let Some(fixed) = param(params, "fixedBonus").or_else(|| param(params, "bonus")) {
                let points = floor_to_i64(fixed);
                Ok(Formula {
                    points,
                    formula: format!("floor({fixed}) = {points}"),
                    inputs: formula_inputs(&[("fixedBonus", fixed)]),
                })
            } else if let Some(multiplier) = param(params, "multiplier") {
                let amount = transaction_amount(event);
                let rate = base_rate(params, event.market);
                let (base, bonus) = multiple_point_bonus(amount, rate, multiplier);
                Ok(Formula {
                    points: bonus,
                    formula: format!("floor(floor({amount} × {rate}) × {multiplier}) − {base} = {bonus}"),
                    inputs: formula_inputs(&[("amount", amount), ("rate", rate), ("multiplier", multiplier)]),
                })
            } else {
                let amount = transaction_amount(event);
                let rate = first_of(&[param(params, "campaignRate"), param(params, "rate")], Decimal::ZERO);
                let points = floor_to_i64(amount * rate);
                Ok(Formula {
                    points,
                    formula: format!("floor({amount} × {rate}) = {points}"),
                    inputs: formula_inputs(&[("amount", amount), ("campaignRate", rate)]),
                })
            }
        }

        "FLEXIBLE_VIP_MULTIPLIER" | "FLEXIBLE_PRODUCT_MULTIPLIER" | "FIRST_PURCHASE_BIRTH_MONTH_BONUS" => {
            let amount = transaction_amount(event);
            let rate = base_rate(params, event.market);
            let multiplier = param(params, "multiplier").unwrap_or(Decimal::ONE);
            let base = floor_to_i64(amount * rate);
            let points = floor_to_i64(Decimal::from(base) * (multiplier - Decimal::ONE));
            Ok(Formula {
                points,
                formula: format!("floor(floor({amount} × {rate}) × ({multiplier} − 1)) = {points}"),
                inputs: formula_inputs(&[("amount", amount), ("rate", rate), ("multiplier", multiplier)]),
            })
        }

        "FLEXIBLE_BASKET_AMOUNT" => {
            let amount = transaction_amount(event);
            let threshold = param(params, "threshold").unwrap_or(Decimal::ZERO);
            let bonus = first_of(&[param(params, "bonus"), param(params, "reward")], Decimal::ZERO);
            let points = if amount >= threshold { floor_to_i64(bonus) } else { 0 };
            Ok(Formula {
                points,
                formula: format!("{amount} >= {threshold} ? floor({bonus}) : 0 = {points}"),
                inputs: formula_inputs(&[("amount", amount), ("threshold", threshold), ("bonus", bonus)]),
            })
        }

        "FLEXIBLE_COMBO_PRODUCT_MULTIPLIER" => {
            let bonus = first_of(
                &[param(params, "bonus"), param(params, "reward"), param(params, "fixedBonus")],
                Decimal::ZERO,
            );
            let points = floor_to_i64(bonus);
            Ok(Formula {
                points,
                formula: format!("floor({bonus}) = {points}"),
                inputs: formula_inputs(&[("bonus", bonus)]),
            })
        }

        "INTERACTION_ADJUST_POINT_TIMES_PER_YEAR" => {
            let recycled = attr(&event.attributes, "recycledCount").unwrap_or(Decimal::ZERO);
            let max_per_period = param(params, "maxPerYear").or_else(|| param(params, "maxPerPeriod"));
            let counted = match max_per_period {
                Some(max) => recycled.min(max),
                None => recycled,
            };
            let per_item = first_of(
                &[param(params, "pointsPerBottle"), param(params, "rewardPerItem"), param(params, "rewardPerActivity")],
                Decimal::ZERO,
            );
            let points = floor_to_i64(counted * per_item);
            Ok(Formula {
                points,
                formula: format!("floor(min({recycled}, cap) × {per_item}) = {points}"),
                inputs: formula_inputs(&[("recycledCount", recycled), ("perItem", per_item), ("counted", counted)]),
            })
        }

        "CONSULTATION_BONUS" => {
            let bonus = param(params, "consultationBonus").unwrap_or(Decimal::ZERO);
            let points = floor_to_i64(bonus);
            Ok(Formula {
                points,
                formula: format!("floor({bonus}) = {points}"),
                inputs: formula_inputs(&[("consultationBonus", bonus)]),
            })
        }

        "INTERACTION_ADJUST_POINT_BY_MANAGER" => {
            let adjusted = attr(&event.attributes, "adjustedPoints").ok_or_else(|| {
                "attributes.adjustedPoints is required for INTERACTION_ADJUST_POINT_BY_MANAGER".to_string()
            })?;
            let points = floor_to_i64(adjusted);
            Ok(Formula {
                points,
                formula: format!("floor({adjusted}) = {points}"),
                inputs: formula_inputs(&[("adjustedPoints", adjusted)]),
            })
        }

        "REDEMPTION_DEDUCTION" => {
            let redeemed = attr(&event.attributes, "redemptionPoints").ok_or_else(|| {
                "attributes.redemptionPoints is required for REDEMPTION_DEDUCTION".to_string()
            })?;
            let points = -floor_to_i64(redeemed);
            Ok(Formula {
                points,
                formula: format!("-floor({redeemed}) = {points}"),
                inputs: formula_inputs(&[("redemptionPoints", redeemed)]),
            })
        }

        other => Err(format!("unknown calculation type `{other}`")),
    }
}

/// Dispatches on the matched rule event's `type` and produces a
/// `BreakdownEntry`. An unknown type or a missing required
/// input yields zero points plus an error entry
/// rather than aborting the run.
pub struct RewardCalculator;

impl RewardCalculator {
    pub fn calculate(matched: &MatchedRuleEvent, event: &EventInput) -> (BreakdownEntry, Option<String>) {
        match compute_formula(matched, event) {
            Ok(formula) => (
                BreakdownEntry {
                    rule_name: matched.rule_name.clone(),
                    priority: matched.priority,
                    r#type: matched.event_type.clone(),
                    category: category_for(&matched.event_type),
                    points: formula.points,
                    description: format!("{} ({})", matched.rule_name, matched.event_type),
                    computation: ComputationTrace {
                        calculation_type: matched.event_type.clone(),
                        formula: formula.formula,
                        inputs: formula.inputs,
                        result: formula.points,
                    },
                },
                None,
            ),
            Err(message) => (
                BreakdownEntry {
                    rule_name: matched.rule_name.clone(),
                    priority: matched.priority,
                    r#type: matched.event_type.clone(),
                    category: category_for(&matched.event_type),
                    points: 0,
                    description: format!("{} ({})", matched.rule_name, matched.event_type),
                    computation: ComputationTrace {
                        calculation_type: matched.event_type.clone(),
                        formula: "0 (calculation error)".to_string(),
                        inputs: FactMap::new(),
                        result: 0,
                    },
                },
                Some(format!("rule `{}`: {message}", matched.rule_name)),
            ),
        }
    }
}
