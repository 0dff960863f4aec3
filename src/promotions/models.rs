use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::persistence::format_display_time;
use crate::validation::{
    validate_discount_rate, validate_not_blank, validate_positive_amount, validate_reduction_terms,
    validate_window,
};

/// Persisted target id meaning "every item"
pub const ALL_ITEMS: &str = "-1";

/// Which items a discount applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiscountTarget {
    AllItems,
    Item(String),
}

impl DiscountTarget {
    pub fn matches(&self, item_id: &str) -> bool {
        match self {
            DiscountTarget::AllItems => true,
            DiscountTarget::Item(target) => target == item_id,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DiscountTarget::AllItems => ALL_ITEMS,
            DiscountTarget::Item(id) => id,
        }
    }
}

impl From<String> for DiscountTarget {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL_ITEMS {
            DiscountTarget::AllItems
        } else {
            DiscountTarget::Item(trimmed.to_string())
        }
    }
}

impl From<DiscountTarget> for String {
    fn from(target: DiscountTarget) -> Self {
        target.as_str().to_string()
    }
}

/// The pricing rule of a promotion; only the fields of the active kind exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromotionKind {
    /// Multiplies the unit price of matching items by `discount_rate`
    Discount {
        target: DiscountTarget,
        discount_rate: Decimal,
    },
    /// Subtracts `reduction_amount` once the discounted subtotal reaches `threshold_amount`
    FullReduction {
        threshold_amount: Decimal,
        reduction_amount: Decimal,
    },
}

/// A promotional rule with its validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub name: String,
    pub kind: PromotionKind,
    pub active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl Promotion {
    pub fn discount(
        id: impl Into<String>,
        name: impl Into<String>,
        target: DiscountTarget,
        discount_rate: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: PromotionKind::Discount {
                target,
                discount_rate,
            },
            active: true,
            valid_from,
            valid_until,
        }
    }

    pub fn full_reduction(
        id: impl Into<String>,
        name: impl Into<String>,
        threshold_amount: Decimal,
        reduction_amount: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: PromotionKind::FullReduction {
                threshold_amount,
                reduction_amount,
            },
            active: true,
            valid_from,
            valid_until,
        }
    }

    /// Active and `now` inside the inclusive validity window
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && self.valid_from <= now && now <= self.valid_until
    }

    pub fn is_applicable_to_item(&self, item_id: &str) -> bool {
        match &self.kind {
            PromotionKind::Discount { target, .. } => target.matches(item_id),
            PromotionKind::FullReduction { .. } => false,
        }
    }

    pub fn price_after_discount(&self, original_price: Decimal) -> Decimal {
        match &self.kind {
            PromotionKind::Discount { discount_rate, .. } => original_price * *discount_rate,
            PromotionKind::FullReduction { .. } => original_price,
        }
    }

    pub fn reduction_for(&self, total_amount: Decimal) -> Decimal {
        match &self.kind {
            PromotionKind::FullReduction {
                threshold_amount,
                reduction_amount,
            } if total_amount >= *threshold_amount => *reduction_amount,
            _ => Decimal::ZERO,
        }
    }

    /// Short tag shown next to priced items and in the applied-promotions list
    ///
    /// A rate of 0.8 renders as `8-tenths`; a 300/50 reduction as
    /// `reduction: spend ≥ 300, save 50`. Amounts are truncated, not rounded.
    pub fn display_tag(&self) -> String {
        match &self.kind {
            PromotionKind::Discount { discount_rate, .. } => {
                format!("{}-tenths", truncated(*discount_rate * Decimal::TEN))
            }
            PromotionKind::FullReduction {
                threshold_amount,
                reduction_amount,
            } => format!(
                "reduction: spend ≥ {}, save {}",
                truncated(*threshold_amount),
                truncated(*reduction_amount)
            ),
        }
    }

    pub fn is_discount(&self) -> bool {
        matches!(self.kind, PromotionKind::Discount { .. })
    }

    /// Persisted and displayed kind name
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PromotionKind::Discount { .. } => "DISCOUNT",
            PromotionKind::FullReduction { .. } => "FULL_REDUCTION",
        }
    }

    /// One-line listing text
    pub fn describe(&self) -> String {
        let terms = match &self.kind {
            PromotionKind::Discount {
                target: DiscountTarget::AllItems,
                ..
            } => format!("{} on all items", self.display_tag()),
            PromotionKind::Discount {
                target: DiscountTarget::Item(item_id),
                ..
            } => format!("{} on item {}", self.display_tag(), item_id),
            PromotionKind::FullReduction { .. } => self.display_tag(),
        };

        format!(
            "{} | {} | {} | {} | {} ~ {} | {}",
            self.id,
            self.name,
            self.kind_name(),
            if self.active { "active" } else { "inactive" },
            format_display_time(&self.valid_from),
            format_display_time(&self.valid_until),
            terms
        )
    }
}

fn truncated(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or_default()
}

fn default_active() -> bool {
    true
}

/// Request DTO for creating a discount promotion
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_discount_window"))]
pub struct CreateDiscountRequest {
    #[validate(length(max = 100), custom = "validate_not_blank")]
    pub name: String,
    /// Target item id; omitted or `-1` means every item
    #[serde(default)]
    pub target_item_id: Option<String>,
    #[validate(custom = "validate_discount_rate")]
    pub discount_rate: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn validate_discount_window(request: &CreateDiscountRequest) -> Result<(), ValidationError> {
    validate_window(&request.valid_from, &request.valid_until)
}

impl CreateDiscountRequest {
    pub fn into_promotion(self, id: String) -> Promotion {
        let target = self
            .target_item_id
            .map(DiscountTarget::from)
            .unwrap_or(DiscountTarget::AllItems);
        let mut promotion = Promotion::discount(
            id,
            self.name.trim(),
            target,
            self.discount_rate,
            self.valid_from,
            self.valid_until,
        );
        promotion.active = self.active;
        promotion
    }
}

/// Request DTO for creating a full-reduction promotion
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_reduction_request"))]
pub struct CreateReductionRequest {
    #[validate(length(max = 100), custom = "validate_not_blank")]
    pub name: String,
    #[validate(custom = "validate_positive_amount")]
    pub threshold_amount: Decimal,
    #[validate(custom = "validate_positive_amount")]
    pub reduction_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn validate_reduction_request(request: &CreateReductionRequest) -> Result<(), ValidationError> {
    validate_window(&request.valid_from, &request.valid_until)?;
    validate_reduction_terms(&request.threshold_amount, &request.reduction_amount)
}

impl CreateReductionRequest {
    pub fn into_promotion(self, id: String) -> Promotion {
        let mut promotion = Promotion::full_reduction(
            id,
            self.name.trim(),
            self.threshold_amount,
            self.reduction_amount,
            self.valid_from,
            self.valid_until,
        );
        promotion.active = self.active;
        promotion
    }
}

/// One administrator edit to an existing promotion
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionEdit {
    Rename(String),
    /// Either bound may be left unchanged; the resulting window must still end after it starts
    Reschedule {
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    },
    DiscountRate(Decimal),
    TargetItem(DiscountTarget),
    /// Either amount may be left unchanged; checked against the other's resulting value
    ReductionTerms {
        threshold_amount: Option<Decimal>,
        reduction_amount: Option<Decimal>,
    },
    Active(bool),
}

/// Request DTO for editing a promotion; every field is optional
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePromotionRequest {
    #[validate(length(max = 100), custom = "validate_not_blank")]
    pub name: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[validate(custom = "validate_discount_rate")]
    pub discount_rate: Option<Decimal>,
    pub target_item_id: Option<String>,
    #[validate(custom = "validate_positive_amount")]
    pub threshold_amount: Option<Decimal>,
    #[validate(custom = "validate_positive_amount")]
    pub reduction_amount: Option<Decimal>,
    pub active: Option<bool>,
}

impl UpdatePromotionRequest {
    /// Edits in application order; empty when the request changes nothing
    pub fn into_edits(self) -> Vec<PromotionEdit> {
        let mut edits = Vec::new();

        if let Some(name) = self.name {
            edits.push(PromotionEdit::Rename(name.trim().to_string()));
        }
        if self.valid_from.is_some() || self.valid_until.is_some() {
            edits.push(PromotionEdit::Reschedule {
                valid_from: self.valid_from,
                valid_until: self.valid_until,
            });
        }
        if let Some(rate) = self.discount_rate {
            edits.push(PromotionEdit::DiscountRate(rate));
        }
        if let Some(target) = self.target_item_id {
            edits.push(PromotionEdit::TargetItem(DiscountTarget::from(target)));
        }
        if self.threshold_amount.is_some() || self.reduction_amount.is_some() {
            edits.push(PromotionEdit::ReductionTerms {
                threshold_amount: self.threshold_amount,
                reduction_amount: self.reduction_amount,
            });
        }
        if let Some(active) = self.active {
            edits.push(PromotionEdit::Active(active));
        }

        edits
    }
}

/// Response DTO for a promotion with its display text
#[derive(Debug, Serialize)]
pub struct PromotionResponse {
    #[serde(flatten)]
    pub promotion: Promotion,
    pub kind_name: &'static str,
    pub tag: String,
    pub description: String,
    pub currently_valid: bool,
}

impl PromotionResponse {
    pub fn new(promotion: Promotion, now: DateTime<Utc>) -> Self {
        Self {
            kind_name: promotion.kind_name(),
            tag: promotion.display_tag(),
            description: promotion.describe(),
            currently_valid: promotion.is_valid(now),
            promotion,
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn discount_with_rate(rate: Decimal) -> Promotion {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Promotion::discount(
            "PROMO001",
            "Any",
            DiscountTarget::AllItems,
            rate,
            start,
            start + Duration::days(10),
        )
    }

    /// A discount always prices at exactly price times rate
    #[test]
    fn prop_price_after_discount_is_price_times_rate() {
        proptest!(|(
            rate_hundredths in 1u32..=99,
            price_cents in 0u64..=10_000_000u64
        )| {
            let rate = Decimal::new(rate_hundredths as i64, 2);
            let price = Decimal::new(price_cents as i64, 2);
            let promotion = discount_with_rate(rate);
            prop_assert_eq!(promotion.price_after_discount(price), price * rate);
        });
    }

    /// Validity is false outside the window whatever the active flag says
    #[test]
    fn prop_never_valid_outside_window() {
        proptest!(|(
            offset_secs in 1i64..=10_000_000,
            active in any::<bool>(),
            before in any::<bool>()
        )| {
            let mut promotion = discount_with_rate(Decimal::new(8, 1));
            promotion.active = active;
            let now = if before {
                promotion.valid_from - Duration::seconds(offset_secs)
            } else {
                promotion.valid_until + Duration::seconds(offset_secs)
            };
            prop_assert!(!promotion.is_valid(now));
        });
    }

    /// Inside the window validity follows the active flag exactly
    #[test]
    fn prop_inside_window_validity_follows_active_flag() {
        proptest!(|(offset_secs in 0i64..=864_000, active in any::<bool>())| {
            let mut promotion = discount_with_rate(Decimal::new(8, 1));
            promotion.active = active;
            let now = promotion.valid_from + Duration::seconds(offset_secs);
            prop_assert_eq!(promotion.is_valid(now), active);
        });
    }
}
