// Promotion catalog
// Owns the promotion collection, keeps the promotions file in step with it and answers
// the two queries pricing relies on.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::persistence::PersistenceError;
use crate::promotions::{
    Promotion, PromotionEdit, PromotionError, PromotionKind, PromotionRepository,
};
use crate::validation::{validate_discount_rate, validate_window};

const ID_PREFIX: &str = "PROMO";
const MIN_ID_DIGITS: usize = 3;

fn promotion_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^PROMO(\d+)$").expect("static promotion id pattern"))
}

/// Next sequential id: `PROMO` + (largest numeric suffix + 1), zero-padded to 3 digits
///
/// Ids that do not follow the `PROMO<digits>` pattern are ignored.
pub fn generate_promotion_id(promotions: &[Promotion]) -> String {
    let next = promotions
        .iter()
        .filter_map(|promotion| promotion_id_pattern().captures(&promotion.id))
        .filter_map(|captures| captures[1].parse::<u64>().ok())
        .max()
        .map_or(1, |max| max.saturating_add(1));

    format!("{}{:0width$}", ID_PREFIX, next, width = MIN_ID_DIGITS)
}

/// Point-in-time copy of the promotions used for one pricing run
#[derive(Debug, Clone, Default)]
pub struct PromotionSnapshot {
    promotions: Vec<Promotion>,
}

impl PromotionSnapshot {
    pub fn new(promotions: Vec<Promotion>) -> Self {
        Self { promotions }
    }

    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    /// Deepest valid discount for `item_id`
    ///
    /// The lowest rate wins; on equal rates the promotion stored first wins.
    pub fn active_discount_for(&self, item_id: &str, now: DateTime<Utc>) -> Option<&Promotion> {
        let mut best: Option<(&Promotion, Decimal)> = None;

        for promotion in &self.promotions {
            let PromotionKind::Discount { discount_rate, .. } = promotion.kind else {
                continue;
            };
            if !promotion.is_valid(now) || !promotion.is_applicable_to_item(item_id) {
                continue;
            }
            if best.map_or(true, |(_, best_rate)| discount_rate < best_rate) {
                best = Some((promotion, discount_rate));
            }
        }

        best.map(|(promotion, _)| promotion)
    }

    /// Every valid full reduction, ascending by threshold (stable for equal thresholds)
    pub fn active_full_reductions(&self, now: DateTime<Utc>) -> Vec<&Promotion> {
        let mut reductions: Vec<(&Promotion, Decimal)> = self
            .promotions
            .iter()
            .filter(|promotion| promotion.is_valid(now))
            .filter_map(|promotion| match promotion.kind {
                PromotionKind::FullReduction {
                    threshold_amount, ..
                } => Some((promotion, threshold_amount)),
                PromotionKind::Discount { .. } => None,
            })
            .collect();

        reductions.sort_by(|a, b| a.1.cmp(&b.1));
        reductions.into_iter().map(|(promotion, _)| promotion).collect()
    }
}

/// Thread-safe owner of the promotion collection
///
/// Every mutation holds the write lock across the file rewrite, so readers never see a
/// collection that differs from what was last written. If the write fails the in-memory
/// change is kept and the error is returned.
pub struct PromotionCatalog {
    repository: PromotionRepository,
    promotions: RwLock<Vec<Promotion>>,
}

impl PromotionCatalog {
    /// Catalog starting from an already loaded collection
    pub fn new(repository: PromotionRepository, promotions: Vec<Promotion>) -> Self {
        Self {
            repository,
            promotions: RwLock::new(promotions),
        }
    }

    /// Load the catalog from its repository
    pub async fn load(repository: PromotionRepository) -> Result<Self, PersistenceError> {
        let promotions = repository.load().await?;
        tracing::info!("Loaded {} promotions", promotions.len());
        Ok(Self::new(repository, promotions))
    }

    pub async fn snapshot(&self) -> PromotionSnapshot {
        PromotionSnapshot::new(self.promotions.read().await.clone())
    }

    pub async fn list(&self) -> Vec<Promotion> {
        self.promotions.read().await.clone()
    }

    pub async fn find(&self, id: &str) -> Option<Promotion> {
        self.promotions
            .read()
            .await
            .iter()
            .find(|promotion| promotion.id == id)
            .cloned()
    }

    pub async fn list_valid(&self, now: DateTime<Utc>) -> Vec<Promotion> {
        self.promotions
            .read()
            .await
            .iter()
            .filter(|promotion| promotion.is_valid(now))
            .cloned()
            .collect()
    }

    pub async fn active_discount_for(&self, item_id: &str, now: DateTime<Utc>) -> Option<Promotion> {
        self.snapshot().await.active_discount_for(item_id, now).cloned()
    }

    pub async fn active_full_reductions(&self, now: DateTime<Utc>) -> Vec<Promotion> {
        self.snapshot()
            .await
            .active_full_reductions(now)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn generate_id(&self) -> String {
        generate_promotion_id(&self.promotions.read().await)
    }

    /// Append a promotion with a caller-chosen id
    ///
    /// # Returns
    /// `DuplicateId` if the id is taken, otherwise the stored promotion
    pub async fn add(&self, promotion: Promotion) -> Result<Promotion, PromotionError> {
        let mut promotions = self.promotions.write().await;
        ensure_unused_id(&promotions, &promotion.id)?;

        promotions.push(promotion.clone());
        self.persist(&promotions).await?;

        tracing::info!("Added promotion {} ({})", promotion.id, promotion.kind_name());
        Ok(promotion)
    }

    /// Generate the next id and append the promotion built from it, under one lock
    pub async fn create<F>(&self, build: F) -> Result<Promotion, PromotionError>
    where
        F: FnOnce(String) -> Promotion,
    {
        let mut promotions = self.promotions.write().await;
        let promotion = build(generate_promotion_id(&promotions));
        ensure_unused_id(&promotions, &promotion.id)?;

        promotions.push(promotion.clone());
        self.persist(&promotions).await?;

        tracing::info!("Created promotion {} ({})", promotion.id, promotion.kind_name());
        Ok(promotion)
    }

    pub async fn remove(&self, id: &str) -> Result<Promotion, PromotionError> {
        let mut promotions = self.promotions.write().await;
        let index = promotions
            .iter()
            .position(|promotion| promotion.id == id)
            .ok_or_else(|| PromotionError::NotFound(id.to_string()))?;

        let removed = promotions.remove(index);
        self.persist(&promotions).await?;

        tracing::info!("Removed promotion {}", id);
        Ok(removed)
    }

    /// Mutate one promotion in place
    ///
    /// The mutator works on a copy; the stored promotion is only replaced when it
    /// returns `Ok`.
    pub async fn update<F>(&self, id: &str, mutator: F) -> Result<Promotion, PromotionError>
    where
        F: FnOnce(&mut Promotion) -> Result<(), PromotionError>,
    {
        let mut promotions = self.promotions.write().await;
        let slot = promotions
            .iter_mut()
            .find(|promotion| promotion.id == id)
            .ok_or_else(|| PromotionError::NotFound(id.to_string()))?;

        let mut edited = slot.clone();
        mutator(&mut edited)?;
        *slot = edited.clone();

        self.persist(&promotions).await?;

        tracing::info!("Updated promotion {}", id);
        Ok(edited)
    }

    /// Apply a list of edits as one update; any rejected edit leaves the promotion unchanged
    pub async fn apply_edits(
        &self,
        id: &str,
        edits: Vec<PromotionEdit>,
    ) -> Result<Promotion, PromotionError> {
        if edits.is_empty() {
            return Err(PromotionError::ValidationError("No changes requested".to_string()));
        }

        self.update(id, |promotion| {
            edits
                .into_iter()
                .try_for_each(|edit| apply_edit(promotion, edit))
        })
        .await
    }

    pub async fn toggle_active(&self, id: &str) -> Result<Promotion, PromotionError> {
        self.update(id, |promotion| {
            promotion.active = !promotion.active;
            Ok(())
        })
        .await
    }

    async fn persist(&self, promotions: &[Promotion]) -> Result<(), PromotionError> {
        self.repository.save(promotions).await.map_err(|e| {
            tracing::error!(
                "Failed to write {}; in-memory promotions are ahead of the file: {}",
                self.repository.path().display(),
                e
            );
            PromotionError::from(e)
        })
    }
}

fn ensure_unused_id(promotions: &[Promotion], id: &str) -> Result<(), PromotionError> {
    if promotions.iter().any(|existing| existing.id == id) {
        tracing::warn!("Rejected duplicate promotion id {}", id);
        return Err(PromotionError::DuplicateId(id.to_string()));
    }
    Ok(())
}

/// Apply one administrator edit, checking it against the promotion's kind and current terms
pub fn apply_edit(promotion: &mut Promotion, edit: PromotionEdit) -> Result<(), PromotionError> {
    match edit {
        PromotionEdit::Rename(name) => {
            if name.trim().is_empty() {
                return Err(PromotionError::ValidationError("Name must not be blank".to_string()));
            }
            promotion.name = name;
        }
        PromotionEdit::Reschedule {
            valid_from,
            valid_until,
        } => {
            let from = valid_from.unwrap_or(promotion.valid_from);
            let until = valid_until.unwrap_or(promotion.valid_until);
            validate_window(&from, &until).map_err(|_| {
                PromotionError::ValidationError("End time must be after start time".to_string())
            })?;
            promotion.valid_from = from;
            promotion.valid_until = until;
        }
        PromotionEdit::DiscountRate(rate) => {
            let PromotionKind::Discount { discount_rate, .. } = &mut promotion.kind else {
                return Err(kind_mismatch(&promotion.id, "discount"));
            };
            validate_discount_rate(&rate).map_err(|_| {
                PromotionError::ValidationError(
                    "Discount rate must be between 0 and 1 (exclusive)".to_string(),
                )
            })?;
            *discount_rate = rate;
        }
        PromotionEdit::TargetItem(new_target) => {
            let PromotionKind::Discount { target, .. } = &mut promotion.kind else {
                return Err(kind_mismatch(&promotion.id, "discount"));
            };
            *target = new_target;
        }
        PromotionEdit::ReductionTerms {
            threshold_amount: new_threshold,
            reduction_amount: new_reduction,
        } => {
            let PromotionKind::FullReduction {
                threshold_amount,
                reduction_amount,
            } = &mut promotion.kind
            else {
                return Err(kind_mismatch(&promotion.id, "full reduction"));
            };
            let threshold = new_threshold.unwrap_or(*threshold_amount);
            let reduction = new_reduction.unwrap_or(*reduction_amount);

            if threshold <= Decimal::ZERO || reduction <= Decimal::ZERO {
                return Err(PromotionError::ValidationError(
                    "Threshold and reduction must be positive".to_string(),
                ));
            }
            if reduction >= threshold {
                return Err(PromotionError::ValidationError(
                    "Reduction must be less than the threshold".to_string(),
                ));
            }
            *threshold_amount = threshold;
            *reduction_amount = reduction;
        }
        PromotionEdit::Active(active) => promotion.active = active,
    }

    Ok(())
}

fn kind_mismatch(id: &str, expected: &'static str) -> PromotionError {
    PromotionError::KindMismatch {
        id: id.to_string(),
        expected,
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::promotions::DiscountTarget;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    /// The selected discount always has the minimum rate among valid applicable discounts
    #[test]
    fn prop_selected_discount_has_minimum_rate() {
        proptest!(|(
            rates in prop::collection::vec((1i64..=99, any::<bool>(), any::<bool>()), 0..=12)
        )| {
            let now = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
            let promotions: Vec<Promotion> = rates
                .iter()
                .enumerate()
                .map(|(i, &(rate, targeted, active))| {
                    let target = if targeted {
                        DiscountTarget::Item("X".to_string())
                    } else {
                        DiscountTarget::Item("Y".to_string())
                    };
                    let mut promotion = Promotion::discount(
                        format!("PROMO{:03}", i + 1),
                        "p",
                        target,
                        Decimal::new(rate, 2),
                        now - Duration::days(1),
                        now + Duration::days(1),
                    );
                    promotion.active = active;
                    promotion
                })
                .collect();

            let expected = rates
                .iter()
                .filter(|(_, targeted, active)| *targeted && *active)
                .map(|(rate, _, _)| Decimal::new(*rate, 2))
                .min();

            let snapshot = PromotionSnapshot::new(promotions);
            let chosen = snapshot.active_discount_for("X", now).map(|p| p.price_after_discount(Decimal::ONE));
            prop_assert_eq!(chosen, expected);
        });
    }

    /// Generated ids never collide with an existing PROMO id
    #[test]
    fn prop_generated_id_is_unused() {
        proptest!(|(suffixes in prop::collection::vec(0u32..5000, 0..20))| {
            let now = Utc::now();
            let promotions: Vec<Promotion> = suffixes
                .iter()
                .map(|n| Promotion::full_reduction(
                    format!("PROMO{:03}", n),
                    "r",
                    Decimal::TEN,
                    Decimal::ONE,
                    now,
                    now + Duration::days(1),
                ))
                .collect();

            let id = generate_promotion_id(&promotions);
            prop_assert!(promotions.iter().all(|p| p.id != id));
            prop_assert!(id.starts_with("PROMO"));
        });
    }
}
