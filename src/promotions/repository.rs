use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::persistence::{self, PersistenceError, Record};
use crate::promotions::{DiscountTarget, Promotion, PromotionKind};

pub const PROMOTIONS_HEADER: &str = "promotion_id,promotion_name,promotion_type,is_active,start_time,end_time,target_item_id,discount_rate,threshold_amount,reduction_amount";

/// Repository for the promotions file
///
/// The whole collection is rewritten on every save.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    path: PathBuf,
}

impl PromotionRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every well-formed promotion in file order
    ///
    /// A missing file is an empty collection. Malformed records and repeated ids are
    /// skipped with a warning.
    pub async fn load(&self) -> Result<Vec<Promotion>, PersistenceError> {
        let Some(records) = persistence::read_records(&self.path).await? else {
            tracing::info!("No promotions file at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut promotions = Vec::with_capacity(records.len());
        for record in &records {
            match decode_promotion(record) {
                Ok(promotion) if seen.insert(promotion.id.clone()) => promotions.push(promotion),
                Ok(promotion) => tracing::warn!(
                    "Skipping duplicate promotion {} at {}:{}",
                    promotion.id,
                    self.path.display(),
                    record.line
                ),
                Err(e) => tracing::warn!("Skipping promotion record: {}", self.malformed(record, e)),
            }
        }

        tracing::debug!("Loaded {} promotions", promotions.len());
        Ok(promotions)
    }

    pub async fn save(&self, promotions: &[Promotion]) -> Result<(), PersistenceError> {
        persistence::write_atomically(
            &self.path,
            PROMOTIONS_HEADER,
            promotions.iter().map(encode_promotion).collect(),
        )
        .await
    }

    fn malformed(&self, record: &Record, message: String) -> PersistenceError {
        PersistenceError::Malformed {
            path: self.path.clone(),
            line: record.line,
            message,
        }
    }
}

/// Encode one promotion; fields of the other kind stay empty
pub fn encode_promotion(promotion: &Promotion) -> String {
    let (target, rate, threshold, reduction) = match &promotion.kind {
        PromotionKind::Discount {
            target,
            discount_rate,
        } => (
            target.as_str().to_string(),
            discount_rate.to_string(),
            String::new(),
            String::new(),
        ),
        PromotionKind::FullReduction {
            threshold_amount,
            reduction_amount,
        } => (
            String::new(),
            String::new(),
            threshold_amount.to_string(),
            reduction_amount.to_string(),
        ),
    };

    persistence::join_record([
        promotion.id.clone(),
        promotion.name.clone(),
        promotion.kind_name().to_string(),
        if promotion.active { "1" } else { "0" }.to_string(),
        persistence::format_timestamp(&promotion.valid_from),
        persistence::format_timestamp(&promotion.valid_until),
        target,
        rate,
        threshold,
        reduction,
    ])
}

pub fn decode_promotion(record: &Record) -> Result<Promotion, String> {
    let [id, name, kind, active, start, end, target, rate, threshold, reduction] =
        record.fields.as_slice()
    else {
        return Err(format!("expected 10 fields, found {}", record.fields.len()));
    };

    if id.is_empty() {
        return Err("missing promotion id".to_string());
    }

    let active = match active.to_lowercase().as_str() {
        "1" | "true" => true,
        "0" | "false" => false,
        other => return Err(format!("invalid active flag {:?}", other)),
    };
    let valid_from =
        persistence::parse_timestamp(start).ok_or_else(|| format!("invalid start time {:?}", start))?;
    let valid_until =
        persistence::parse_timestamp(end).ok_or_else(|| format!("invalid end time {:?}", end))?;

    let decimal = |value: &String, field: &str| {
        persistence::parse_decimal(value).ok_or_else(|| format!("invalid {} {:?}", field, value))
    };

    let kind = match kind.to_uppercase().as_str() {
        "DISCOUNT" => PromotionKind::Discount {
            target: DiscountTarget::from(target.clone()),
            discount_rate: decimal(rate, "discount rate")?,
        },
        "FULL_REDUCTION" => PromotionKind::FullReduction {
            threshold_amount: decimal(threshold, "threshold")?,
            reduction_amount: decimal(reduction, "reduction")?,
        },
        other => return Err(format!("unknown promotion type {:?}", other)),
    };

    Ok(Promotion {
        id: id.clone(),
        name: name.clone(),
        kind,
        active,
        valid_from,
        valid_until,
    })
}
