//! Item model
//!
//! An item is a product record owned by exactly one user. The barcode is
//! unique per owner.
//!
//! Author: hephaex@gmail.com

use crate::{truncate_to_seconds, DomainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length (in characters) of the bounded text fields
pub const MAX_FIELD_CHARS: usize = 100;

/// Number of items returned per page by a search
pub const PAGE_SIZE: usize = 10;

/// Item size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSize {
    Small,
    Large,
}

impl ItemSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for ItemSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "small" => Ok(Self::Small),
            "large" => Ok(Self::Large),
            _ => Err(DomainError::UndefinedItemSize(s.to_string())),
        }
    }
}

/// Input for a new item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub cost: i64,
    pub category: String,
    pub barcode: String,
    pub expiry_at: DateTime<Utc>,
    pub size: ItemSize,
}

/// Stored item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Storage-assigned identifier, `0` until persisted
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub cost: i64,
    pub category: String,
    pub barcode: String,
    pub expiry_at: DateTime<Utc>,
    pub size: ItemSize,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Create an unsaved item owned by `user_id`
    pub fn new(user_id: i64, input: NewItem, created_at: DateTime<Utc>) -> Result<Self> {
        if user_id < 1 {
            return Err(DomainError::InvalidItem(format!("invalid user id: {user_id}")));
        }

        let item = Self {
            id: 0,
            user_id,
            name: input.name,
            description: input.description,
            price: input.price,
            cost: input.cost,
            category: input.category,
            barcode: input.barcode,
            expiry_at: truncate_to_seconds(input.expiry_at),
            size: input.size,
            created_at: truncate_to_seconds(created_at),
        };
        item.validate_fields()?;

        Ok(item)
    }

    /// Hangul initial consonants of the name, used by keyword search
    pub fn name_initials(&self) -> String {
        initial_consonants(&self.name)
    }

    /// Whether the item matches a search keyword
    ///
    /// A keyword matches when it is a case-insensitive substring of the name
    /// or a substring of the name's initial consonants.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        if keyword.is_empty() {
            return true;
        }

        self.name.to_lowercase().contains(&keyword.to_lowercase())
            || self.name_initials().contains(keyword)
    }

    fn validate_fields(&self) -> Result<()> {
        check_text("name", &self.name)?;
        if self.description.is_empty() {
            return Err(DomainError::InvalidItem("empty description".to_string()));
        }
        check_amount("price", self.price)?;
        check_amount("cost", self.cost)?;
        check_text("category", &self.category)?;
        check_text("barcode", &self.barcode)?;

        Ok(())
    }
}

/// Partial update of an item; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub cost: Option<i64>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub expiry_at: Option<DateTime<Utc>>,
    pub size: Option<ItemSize>,
}

impl ItemUpdate {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.cost.is_none()
            && self.category.is_none()
            && self.barcode.is_none()
            && self.expiry_at.is_none()
            && self.size.is_none()
    }

    /// Validate the fields that are set
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(DomainError::InvalidItem("nothing to update".to_string()));
        }
        if let Some(name) = &self.name {
            check_text("name", name)?;
        }
        if matches!(&self.description, Some(d) if d.is_empty()) {
            return Err(DomainError::InvalidItem("empty description".to_string()));
        }
        if let Some(price) = self.price {
            check_amount("price", price)?;
        }
        if let Some(cost) = self.cost {
            check_amount("cost", cost)?;
        }
        if let Some(category) = &self.category {
            check_text("category", category)?;
        }
        if let Some(barcode) = &self.barcode {
            check_text("barcode", barcode)?;
        }

        Ok(())
    }

    /// Apply the set fields to `item`
    pub fn apply(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(cost) = self.cost {
            item.cost = cost;
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(barcode) = &self.barcode {
            item.barcode = barcode.clone();
        }
        if let Some(expiry_at) = self.expiry_at {
            item.expiry_at = truncate_to_seconds(expiry_at);
        }
        if let Some(size) = self.size {
            item.size = size;
        }
    }
}

fn check_text(field: &str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if len == 0 {
        return Err(DomainError::InvalidItem(format!("empty {field}")));
    }
    if len > MAX_FIELD_CHARS {
        return Err(DomainError::InvalidItem(format!(
            "{field} longer than {MAX_FIELD_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_amount(field: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(DomainError::InvalidItem(format!("invalid {field}: {value}")));
    }
    Ok(())
}

// ============================================================================
// Hangul initial consonants
// ============================================================================

const HANGUL_BASE: u32 = 0xAC00;
const HANGUL_LAST: u32 = 0xD7A3;
const SYLLABLES_PER_INITIAL: u32 = 21 * 28;

const INITIALS: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ',
    'ㅍ', 'ㅎ',
];

/// Replace every precomposed Hangul syllable with its initial consonant
///
/// Other characters are kept as they are.
pub fn initial_consonants(text: &str) -> String {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if (HANGUL_BASE..=HANGUL_LAST).contains(&code) {
                INITIALS[((code - HANGUL_BASE) / SYLLABLES_PER_INITIAL) as usize]
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_item() -> NewItem {
        NewItem {
            name: "슈크림 라떼".to_string(),
            description: "Seasonal latte".to_string(),
            price: 5000,
            cost: 1500,
            category: "coffee".to_string(),
            barcode: "8801234567890".to_string(),
            expiry_at: Utc::now() + Duration::days(3),
            size: ItemSize::Large,
        }
    }

    #[test]
    fn test_item_creation() {
        let item = Item::new(1, new_item(), Utc::now()).unwrap();

        assert_eq!(item.id, 0);
        assert_eq!(item.user_id, 1);
        assert_eq!(item.size, ItemSize::Large);
        assert_eq!(item.created_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_item_creation_rejects_invalid_input() {
        assert!(Item::new(0, new_item(), Utc::now()).is_err());

        let cases: [fn(&mut NewItem); 7] = [
            |i: &mut NewItem| i.name.clear(),
            |i: &mut NewItem| { i.name = "a".repeat(MAX_FIELD_CHARS + 1) },
            |i: &mut NewItem| i.description.clear(),
            |i: &mut NewItem| { i.price = 0 },
            |i: &mut NewItem| { i.cost = -1 },
            |i: &mut NewItem| i.category.clear(),
            |i: &mut NewItem| i.barcode.clear(),
        ];

        for mutate in cases {
            let mut input = new_item();
            mutate(&mut input);
            assert!(matches!(
                Item::new(1, input, Utc::now()),
                Err(DomainError::InvalidItem(_))
            ));
        }
    }

    #[test]
    fn test_item_size_parse() {
        assert_eq!("small".parse::<ItemSize>().unwrap(), ItemSize::Small);
        assert_eq!("large".parse::<ItemSize>().unwrap(), ItemSize::Large);
        assert!("medium".parse::<ItemSize>().is_err());
        assert_eq!(serde_json::to_string(&ItemSize::Small).unwrap(), "\"small\"");
    }

    #[test]
    fn test_item_update() {
        let mut item = Item::new(1, new_item(), Utc::now()).unwrap();

        assert!(ItemUpdate::default().is_empty());
        assert!(ItemUpdate::default().validate().is_err());

        let update = ItemUpdate {
            price: Some(5500),
            size: Some(ItemSize::Small),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        update.apply(&mut item);
        assert_eq!(item.price, 5500);
        assert_eq!(item.size, ItemSize::Small);
        assert_eq!(item.cost, 1500);

        let invalid = ItemUpdate {
            barcode: Some(String::new()),
            ..Default::default()
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_initial_consonants() {
        assert_eq!(initial_consonants("슈크림 라떼"), "ㅅㅋㄹ ㄹㄸ");
        assert_eq!(initial_consonants("Latte 1"), "Latte 1");
    }

    #[test]
    fn test_keyword_match() {
        let item = Item::new(1, new_item(), Utc::now()).unwrap();

        assert!(item.matches_keyword(""));
        assert!(item.matches_keyword("슈크림"));
        assert!(item.matches_keyword("ㅅㅋㄹ"));
        assert!(!item.matches_keyword("아메리카노"));

        let mut latte = item.clone();
        latte.name = "Vanilla Latte".to_string();
        assert!(latte.matches_keyword("LATTE"));
    }
}
