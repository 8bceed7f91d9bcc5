//! Company records extracted from listing pages
//!
//! A [`Record`] maps a fixed field vocabulary to string values. Fields that
//! are absent in the markup are simply missing; nothing is null-filled here.
//! [`EnrichedRecord`] adds the two CMS classifications without touching the
//! extracted fields.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// The fixed field vocabulary of a company record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Address,
    PostalCode,
    City,
    Industry,
    Email,
    Homepage,
    Products,
    ImageUrl,
}

impl Field {
    /// All fields in serializer column order
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Address,
        Field::PostalCode,
        Field::City,
        Field::Industry,
        Field::Email,
        Field::Homepage,
        Field::Products,
        Field::ImageUrl,
    ];

    /// Column label used in the exported header row
    pub fn header_label(&self) -> &'static str {
        match self {
            Self::Name => "Firmenname",
            Self::Address => "Adresse",
            Self::PostalCode => "PLZ",
            Self::City => "Ort",
            Self::Industry => "Branche",
            Self::Email => "E-Mail",
            Self::Homepage => "Homepage",
            Self::Products => "Produkte",
            Self::ImageUrl => "ImageURL",
        }
    }
}

/// Header labels of the two classification columns
pub const PLATFORM_A_LABEL: &str = "TYPO3";
pub const PLATFORM_B_LABEL: &str = "Shopware";

/// Full header row handed to the serializer, in declared field order
pub fn header_row() -> Vec<&'static str> {
    Field::ALL
        .iter()
        .map(Field::header_label)
        .chain([PLATFORM_A_LABEL, PLATFORM_B_LABEL])
        .collect()
}

/// One company row from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<Field, String>,

    /// Registry id (`eid`) of the company detail link, when present
    source_id: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn set_source_id(&mut self, id: impl Into<String>) {
        self.source_id = Some(id.into());
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Stable identity used by the resume checkpoint
    ///
    /// The registry id when the row carried one, otherwise a digest of
    /// name, postal code and city.
    pub fn company_id(&self) -> String {
        if let Some(id) = &self.source_id {
            return id.clone();
        }

        let mut hasher = Sha256::new();
        for field in [Field::Name, Field::PostalCode, Field::City] {
            hasher.update(self.get(field).unwrap_or("").as_bytes());
            hasher.update(b"|");
        }
        hex::encode(hasher.finalize())
    }
}

/// Outcome of a CMS classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmsStatus {
    /// A marker for the platform was found
    Likely,

    /// Every probe answered and none matched
    LikelyNot,

    /// Only a weak hint matched, or some probes could not be completed
    Possibly,

    /// The probes themselves failed; nothing is known
    ProbeError,
}

impl CmsStatus {
    /// Label written to the exported file
    pub fn label(&self) -> &'static str {
        match self {
            Self::Likely => "wahrscheinlich",
            Self::LikelyNot => "wahrscheinlich nicht",
            Self::Possibly => "möglicherweise",
            Self::ProbeError => "error",
        }
    }
}

impl fmt::Display for CmsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Likely => "likely",
            Self::LikelyNot => "likely-not",
            Self::Possibly => "possibly",
            Self::ProbeError => "probe-error",
        };
        write!(f, "{}", s)
    }
}

/// A record plus its CMS classifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub record: Record,

    /// Platform A (TYPO3) classification; `None` when not probed or undecided
    pub platform_a: Option<CmsStatus>,

    /// Platform B (Shopware) classification; `None` when not probed or undecided
    pub platform_b: Option<CmsStatus>,
}

impl EnrichedRecord {
    /// Wraps a record that was not probed
    pub fn unprobed(record: Record) -> Self {
        Self {
            record,
            platform_a: None,
            platform_b: None,
        }
    }

    /// Row values in the order of [`header_row`]; missing values are empty
    pub fn to_row(&self) -> Vec<String> {
        let status = |s: Option<CmsStatus>| s.map(|s| s.label().to_string()).unwrap_or_default();

        Field::ALL
            .iter()
            .map(|f| self.record.get(*f).unwrap_or("").to_string())
            .chain([status(self.platform_a), status(self.platform_b)])
            .collect()
    }
}
