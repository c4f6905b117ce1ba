//! Shipping destinations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an order ships to. Only the fields zone matching needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Destination {
    /// Country code (e.g., "US").
    pub country_code: String,
    /// State/province code (e.g., "CA").
    pub region_code: Option<String>,
    /// Postal/ZIP code.
    pub postal_code: Option<String>,
    /// City.
    pub city: Option<String>,
}

impl Destination {
    /// Create a destination in a country.
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region_code: impl Into<String>) -> Self {
        self.region_code = Some(region_code.into());
        self
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Postal code upper-cased with whitespace removed, for prefix matching.
    pub fn normalized_postal_code(&self) -> Option<String> {
        self.postal_code.as_deref().map(normalize_postal)
    }

    /// Format as single line.
    pub fn one_line(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref city) = self.city {
            parts.push(city.clone());
        }
        if let Some(ref region) = self.region_code {
            parts.push(region.clone());
        }
        if let Some(ref zip) = self.postal_code {
            parts.push(zip.clone());
        }
        parts.push(self.country_code.clone());
        parts.join(", ")
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.one_line())
    }
}

/// Upper-case and strip whitespace, so `"k1a 0b1"` and `"K1A0B1"` compare equal.
pub(crate) fn normalize_postal(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
