//! Engine configuration.
//!
//! A [`PricingConfig`] is a plain value handed to the engine at construction.
//! Two engines built from different configs share nothing.

use crate::error::ConfigError;
use crate::money::Currency;
use crate::policy::{BackoffStrategy, CallPolicy, Collaborator};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Maximum quantity allowed per line unless configured otherwise.
pub const DEFAULT_MAX_QUANTITY_PER_LINE: i64 = 9999;

/// Pricing engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Currency every price in a request must be quoted in.
    #[serde(default)]
    pub currency: Currency,

    /// Upper bound on a single line's quantity.
    #[serde(default = "default_max_quantity")]
    pub max_quantity_per_line: i64,

    /// How multiple coupons combine.
    #[serde(default)]
    pub stacking: StackingPolicy,

    /// Shipping zones and rate tables.
    #[serde(default)]
    pub shipping: ShippingConfig,

    /// Timeout and retry settings per collaborator.
    #[serde(default)]
    pub collaborators: CollaboratorPolicies,
}

fn default_max_quantity() -> i64 {
    DEFAULT_MAX_QUANTITY_PER_LINE
}

fn default_true() -> bool {
    true
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            max_quantity_per_line: DEFAULT_MAX_QUANTITY_PER_LINE,
            stacking: StackingPolicy::default(),
            shipping: ShippingConfig::default(),
            collaborators: CollaboratorPolicies::default(),
        }
    }
}

impl PricingConfig {
    /// Load config from a file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_quantity_per_line < 1 {
            return Err(ConfigError::Invalid(format!(
                "max_quantity_per_line must be at least 1, got {}",
                self.max_quantity_per_line
            )));
        }
        if self.stacking.max_coupons == Some(0) {
            return Err(ConfigError::Invalid(
                "stacking.max_coupons must be at least 1".to_string(),
            ));
        }
        self.shipping.validate()
    }
}

/// Coupon stacking policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackingPolicy {
    /// When false, only the first valid coupon in a request applies.
    #[serde(default = "default_true")]
    pub allow_stacking: bool,

    /// Cap on the number of coupons applied to one order.
    #[serde(default)]
    pub max_coupons: Option<usize>,
}

impl Default for StackingPolicy {
    fn default() -> Self {
        Self {
            allow_stacking: true,
            max_coupons: None,
        }
    }
}

/// Shipping configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingConfig {
    /// Zones, matched in declaration order.
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,

    /// Cubic centimetres per kilogram for volumetric weight.
    /// Without it, actual weight is billed.
    #[serde(default)]
    pub volumetric_divisor: Option<u32>,
}

impl ShippingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.volumetric_divisor == Some(0) {
            return Err(ConfigError::Invalid(
                "shipping.volumetric_divisor must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate shipping zone id: {}",
                    zone.id
                )));
            }
            zone.validate()?;
        }
        Ok(())
    }
}

/// A shipping zone and its rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone identifier.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// ISO country codes covered by the zone.
    pub countries: Vec<String>,

    /// Region codes narrowing the zone (empty = whole country).
    #[serde(default)]
    pub regions: Vec<String>,

    /// Postal code prefixes narrowing the zone (empty = any).
    #[serde(default)]
    pub postal_prefixes: Vec<String>,

    /// Flat rate for any shipment into the zone.
    pub base_rate_cents: i64,

    /// Weight breakpoints, ascending by `from_grams`.
    #[serde(default)]
    pub tiers: Vec<WeightTier>,

    /// Minor units per kilogram charged beyond the last breakpoint.
    #[serde(default)]
    pub per_kg_beyond_last: Option<Decimal>,
}

impl ZoneConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| ConfigError::Invalid(format!("zone {}: {}", self.id, msg));

        if self.countries.is_empty() {
            return Err(invalid("at least one country is required".to_string()));
        }
        if self.base_rate_cents < 0 {
            return Err(invalid("base rate must not be negative".to_string()));
        }
        if let Some(rate) = self.per_kg_beyond_last {
            if rate.is_sign_negative() {
                return Err(invalid("per-kg rate must not be negative".to_string()));
            }
        }

        let mut previous: Option<&WeightTier> = None;
        for tier in &self.tiers {
            if tier.surcharge_cents < 0 {
                return Err(invalid(format!(
                    "tier at {}g has a negative surcharge",
                    tier.from_grams
                )));
            }
            if let Some(prev) = previous {
                if tier.from_grams <= prev.from_grams {
                    return Err(invalid(format!(
                        "tiers must be strictly ascending, {}g follows {}g",
                        tier.from_grams, prev.from_grams
                    )));
                }
                if tier.surcharge_cents < prev.surcharge_cents {
                    return Err(invalid(format!(
                        "surcharge decreases at {}g",
                        tier.from_grams
                    )));
                }
            }
            previous = Some(tier);
        }
        Ok(())
    }
}

/// A weight breakpoint: shipments of at least `from_grams` pay `surcharge_cents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTier {
    pub from_grams: u64,
    pub surcharge_cents: i64,
}

/// Call policy settings for each collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorPolicies {
    #[serde(default = "CollaboratorPolicies::default_catalog")]
    pub catalog: CallPolicyConfig,
    #[serde(default = "CollaboratorPolicies::default_coupons")]
    pub coupons: CallPolicyConfig,
    #[serde(default = "CollaboratorPolicies::default_shipping")]
    pub shipping: CallPolicyConfig,
    #[serde(default = "CollaboratorPolicies::default_orders")]
    pub orders: CallPolicyConfig,
}

impl CollaboratorPolicies {
    fn default_catalog() -> CallPolicyConfig {
        CallPolicyConfig::for_collaborator(Collaborator::Catalog)
    }

    fn default_coupons() -> CallPolicyConfig {
        CallPolicyConfig::for_collaborator(Collaborator::Coupons)
    }

    fn default_shipping() -> CallPolicyConfig {
        CallPolicyConfig::for_collaborator(Collaborator::Shipping)
    }

    fn default_orders() -> CallPolicyConfig {
        CallPolicyConfig::for_collaborator(Collaborator::Orders)
    }

    /// Resolve the runtime policy for a collaborator.
    pub fn policy(&self, collaborator: Collaborator) -> CallPolicy {
        match collaborator {
            Collaborator::Catalog => self.catalog.to_policy(),
            Collaborator::Coupons => self.coupons.to_policy(),
            Collaborator::Shipping => self.shipping.to_policy(),
            Collaborator::Orders => self.orders.to_policy(),
        }
    }
}

impl Default for CollaboratorPolicies {
    fn default() -> Self {
        Self {
            catalog: Self::default_catalog(),
            coupons: Self::default_coupons(),
            shipping: Self::default_shipping(),
            orders: Self::default_orders(),
        }
    }
}

/// Serializable form of a [`CallPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPolicyConfig {
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    /// Zero disables backoff delays.
    #[serde(default)]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub backoff_max_ms: u64,
}

impl CallPolicyConfig {
    /// The collaborator's built-in defaults.
    pub fn for_collaborator(collaborator: Collaborator) -> Self {
        let policy = CallPolicy::for_collaborator(collaborator);
        let (base, max) = match policy.backoff {
            BackoffStrategy::Exponential { base, max } => (base, max),
            _ => (Duration::ZERO, Duration::ZERO),
        };
        Self {
            timeout_ms: policy.timeout.as_millis() as u64,
            max_retries: policy.max_retries,
            backoff_base_ms: base.as_millis() as u64,
            backoff_max_ms: max.as_millis() as u64,
        }
    }

    /// Convert to a runtime policy.
    pub fn to_policy(&self) -> CallPolicy {
        let backoff = if self.backoff_base_ms == 0 {
            BackoffStrategy::None
        } else {
            BackoffStrategy::Exponential {
                base: Duration::from_millis(self.backoff_base_ms),
                max: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
            }
        };
        CallPolicy::new(Duration::from_millis(self.timeout_ms), self.max_retries).with_backoff(backoff)
    }
}
