//! Shipping zones and rate tables.

use crate::config::{ShippingConfig, ZoneConfig};
use crate::error::CollaboratorError;
use crate::ids::ZoneId;
use crate::money::{Currency, Money};
use crate::shipping::destination::normalize_postal;
use crate::shipping::Destination;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A shipping zone with its flat rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub base_rate: Money,
}

/// The shipping rate collaborator.
#[async_trait]
pub trait ShippingRateProvider: Send + Sync {
    /// Find the zone covering a destination.
    async fn lookup_zone(&self, destination: &Destination)
        -> Result<Option<Zone>, CollaboratorError>;

    /// Weight-dependent surcharge for a shipment into `zone`.
    async fn surcharge(&self, zone: &Zone, weight_grams: u64) -> Result<Money, CollaboratorError>;
}

/// Rate tables built from [`ShippingConfig`].
#[derive(Debug, Clone)]
pub struct RateTable {
    zones: Vec<ZoneConfig>,
    currency: Currency,
}

impl RateTable {
    pub fn new(config: &ShippingConfig, currency: Currency) -> Self {
        Self {
            zones: config.zones.clone(),
            currency,
        }
    }

    /// First zone, in declaration order, covering the destination.
    pub fn find_zone(&self, destination: &Destination) -> Option<Zone> {
        self.zones
            .iter()
            .find(|zone| covers(zone, destination))
            .map(|zone| self.zone(zone))
    }

    /// Tiered surcharge for a zone, or `None` for an unknown zone or on overflow.
    pub fn surcharge_for(&self, zone_id: &ZoneId, weight_grams: u64) -> Option<Money> {
        let zone = self.zones.iter().find(|z| z.id == zone_id.as_str())?;
        tiered_surcharge(zone, weight_grams, self.currency)
    }

    fn zone(&self, config: &ZoneConfig) -> Zone {
        Zone {
            id: ZoneId::new(config.id.as_str()),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            base_rate: Money::new(config.base_rate_cents, self.currency),
        }
    }
}

#[async_trait]
impl ShippingRateProvider for RateTable {
    async fn lookup_zone(
        &self,
        destination: &Destination,
    ) -> Result<Option<Zone>, CollaboratorError> {
        Ok(self.find_zone(destination))
    }

    async fn surcharge(&self, zone: &Zone, weight_grams: u64) -> Result<Money, CollaboratorError> {
        self.surcharge_for(&zone.id, weight_grams).ok_or_else(|| {
            CollaboratorError::Unavailable(format!(
                "no surcharge for zone {} at {}g",
                zone.id, weight_grams
            ))
        })
    }
}

fn covers(zone: &ZoneConfig, destination: &Destination) -> bool {
    let country = zone
        .countries
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&destination.country_code));
    if !country {
        return false;
    }

    let region = zone.regions.is_empty()
        || destination.region_code.as_ref().is_some_and(|code| {
            zone.regions.iter().any(|r| r.eq_ignore_ascii_case(code))
        });

    let postal = zone.postal_prefixes.is_empty()
        || destination.normalized_postal_code().is_some_and(|zip| {
            zone.postal_prefixes
                .iter()
                .any(|prefix| zip.starts_with(&normalize_postal(prefix)))
        });

    region && postal
}

/// Highest breakpoint at or below the weight, plus the per-kg rate for any
/// weight past the last breakpoint. Rounded half-up once.
fn tiered_surcharge(zone: &ZoneConfig, weight_grams: u64, currency: Currency) -> Option<Money> {
    let tier = zone
        .tiers
        .iter()
        .rev()
        .find(|tier| tier.from_grams <= weight_grams)
        .map(|tier| tier.surcharge_cents)
        .unwrap_or(0);

    let last_breakpoint = zone.tiers.last().map(|t| t.from_grams).unwrap_or(0);
    let beyond = match zone.per_kg_beyond_last {
        Some(rate) if weight_grams > last_breakpoint => {
            let excess_kg = Decimal::from(weight_grams - last_breakpoint) / Decimal::from(1000);
            Money::from_minor_units(rate.checked_mul(excess_kg)?, currency)?
        }
        _ => Money::zero(currency),
    };

    Money::new(tier, currency).try_add(&beyond)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightTier;
    use rust_decimal_macros::dec;

    fn zone(id: &str, countries: &[&str]) -> ZoneConfig {
        ZoneConfig {
            id: id.to_string(),
            name: None,
            countries: countries.iter().map(|c| c.to_string()).collect(),
            regions: vec![],
            postal_prefixes: vec![],
            base_rate_cents: 500,
            tiers: vec![
                WeightTier {
                    from_grams: 0,
                    surcharge_cents: 0,
                },
                WeightTier {
                    from_grams: 1000,
                    surcharge_cents: 250,
                },
                WeightTier {
                    from_grams: 5000,
                    surcharge_cents: 900,
                },
            ],
            per_kg_beyond_last: None,
        }
    }

    fn table(zones: Vec<ZoneConfig>) -> RateTable {
        RateTable::new(
            &ShippingConfig {
                zones,
                volumetric_divisor: None,
            },
            Currency::USD,
        )
    }

    #[test]
    fn test_first_matching_zone_wins() {
        let mut hawaii = zone("hawaii", &["US"]);
        hawaii.regions = vec!["HI".to_string()];
        let table = table(vec![hawaii, zone("domestic", &["US"])]);

        let honolulu = Destination::new("US").with_region("HI");
        assert_eq!(table.find_zone(&honolulu).unwrap().id.as_str(), "hawaii");

        let austin = Destination::new("us").with_region("TX");
        assert_eq!(table.find_zone(&austin).unwrap().id.as_str(), "domestic");

        assert!(table.find_zone(&Destination::new("FR")).is_none());
    }

    #[test]
    fn test_postal_prefix_narrowing() {
        let mut highlands = zone("highlands", &["GB"]);
        highlands.postal_prefixes = vec!["iv".to_string(), "KW".to_string()];
        let table = table(vec![highlands]);

        let inverness = Destination::new("GB").with_postal_code("IV2 3AB");
        assert!(table.find_zone(&inverness).is_some());

        let london = Destination::new("GB").with_postal_code("SW1A 1AA");
        assert!(table.find_zone(&london).is_none());
        assert!(table.find_zone(&Destination::new("GB")).is_none());
    }

    #[test]
    fn test_spaced_postal_prefix() {
        let mut ottawa = zone("ottawa", &["CA"]);
        ottawa.postal_prefixes = vec!["K1A 0".to_string()];
        let mut westminster = zone("westminster", &["GB"]);
        westminster.postal_prefixes = vec![" sw1a 1".to_string()];
        let table = table(vec![ottawa, westminster]);

        let parliament = Destination::new("CA").with_postal_code("K1A 0B1");
        assert_eq!(table.find_zone(&parliament).unwrap().id.as_str(), "ottawa");

        let unspaced = Destination::new("CA").with_postal_code("k1a0b1");
        assert!(table.find_zone(&unspaced).is_some());

        let downing = Destination::new("GB").with_postal_code("SW1A 2AA");
        assert!(table.find_zone(&downing).is_none());
        let palace = Destination::new("GB").with_postal_code("SW1A 1AA");
        assert_eq!(table.find_zone(&palace).unwrap().id.as_str(), "westminster");
    }

    #[test]
    fn test_surcharge_tiers() {
        let table = table(vec![zone("domestic", &["US"])]);
        let id = ZoneId::new("domestic");
        let cents = |grams| table.surcharge_for(&id, grams).unwrap().amount_cents;

        assert_eq!(cents(0), 0);
        assert_eq!(cents(999), 0);
        assert_eq!(cents(1000), 250);
        assert_eq!(cents(4999), 250);
        assert_eq!(cents(20000), 900);
        assert!(table.surcharge_for(&ZoneId::new("mars"), 10).is_none());
    }

    #[test]
    fn test_per_kg_beyond_last_tier() {
        let mut domestic = zone("domestic", &["US"]);
        domestic.per_kg_beyond_last = Some(dec!(150));
        let table = table(vec![domestic]);
        let id = ZoneId::new("domestic");

        // 2.5kg past the 5kg breakpoint at 150/kg
        assert_eq!(table.surcharge_for(&id, 7500).unwrap().amount_cents, 900 + 375);
        // 0.003kg * 150 = 0.45, rounds down
        assert_eq!(table.surcharge_for(&id, 5003).unwrap().amount_cents, 900);
        // 0.005kg * 150 = 0.75, rounds up
        assert_eq!(table.surcharge_for(&id, 5005).unwrap().amount_cents, 901);
    }

    #[tokio::test]
    async fn test_provider_interface() {
        let table = table(vec![zone("domestic", &["US"])]);
        let zone = table
            .lookup_zone(&Destination::new("US"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(zone.name, "domestic");
        assert_eq!(zone.base_rate, Money::new(500, Currency::USD));
        assert_eq!(
            table.surcharge(&zone, 1200).await.unwrap(),
            Money::new(250, Currency::USD)
        );
    }
}
