#![deny(warnings)]

//! Core domain models and invariants for the crypto miner economy.
//!
//! This crate defines the serializable configuration and game state shared
//! by the economy algorithms, the persistence gateway and the runtime, with
//! validation helpers to guarantee basic invariants.

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

mod state;

pub use state::{GameState, PersistedState, WithdrawalReceipt, WithdrawalStatus};

/// A simulated crypto-asset that can be mined and converted.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AssetId {
    Bitcoin,
    Ethereum,
    Dogecoin,
    Litecoin,
}

impl AssetId {
    /// Every asset, in display order.
    pub const ALL: [AssetId; 4] = [
        AssetId::Bitcoin,
        AssetId::Ethereum,
        AssetId::Dogecoin,
        AssetId::Litecoin,
    ];

    /// Stable identifier used in saves and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            AssetId::Bitcoin => "bitcoin",
            AssetId::Ethereum => "ethereum",
            AssetId::Dogecoin => "dogecoin",
            AssetId::Litecoin => "litecoin",
        }
    }

    /// Short ticker shown next to amounts.
    pub fn ticker(self) -> &'static str {
        match self {
            AssetId::Bitcoin => "BTC",
            AssetId::Ethereum => "ETH",
            AssetId::Dogecoin => "DOGE",
            AssetId::Litecoin => "LTC",
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetId::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownId(s.to_string()))
    }
}

/// A piece of mining equipment from the catalog.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentId {
    GpuBasic,
    GpuMid,
    GpuHigh,
    AsicBasic,
    AsicPro,
    Farm,
}

impl EquipmentId {
    /// Every catalog entry, cheapest first.
    pub const ALL: [EquipmentId; 6] = [
        EquipmentId::GpuBasic,
        EquipmentId::GpuMid,
        EquipmentId::GpuHigh,
        EquipmentId::AsicBasic,
        EquipmentId::AsicPro,
        EquipmentId::Farm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentId::GpuBasic => "gpu-basic",
            EquipmentId::GpuMid => "gpu-mid",
            EquipmentId::GpuHigh => "gpu-high",
            EquipmentId::AsicBasic => "asic-basic",
            EquipmentId::AsicPro => "asic-pro",
            EquipmentId::Farm => "farm",
        }
    }
}

impl fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquipmentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EquipmentId::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownId(s.to_string()))
    }
}

/// Catalog entry for a piece of equipment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpec {
    /// Hashrate contributed per owned unit (> 0).
    pub hashrate: f64,
    /// Purchase price in USD (> 0).
    pub price: Decimal,
    /// Power draw in watts (> 0). Display only.
    pub power: f64,
}

/// Static economy tables and tuning constants, loaded once at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Equipment catalog.
    pub equipment: BTreeMap<EquipmentId, EquipmentSpec>,
    /// Per-asset difficulty scaling hashrate into hourly yield.
    pub difficulty: BTreeMap<AssetId, f64>,
    /// Per-asset price floor.
    pub min_price: BTreeMap<AssetId, Decimal>,
    /// Per-asset price of a fresh game.
    pub initial_price: BTreeMap<AssetId, Decimal>,
    /// Balance granted when no save exists.
    pub starting_bonus: Decimal,
    /// Smallest amount accepted for a withdrawal.
    pub withdrawal_minimum: Decimal,
    /// Fraction of a withdrawal kept as fee, in [0, 1).
    pub withdrawal_fee_rate: Decimal,
    /// Maximum retained price history entries per asset.
    pub price_history_cap: usize,
    /// Half-width of the multiplicative mining noise, in [0, 1).
    pub reward_noise: f64,
    /// Half-width of the per-drift relative price change, in [0, 1].
    pub price_volatility: f64,
    /// Production ticks per nominal hour.
    pub seconds_per_hour: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        let spec = |hashrate: f64, price: i64, power: f64| EquipmentSpec {
            hashrate,
            price: Decimal::new(price, 0),
            power,
        };
        let equipment = BTreeMap::from([
            (EquipmentId::GpuBasic, spec(20.0, 300, 120.0)),
            (EquipmentId::GpuMid, spec(60.0, 800, 220.0)),
            (EquipmentId::GpuHigh, spec(120.0, 1_600, 450.0)),
            (EquipmentId::AsicBasic, spec(1_000.0, 5_000, 1_350.0)),
            (EquipmentId::AsicPro, spec(5_000.0, 15_000, 3_250.0)),
            (EquipmentId::Farm, spec(25_000.0, 100_000, 15_000.0)),
        ]);
        let difficulty = BTreeMap::from([
            (AssetId::Bitcoin, 0.000_001),
            (AssetId::Ethereum, 0.000_005),
            (AssetId::Dogecoin, 0.001),
            (AssetId::Litecoin, 0.000_1),
        ]);
        let min_price = BTreeMap::from([
            (AssetId::Bitcoin, Decimal::new(20_000, 0)),
            (AssetId::Ethereum, Decimal::new(1_000, 0)),
            (AssetId::Dogecoin, Decimal::new(1, 2)), // 0.01
            (AssetId::Litecoin, Decimal::new(20, 0)),
        ]);
        let initial_price = BTreeMap::from([
            (AssetId::Bitcoin, Decimal::new(45_000, 0)),
            (AssetId::Ethereum, Decimal::new(3_200, 0)),
            (AssetId::Dogecoin, Decimal::new(8, 2)), // 0.08
            (AssetId::Litecoin, Decimal::new(75, 0)),
        ]);
        Self {
            equipment,
            difficulty,
            min_price,
            initial_price,
            starting_bonus: Decimal::new(1_000, 0),
            withdrawal_minimum: Decimal::new(10, 0),
            withdrawal_fee_rate: Decimal::new(2, 2),
            price_history_cap: 50,
            reward_noise: 0.2,
            price_volatility: 0.05,
            seconds_per_hour: 3_600.0,
        }
    }
}

impl EconomyConfig {
    /// Parse and validate a YAML economy definition.
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: EconomyConfig =
            serde_yaml::from_str(text).context("failed to parse economy config")?;
        validate_config(&cfg)?;
        Ok(cfg)
    }

    /// Read, parse and validate a YAML economy definition from disk.
    pub fn load_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read economy config {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    pub fn equipment_spec(&self, id: EquipmentId) -> Option<&EquipmentSpec> {
        self.equipment.get(&id)
    }

    pub fn difficulty(&self, asset: AssetId) -> f64 {
        self.difficulty.get(&asset).copied().unwrap_or(0.0)
    }

    pub fn min_price(&self, asset: AssetId) -> Decimal {
        self.min_price.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn initial_price(&self, asset: AssetId) -> Decimal {
        self.initial_price
            .get(&asset)
            .copied()
            .unwrap_or_else(|| self.min_price(asset))
    }

    /// Hashrate implied by a set of equipment counts.
    pub fn hashrate_of(&self, owned: &BTreeMap<EquipmentId, u32>) -> f64 {
        owned
            .iter()
            .filter_map(|(id, &count)| {
                self.equipment_spec(*id)
                    .map(|spec| f64::from(count) * spec.hashrate)
            })
            .sum()
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Identifier does not name a known asset or equipment.
    #[error("unknown identifier: {0}")]
    UnknownId(String),
    /// A fixed asset or equipment entry is absent from a table.
    #[error("missing config entry: {0}")]
    MissingEntry(String),
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Value must be strictly positive.
    #[error("{0} must be > 0")]
    NonPositive(String),
    /// Price or balance must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// Rate must lie within its documented range.
    #[error("rate out of range: {0}")]
    RateOutOfRange(String),
    /// Initial price set below the floor.
    #[error("initial price of {0} is below its floor")]
    PriceBelowFloor(AssetId),
}

/// Validate an equipment catalog entry.
pub fn validate_equipment(id: EquipmentId, spec: &EquipmentSpec) -> Result<(), ValidationError> {
    if !spec.hashrate.is_finite() || !spec.power.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if spec.hashrate <= 0.0 || spec.power <= 0.0 || spec.price <= Decimal::ZERO {
        return Err(ValidationError::NonPositive(id.to_string()));
    }
    Ok(())
}

/// Validate the whole economy configuration, including that every fixed
/// asset and equipment id is present.
pub fn validate_config(cfg: &EconomyConfig) -> Result<(), ValidationError> {
    for id in EquipmentId::ALL {
        let spec = cfg
            .equipment
            .get(&id)
            .ok_or_else(|| ValidationError::MissingEntry(id.to_string()))?;
        validate_equipment(id, spec)?;
    }
    for asset in AssetId::ALL {
        let difficulty = cfg
            .difficulty
            .get(&asset)
            .ok_or_else(|| ValidationError::MissingEntry(format!("difficulty.{asset}")))?;
        if !difficulty.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        if *difficulty <= 0.0 {
            return Err(ValidationError::NonPositive(format!("difficulty.{asset}")));
        }
        let floor = cfg
            .min_price
            .get(&asset)
            .ok_or_else(|| ValidationError::MissingEntry(format!("min_price.{asset}")))?;
        if *floor <= Decimal::ZERO {
            return Err(ValidationError::NonPositive(format!("min_price.{asset}")));
        }
        let initial = cfg
            .initial_price
            .get(&asset)
            .ok_or_else(|| ValidationError::MissingEntry(format!("initial_price.{asset}")))?;
        if initial < floor {
            return Err(ValidationError::PriceBelowFloor(asset));
        }
    }
    if cfg.starting_bonus < Decimal::ZERO || cfg.withdrawal_minimum < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    if cfg.withdrawal_fee_rate < Decimal::ZERO || cfg.withdrawal_fee_rate >= Decimal::ONE {
        return Err(ValidationError::RateOutOfRange("withdrawal_fee_rate".into()));
    }
    if cfg.price_history_cap == 0 {
        return Err(ValidationError::NonPositive("price_history_cap".into()));
    }
    if !(cfg.reward_noise.is_finite()
        && cfg.price_volatility.is_finite()
        && cfg.seconds_per_hour.is_finite())
    {
        return Err(ValidationError::NonFinite);
    }
    if !(0.0..1.0).contains(&cfg.reward_noise) {
        return Err(ValidationError::RateOutOfRange("reward_noise".into()));
    }
    if !(0.0..=1.0).contains(&cfg.price_volatility) {
        return Err(ValidationError::RateOutOfRange("price_volatility".into()));
    }
    if cfg.seconds_per_hour <= 0.0 {
        return Err(ValidationError::NonPositive("seconds_per_hour".into()));
    }
    Ok(())
}

/// Validate the invariants of a game state that must hold after every
/// engine operation.
pub fn validate_state(state: &GameState) -> Result<(), ValidationError> {
    if state.balance < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    if !state.total_hashrate.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    for (asset, amount) in &state.holdings {
        if !amount.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        if *amount < 0.0 {
            return Err(ValidationError::NonPositive(format!("holdings.{asset}")));
        }
    }
    for (asset, price) in &state.prices {
        if *price <= Decimal::ZERO {
            return Err(ValidationError::NonPositive(format!("prices.{asset}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EconomyConfig::default();
        validate_config(&cfg).unwrap();
        assert_eq!(cfg.equipment.len(), EquipmentId::ALL.len());
        assert_eq!(
            cfg.equipment_spec(EquipmentId::Farm).unwrap().price,
            Decimal::new(100_000, 0)
        );
    }

    #[test]
    fn shipped_yaml_matches_defaults() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/economy.yaml");
        let cfg = EconomyConfig::load_yaml(path).unwrap();
        assert_eq!(cfg, EconomyConfig::default());
    }

    #[test]
    fn yaml_roundtrip_config() {
        let cfg = EconomyConfig::default();
        let s = serde_yaml::to_string(&cfg).unwrap();
        let back = EconomyConfig::from_yaml_str(&s).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn missing_equipment_is_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.equipment.remove(&EquipmentId::AsicPro);
        assert_eq!(
            validate_config(&cfg),
            Err(ValidationError::MissingEntry("asic-pro".into()))
        );
    }

    #[test]
    fn initial_price_below_floor_is_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.initial_price
            .insert(AssetId::Litecoin, Decimal::new(19, 0));
        assert_eq!(
            validate_config(&cfg),
            Err(ValidationError::PriceBelowFloor(AssetId::Litecoin))
        );
    }

    #[test]
    fn fee_rate_must_be_fractional() {
        let mut cfg = EconomyConfig::default();
        cfg.withdrawal_fee_rate = Decimal::ONE;
        assert!(matches!(
            validate_config(&cfg),
            Err(ValidationError::RateOutOfRange(_))
        ));
    }

    #[test]
    fn ids_parse_from_their_names() {
        for asset in AssetId::ALL {
            assert_eq!(asset.as_str().parse::<AssetId>().unwrap(), asset);
        }
        for id in EquipmentId::ALL {
            assert_eq!(id.as_str().parse::<EquipmentId>().unwrap(), id);
        }
        assert!("monero".parse::<AssetId>().is_err());
    }

    #[test]
    fn ids_serialize_as_kebab_case() {
        let s = serde_json::to_string(&EquipmentId::AsicBasic).unwrap();
        assert_eq!(s, "\"asic-basic\"");
        let s = serde_json::to_string(&AssetId::Dogecoin).unwrap();
        assert_eq!(s, "\"dogecoin\"");
    }

    proptest! {
        #[test]
        fn hashrate_is_sum_of_counts(counts in proptest::collection::vec(0u32..50, 6)) {
            let cfg = EconomyConfig::default();
            let owned: BTreeMap<EquipmentId, u32> =
                EquipmentId::ALL.into_iter().zip(counts.iter().copied()).collect();
            let mut expected = 0.0;
            for (id, n) in &owned {
                expected += f64::from(*n) * cfg.equipment[id].hashrate;
            }
            prop_assert_eq!(cfg.hashrate_of(&owned), expected);
        }
    }
}
