//! Mutable player state and its persisted (partial) form.

use crate::{validate_state, AssetId, EconomyConfig, EquipmentId, ValidationError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;
use tracing::warn;

/// Settlement state of a withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Processed,
}

/// Record appended to the withdrawal log for every successful withdrawal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// Amount debited from the balance.
    pub requested: Decimal,
    /// Fee retained out of `requested`.
    pub fee: Decimal,
    /// Amount paid out (`requested - fee`).
    pub net: Decimal,
    /// Trimmed destination wallet address.
    pub address: String,
    pub timestamp: DateTime<Utc>,
    pub status: WithdrawalStatus,
}

/// Complete player state. Mutated only through the economy operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Spendable USD balance (>= 0).
    pub balance: Decimal,
    /// Mined, unconverted amount per asset (>= 0).
    pub holdings: BTreeMap<AssetId, f64>,
    /// Owned units per equipment id.
    pub equipment: BTreeMap<EquipmentId, u32>,
    /// Sum of count x hashrate over owned equipment.
    pub total_hashrate: f64,
    /// Per-asset mining switch.
    pub mining: BTreeMap<AssetId, bool>,
    /// Current market price per asset, never below the configured floor.
    pub prices: BTreeMap<AssetId, Decimal>,
    /// Bounded price history per asset, oldest first.
    pub price_history: BTreeMap<AssetId, VecDeque<Decimal>>,
    /// Withdrawal log, most recent first.
    pub withdrawals: VecDeque<WithdrawalReceipt>,
    /// Time of the last production tick that credited holdings.
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl GameState {
    /// Default state: empty balance, no equipment, initial prices.
    pub fn new(cfg: &EconomyConfig) -> Self {
        let mut prices = BTreeMap::new();
        let mut price_history = BTreeMap::new();
        for asset in AssetId::ALL {
            let p = cfg.initial_price(asset);
            prices.insert(asset, p);
            price_history.insert(asset, VecDeque::from([p]));
        }
        Self {
            balance: Decimal::ZERO,
            holdings: AssetId::ALL.into_iter().map(|a| (a, 0.0)).collect(),
            equipment: EquipmentId::ALL.into_iter().map(|e| (e, 0)).collect(),
            total_hashrate: 0.0,
            mining: AssetId::ALL.into_iter().map(|a| (a, false)).collect(),
            prices,
            price_history,
            withdrawals: VecDeque::new(),
            last_tick_at: None,
        }
    }

    /// Default state for a brand new player, funded with the starting bonus.
    pub fn with_starting_bonus(cfg: &EconomyConfig) -> Self {
        let mut state = Self::new(cfg);
        state.balance = cfg.starting_bonus;
        state
    }

    /// Merge a persisted state over the defaults.
    ///
    /// Persisted fields win, per key for the per-asset and per-equipment
    /// tables; unknown keys are skipped. Derived and bounded fields are
    /// re-established: hashrate is recomputed from the equipment counts,
    /// prices are clamped to their floors and histories trimmed to the cap.
    pub fn restore(cfg: &EconomyConfig, persisted: PersistedState) -> Result<Self, ValidationError> {
        let mut state = Self::new(cfg);
        if let Some(balance) = persisted.balance {
            state.balance = balance;
        }
        merge_keyed(&mut state.holdings, persisted.holdings, "holdings");
        merge_keyed(&mut state.equipment, persisted.equipment, "equipment");
        merge_keyed(&mut state.mining, persisted.mining, "mining");
        merge_keyed(&mut state.prices, persisted.prices, "prices");

        let mut histories: BTreeMap<AssetId, Vec<Decimal>> = BTreeMap::new();
        merge_keyed(&mut histories, persisted.price_history, "price_history");
        for (asset, entries) in histories {
            let mut history = VecDeque::with_capacity(cfg.price_history_cap);
            for p in entries {
                push_bounded(&mut history, p.max(cfg.min_price(asset)), cfg.price_history_cap);
            }
            if !history.is_empty() {
                state.price_history.insert(asset, history);
            }
        }
        for asset in AssetId::ALL {
            let floor = cfg.min_price(asset);
            if let Some(p) = state.prices.get_mut(&asset) {
                if *p < floor {
                    warn!(%asset, price = %p, %floor, "restored price below floor, clamping");
                    *p = floor;
                }
            }
        }

        if let Some(log) = persisted.withdrawals {
            state.withdrawals = log.into();
        }
        state.last_tick_at = persisted.last_tick_at;

        let recomputed = cfg.hashrate_of(&state.equipment);
        if let Some(saved) = persisted.total_hashrate {
            if saved != recomputed {
                warn!(saved, recomputed, "saved hashrate disagrees with equipment, recomputing");
            }
        }
        state.total_hashrate = recomputed;

        validate_state(&state)?;
        Ok(state)
    }

    pub fn holding(&self, asset: AssetId) -> f64 {
        self.holdings.get(&asset).copied().unwrap_or(0.0)
    }

    pub fn owned(&self, id: EquipmentId) -> u32 {
        self.equipment.get(&id).copied().unwrap_or(0)
    }

    pub fn is_mining(&self, asset: AssetId) -> bool {
        self.mining.get(&asset).copied().unwrap_or(false)
    }

    pub fn price(&self, asset: AssetId) -> Decimal {
        self.prices.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Price history of `asset`, oldest first.
    pub fn history(&self, asset: AssetId) -> impl Iterator<Item = Decimal> + '_ {
        self.price_history
            .get(&asset)
            .into_iter()
            .flat_map(|h| h.iter().copied())
    }

    pub fn history_len(&self, asset: AssetId) -> usize {
        self.price_history.get(&asset).map_or(0, VecDeque::len)
    }

    /// Set the current price of `asset` and append it to the history,
    /// evicting the oldest entries beyond `cap`.
    pub fn record_price(&mut self, asset: AssetId, price: Decimal, cap: usize) {
        self.prices.insert(asset, price);
        let history = self.price_history.entry(asset).or_default();
        push_bounded(history, price, cap);
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, cap: usize) {
    buf.push_back(value);
    while buf.len() > cap {
        buf.pop_front();
    }
}

fn merge_keyed<K, V>(target: &mut BTreeMap<K, V>, source: BTreeMap<String, V>, table: &str)
where
    K: Ord + FromStr,
{
    for (key, value) in source {
        match key.parse::<K>() {
            Ok(k) => {
                target.insert(k, value);
            }
            Err(_) => warn!(table, key = %key, "ignoring unknown key in saved state"),
        }
    }
}

/// Lenient mirror of [`GameState`] used when reading saves written by any
/// version: every field is optional and table keys stay as strings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub balance: Option<Decimal>,
    pub holdings: BTreeMap<String, f64>,
    pub equipment: BTreeMap<String, u32>,
    pub total_hashrate: Option<f64>,
    pub mining: BTreeMap<String, bool>,
    pub prices: BTreeMap<String, Decimal>,
    pub price_history: BTreeMap<String, Vec<Decimal>>,
    pub withdrawals: Option<Vec<WithdrawalReceipt>>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EconomyConfig {
        EconomyConfig::default()
    }

    #[test]
    fn fresh_state_has_bonus_and_initial_prices() {
        let s = GameState::with_starting_bonus(&cfg());
        assert_eq!(s.balance, Decimal::new(1_000, 0));
        assert_eq!(s.price(AssetId::Bitcoin), Decimal::new(45_000, 0));
        assert_eq!(s.history(AssetId::Dogecoin).collect::<Vec<_>>(), vec![Decimal::new(8, 2)]);
        assert_eq!(s.total_hashrate, 0.0);
        assert!(AssetId::ALL.iter().all(|a| !s.is_mining(*a)));
    }

    #[test]
    fn empty_save_restores_default_without_bonus() {
        let persisted: PersistedState = serde_json::from_str("{}").unwrap();
        let s = GameState::restore(&cfg(), persisted).unwrap();
        assert_eq!(s, GameState::new(&cfg()));
        assert_eq!(s.balance, Decimal::ZERO);
    }

    #[test]
    fn full_state_json_roundtrip_through_restore() {
        let c = cfg();
        let mut s = GameState::with_starting_bonus(&c);
        s.equipment.insert(EquipmentId::GpuMid, 2);
        s.total_hashrate = c.hashrate_of(&s.equipment);
        s.holdings.insert(AssetId::Ethereum, 0.25);
        s.mining.insert(AssetId::Ethereum, true);
        s.record_price(AssetId::Ethereum, Decimal::new(3_100, 0), c.price_history_cap);
        let text = serde_json::to_string(&s).unwrap();
        let persisted: PersistedState = serde_json::from_str(&text).unwrap();
        let back = GameState::restore(&c, persisted).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn restore_merges_partial_tables_and_skips_unknown_keys() {
        let text = r#"{
            "balance": "250.5",
            "equipment": { "gpu-basic": 3, "quantum-rig": 9 },
            "mining": { "litecoin": true },
            "total_hashrate": 1
        }"#;
        let persisted: PersistedState = serde_json::from_str(text).unwrap();
        let s = GameState::restore(&cfg(), persisted).unwrap();
        assert_eq!(s.balance, Decimal::new(2_505, 1));
        assert_eq!(s.owned(EquipmentId::GpuBasic), 3);
        assert_eq!(s.owned(EquipmentId::Farm), 0);
        assert_eq!(s.total_hashrate, 60.0);
        assert!(s.is_mining(AssetId::Litecoin));
        assert!(!s.is_mining(AssetId::Bitcoin));
        assert_eq!(s.holding(AssetId::Bitcoin), 0.0);
    }

    #[test]
    fn restore_clamps_prices_and_trims_history() {
        let c = cfg();
        let history: Vec<String> = (0..80).map(|i| format!("\"{}\"", 30_000 + i)).collect();
        let text = format!(
            r#"{{ "prices": {{ "bitcoin": "5" }}, "price_history": {{ "bitcoin": [{}] }} }}"#,
            history.join(",")
        );
        let persisted: PersistedState = serde_json::from_str(&text).unwrap();
        let s = GameState::restore(&c, persisted).unwrap();
        assert_eq!(s.price(AssetId::Bitcoin), Decimal::new(20_000, 0));
        assert_eq!(s.history_len(AssetId::Bitcoin), c.price_history_cap);
        assert_eq!(s.history(AssetId::Bitcoin).next(), Some(Decimal::new(30_030, 0)));
    }

    #[test]
    fn restore_rejects_negative_balance() {
        let persisted: PersistedState = serde_json::from_str(r#"{ "balance": "-1" }"#).unwrap();
        assert_eq!(
            GameState::restore(&cfg(), persisted),
            Err(ValidationError::NegativeMoney)
        );
    }

    #[test]
    fn record_price_evicts_oldest_first() {
        let mut s = GameState::new(&cfg());
        for i in 1..=5 {
            s.record_price(AssetId::Litecoin, Decimal::from(i), 3);
        }
        assert_eq!(
            s.history(AssetId::Litecoin).collect::<Vec<_>>(),
            vec![Decimal::from(3), Decimal::from(4), Decimal::from(5)]
        );
        assert_eq!(s.price(AssetId::Litecoin), Decimal::from(5));
    }
}
