#![deny(warnings)]

//! Economic models for the crypto miner: production and price drift.
//!
//! This crate provides validated, side-effect free utilities for:
//! - Per-tick mining rewards with multiplicative uniform noise
//! - Expected hourly earnings used for projections
//! - Random-walk price drift with a per-asset floor and bounded history
//! - Player transactions (purchase, mining toggle, conversion, withdrawal),
//!   see [`transactions`]
//!
//! Randomness is drawn through [`RandomSource`] so callers can substitute a
//! seeded generator or a scripted sequence.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{AssetId, EconomyConfig, GameState};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

pub mod transactions;

pub use transactions::{
    buy_equipment, convert, parse_amount, set_mining, withdraw, Conversion, Purchase,
};

/// Decimal places kept on prices and money amounts.
pub const MONEY_DP: u32 = 8;

/// Errors produced by player actions. All are recoverable; the state is
/// left untouched whenever one is returned.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ActionError {
    /// Purchase or withdrawal exceeds the balance.
    #[error("insufficient funds: need ${needed}, have ${available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    /// Mining cannot start without hashrate.
    #[error("buy equipment before starting to mine")]
    NoEquipment,
    /// Nothing mined yet for this asset.
    #[error("no {0} to convert")]
    NothingToConvert(AssetId),
    /// Withdrawal missing, not a number, or under the minimum.
    #[error("minimum withdrawal is ${minimum}")]
    BelowMinimum { minimum: Decimal },
    /// Blank destination address.
    #[error("enter a wallet address")]
    MissingAddress,
    /// Equipment id absent from the loaded catalog.
    #[error("equipment {0} is not in the catalog")]
    UnknownEquipment(sim_core::EquipmentId),
    /// Numeric conversion to decimal failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// Seeded ChaCha generator for reproducible runs.
#[derive(Clone, Debug)]
pub struct SeededRng(ChaCha8Rng);

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRng {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Cycles through a fixed list of draws. Used to pin the noise in tests.
#[derive(Clone, Debug)]
pub struct FixedSequence {
    draws: Vec<f64>,
    next: usize,
}

impl FixedSequence {
    /// Draws are clamped into `[0, 1)`; an empty list behaves like `[0.5]`.
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        let mut draws: Vec<f64> = draws
            .into()
            .into_iter()
            .map(|u| if u.is_finite() { u.clamp(0.0, 1.0 - f64::EPSILON) } else { 0.5 })
            .collect();
        if draws.is_empty() {
            draws.push(0.5);
        }
        Self { draws, next: 0 }
    }

    /// Always draws the midpoint, which makes every noise factor neutral.
    pub fn midpoint() -> Self {
        Self::new(vec![0.5])
    }
}

impl RandomSource for FixedSequence {
    fn next_unit(&mut self) -> f64 {
        let u = self.draws[self.next % self.draws.len()];
        self.next = self.next.wrapping_add(1);
        u
    }
}

/// Map a unit draw onto `[-half_width, half_width)`. The midpoint draw maps
/// to exactly zero.
pub fn symmetric_draw<R: RandomSource + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    half_width * (2.0 * rng.next_unit() - 1.0)
}

/// Expected reward of one production tick, before noise.
///
/// base = difficulty * hashrate / seconds_per_hour
pub fn base_reward(cfg: &EconomyConfig, asset: AssetId, hashrate: f64) -> f64 {
    if hashrate <= 0.0 || !hashrate.is_finite() {
        return 0.0;
    }
    cfg.difficulty(asset) * hashrate / cfg.seconds_per_hour
}

/// Expected hourly USD value of mining `asset`.
///
/// Zero unless the asset is being mined with non-zero hashrate. Used for
/// projections only; nothing is credited from it.
pub fn hourly_earnings(state: &GameState, cfg: &EconomyConfig, asset: AssetId) -> Decimal {
    if !state.is_mining(asset) || state.total_hashrate <= 0.0 {
        return Decimal::ZERO;
    }
    let hourly = cfg.difficulty(asset) * state.total_hashrate;
    Decimal::from_f64(hourly)
        .and_then(|units| units.checked_mul(state.price(asset)))
        .map(|value| value.round_dp(MONEY_DP))
        .unwrap_or(Decimal::ZERO)
}

/// Rewards credited by one production tick, per asset.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MiningReport {
    pub rewards: BTreeMap<AssetId, f64>,
}

impl MiningReport {
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Advance production by one tick.
///
/// Every enabled asset independently receives the full hashrate's reward
/// scaled by a fresh factor in `[1 - noise, 1 + noise)`. Disabled assets and
/// zero hashrate leave holdings untouched. `last_tick_at` only moves when
/// something was credited.
pub fn mine_tick<R: RandomSource + ?Sized>(
    state: &mut GameState,
    cfg: &EconomyConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> MiningReport {
    let mut report = MiningReport::default();
    if state.total_hashrate <= 0.0 {
        return report;
    }
    for asset in AssetId::ALL {
        if !state.is_mining(asset) {
            continue;
        }
        let factor = 1.0 + symmetric_draw(rng, cfg.reward_noise);
        let reward = base_reward(cfg, asset, state.total_hashrate) * factor;
        *state.holdings.entry(asset).or_insert(0.0) += reward;
        report.rewards.insert(asset, reward);
    }
    if !report.is_empty() {
        state.last_tick_at = Some(now);
    }
    debug!(rewards = ?report.rewards, "production tick");
    report
}

/// Apply one relative price change and the floor.
///
/// new = max(price * (1 + change), floor). A non-finite change keeps the
/// price; a change of -1 or below lands exactly on the floor.
pub fn drifted_price(price: Decimal, change: f64, floor: Decimal) -> Decimal {
    let factor = Decimal::from_f64(1.0 + change).unwrap_or(Decimal::ONE);
    let moved = price
        .checked_mul(factor)
        .map(|p| p.round_dp(MONEY_DP))
        .unwrap_or(price);
    moved.max(floor)
}

/// Drift every asset price once and append the results to the histories.
///
/// Assets move independently with `change` drawn from
/// `[-volatility, volatility)`. Returns the new prices.
pub fn drift_prices<R: RandomSource + ?Sized>(
    state: &mut GameState,
    cfg: &EconomyConfig,
    rng: &mut R,
) -> BTreeMap<AssetId, Decimal> {
    let mut moved = BTreeMap::new();
    for asset in AssetId::ALL {
        let change = symmetric_draw(rng, cfg.price_volatility);
        let price = drifted_price(state.price(asset), change, cfg.min_price(asset));
        state.record_price(asset, price, cfg.price_history_cap);
        moved.insert(asset, price);
    }
    debug!(prices = ?moved, "price drift");
    moved
}

/// Percentage change between the last two history entries.
pub fn price_change_pct<I>(history: I) -> Option<f64>
where
    I: IntoIterator<Item = Decimal>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut it = history.into_iter().rev();
    let current = it.next()?;
    let previous = it.next()?;
    if previous <= Decimal::ZERO {
        return None;
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).to_f64()
}
