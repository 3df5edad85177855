//! Read-only view of the game for rendering.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{AssetId, EconomyConfig, EquipmentId, GameState, WithdrawalReceipt};
use sim_econ::{hourly_earnings, price_change_pct};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetView {
    pub asset: AssetId,
    pub price: Decimal,
    /// Oldest first.
    pub price_history: Vec<Decimal>,
    /// Percent change over the last drift, if there were two prices.
    pub price_change_pct: Option<f64>,
    pub mining: bool,
    pub holdings: f64,
    pub projected_hourly_earnings: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EquipmentView {
    pub equipment: EquipmentId,
    pub owned: u32,
    pub price: Decimal,
    pub hashrate: f64,
    pub power: f64,
    pub affordable: bool,
}

/// Everything the view layer is allowed to see.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub balance: Decimal,
    pub total_hashrate: f64,
    pub assets: Vec<AssetView>,
    pub equipment: Vec<EquipmentView>,
    /// Most recent first.
    pub withdrawals: Vec<WithdrawalReceipt>,
}

impl GameSnapshot {
    pub fn capture(state: &GameState, cfg: &EconomyConfig) -> Self {
        let assets = AssetId::ALL
            .into_iter()
            .map(|asset| {
                let price_history: Vec<Decimal> = state.history(asset).collect();
                AssetView {
                    asset,
                    price: state.price(asset),
                    price_change_pct: price_change_pct(price_history.iter().copied()),
                    price_history,
                    mining: state.is_mining(asset),
                    holdings: state.holding(asset),
                    projected_hourly_earnings: hourly_earnings(state, cfg, asset),
                }
            })
            .collect();
        let equipment = EquipmentId::ALL
            .into_iter()
            .filter_map(|id| {
                let spec = cfg.equipment_spec(id)?;
                Some(EquipmentView {
                    equipment: id,
                    owned: state.owned(id),
                    price: spec.price,
                    hashrate: spec.hashrate,
                    power: spec.power,
                    affordable: state.balance >= spec.price,
                })
            })
            .collect();
        Self {
            balance: state.balance,
            total_hashrate: state.total_hashrate,
            assets,
            equipment,
            withdrawals: state.withdrawals.iter().cloned().collect(),
        }
    }

    pub fn asset(&self, asset: AssetId) -> Option<&AssetView> {
        self.assets.iter().find(|v| v.asset == asset)
    }

    pub fn equipment(&self, id: EquipmentId) -> Option<&EquipmentView> {
        self.equipment.iter().find(|v| v.equipment == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, fresh_engine};

    #[test]
    fn affordability_tracks_balance() {
        let (engine, _store) = fresh_engine();
        let snap = engine.snapshot();
        assert_eq!(snap.balance, Decimal::new(1_000, 0));
        assert!(snap.equipment(EquipmentId::GpuMid).unwrap().affordable);
        assert!(!snap.equipment(EquipmentId::GpuHigh).unwrap().affordable);
        assert_eq!(snap.equipment.len(), 6);
        assert_eq!(snap.equipment(EquipmentId::Farm).unwrap().power, 15_000.0);
    }

    #[test]
    fn asset_views_reflect_state() {
        let (mut engine, _store) = fresh_engine();
        engine
            .buy_equipment(EquipmentId::GpuBasic, Decimal::new(300, 0))
            .unwrap();
        engine.set_mining(AssetId::Bitcoin, true).unwrap();
        engine.tick(at(1));
        engine.drift_prices();
        engine
            .withdraw(Some(Decimal::new(50, 0)), "addr", at(2))
            .unwrap();
        let snap = engine.snapshot();
        let btc = snap.asset(AssetId::Bitcoin).unwrap();
        assert!(btc.mining);
        assert!(btc.holdings > 0.0);
        assert!(btc.projected_hourly_earnings > Decimal::ZERO);
        assert_eq!(btc.price_history.len(), 2);
        assert_eq!(btc.price_change_pct, Some(0.0));
        let eth = snap.asset(AssetId::Ethereum).unwrap();
        assert_eq!(eth.projected_hourly_earnings, Decimal::ZERO);
        assert_eq!(snap.withdrawals.len(), 1);
        assert_eq!(snap.total_hashrate, 20.0);
    }
}
