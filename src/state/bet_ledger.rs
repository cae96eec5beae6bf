use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;

use crate::error::{AppError, Result};
use crate::types::{BetRecord, BetStatus};

/// Append-only record of the bettor's own bets. A bet is written once at
/// placement and changed exactly once, at settlement. Nothing is ever removed.
pub struct BetLedger {
    bets: RwLock<Vec<BetRecord>>,
}

impl BetLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn place(&self, bet: BetRecord) -> Result<()> {
        if bet.id.trim().is_empty() {
            return Err(AppError::InvalidBet("bet id is empty".to_string()));
        }
        if bet.status != BetStatus::Pending || bet.settled_at.is_some() {
            return Err(AppError::InvalidBet(format!(
                "bet {} must be placed as pending",
                bet.id
            )));
        }
        if !bet.stake.is_finite() || bet.stake <= 0.0 {
            return Err(AppError::InvalidBet(format!(
                "bet {} stake must be positive",
                bet.id
            )));
        }

        let mut bets = self.bets.write();
        if bets.iter().any(|b| b.id == bet.id) {
            return Err(AppError::DuplicateBet(bet.id));
        }
        info!(
            bet_id = %bet.id,
            match_id = %bet.match_id,
            stake = bet.stake,
            odds = bet.odds,
            "[LEDGER] bet placed"
        );
        bets.push(bet);
        Ok(())
    }

    /// Settle a pending bet. When `result_profit` is omitted it is derived from
    /// the stake and odds.
    pub fn settle(
        &self,
        id: &str,
        status: BetStatus,
        result_profit: Option<f64>,
        settled_at: DateTime<Utc>,
    ) -> Result<BetRecord> {
        if status == BetStatus::Pending {
            return Err(AppError::InvalidSettlement {
                id: id.to_string(),
                reason: "cannot settle to pending".to_string(),
            });
        }

        let mut bets = self.bets.write();
        let bet = bets
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::BetNotFound(id.to_string()))?;

        if bet.is_settled() {
            return Err(AppError::AlreadySettled(id.to_string()));
        }
        if settled_at < bet.placed_at {
            return Err(AppError::InvalidSettlement {
                id: id.to_string(),
                reason: "settled before it was placed".to_string(),
            });
        }

        let profit = result_profit.unwrap_or_else(|| default_profit(status, bet.stake, bet.odds));
        bet.status = status;
        bet.result_profit = Some(profit);
        bet.settled_at = Some(settled_at);

        info!(
            bet_id = %bet.id,
            status = %status,
            profit,
            "[LEDGER] bet settled"
        );
        Ok(bet.clone())
    }

    pub fn get(&self, id: &str) -> Option<BetRecord> {
        self.bets.read().iter().find(|b| b.id == id).cloned()
    }

    /// All bets in placement order.
    pub fn all(&self) -> Vec<BetRecord> {
        self.bets.read().clone()
    }

    pub fn pending(&self) -> Vec<BetRecord> {
        self.bets
            .read()
            .iter()
            .filter(|b| b.status == BetStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.read().is_empty()
    }
}

impl Default for BetLedger {
    fn default() -> Self {
        Self {
            bets: RwLock::new(Vec::new()),
        }
    }
}

/// Profit of a winning bet at American `odds`.
pub fn win_profit(stake: f64, odds: f64) -> f64 {
    if odds >= 100.0 {
        stake * odds / 100.0
    } else if odds <= -100.0 {
        stake * 100.0 / odds.abs()
    } else {
        0.0
    }
}

fn default_profit(status: BetStatus, stake: f64, odds: f64) -> f64 {
    match status {
        BetStatus::Won => win_profit(stake, odds),
        BetStatus::Lost => -stake,
        BetStatus::Push | BetStatus::Cancelled | BetStatus::Pending => 0.0,
    }
}
