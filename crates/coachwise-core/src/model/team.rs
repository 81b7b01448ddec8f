// Team payloads as fetched and the team snapshot built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::player::{DerivationRules, PlayerRecord, RawPlayer};

/// Team data as the gateway returns it, before display derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPayload {
    pub score: i64,
    pub rank: u32,
    pub team_value: i64,
    pub bank_balance: i64,
    pub trades_remaining: u32,
    /// Players in server display order.
    pub players: Vec<RawPlayer>,
}

impl TeamPayload {
    /// Reject payloads that must never reach a snapshot.
    pub fn validate(&self) -> Result<(), String> {
        if self.rank == 0 {
            return Err("team rank must be at least 1".to_string());
        }
        let mut seen = HashSet::new();
        for player in &self.players {
            player.validate()?;
            if !seen.insert(player.id.as_str()) {
                return Err(format!("duplicate player id {}", player.id));
            }
        }
        Ok(())
    }
}

/// The user's team as currently displayed.
///
/// The empty snapshot (before the first successful fetch) has rank 0 and no
/// `last_updated`; every fetched snapshot has rank >= 1.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TeamSnapshot {
    pub score: i64,
    pub rank: u32,
    pub team_value: i64,
    pub bank_balance: i64,
    pub players: Vec<PlayerRecord>,
    pub trades_remaining: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl TeamSnapshot {
    /// Build a snapshot from a fetched payload.
    ///
    /// `previous` supplies last-known prices for players whose payload does
    /// not report a price change.
    pub fn from_payload(
        payload: TeamPayload,
        previous: &TeamSnapshot,
        rules: &DerivationRules,
        fetched_at: DateTime<Utc>,
    ) -> TeamSnapshot {
        let previous_prices: HashMap<&str, u32> = previous
            .players
            .iter()
            .map(|p| (p.id.as_str(), p.price))
            .collect();

        let players = payload
            .players
            .iter()
            .map(|raw| PlayerRecord::derive(raw, previous_prices.get(raw.id.as_str()).copied(), rules))
            .collect();

        TeamSnapshot {
            score: payload.score,
            rank: payload.rank,
            team_value: payload.team_value,
            bank_balance: payload.bank_balance,
            players,
            trades_remaining: payload.trades_remaining,
            last_updated: Some(fetched_at),
        }
    }

    /// Whether any team data has been fetched yet.
    pub fn is_empty(&self) -> bool {
        self.last_updated.is_none()
    }

    pub fn player(&self, id: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn cash_cows(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter().filter(|p| p.is_cash_cow)
    }

    pub fn doubtful_players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter().filter(|p| p.is_doubtful)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::player::{Position, PriceTrend};
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn raw(id: &str, price: u32) -> RawPlayer {
        RawPlayer {
            id: id.to_string(),
            name: format!("Player {id}"),
            position: Position::Defender,
            price,
            average_score: 75.0,
            price_change: None,
            cash_generated: 0,
            cash_cow: false,
            doubtful: false,
            alert_flags: BTreeSet::new(),
        }
    }

    fn payload(players: Vec<RawPlayer>) -> TeamPayload {
        TeamPayload {
            score: 1450,
            rank: 12_000,
            team_value: 10_200_000,
            bank_balance: 150_000,
            trades_remaining: 30,
            players,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn default_snapshot_is_empty() {
        let snap = TeamSnapshot::default();
        assert!(snap.is_empty());
        assert!(snap.players.is_empty());
        assert_eq!(snap.rank, 0);
    }

    #[test]
    fn from_payload_keeps_server_order_and_fields() {
        let rules = DerivationRules::default();
        let snap = TeamSnapshot::from_payload(
            payload(vec![raw("b", 300_000), raw("a", 400_000)]),
            &TeamSnapshot::default(),
            &rules,
            at(0),
        );
        let ids: Vec<_> = snap.players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(snap.score, 1450);
        assert_eq!(snap.rank, 12_000);
        assert_eq!(snap.last_updated, Some(at(0)));
        assert!(!snap.is_empty());
    }

    #[test]
    fn price_change_computed_against_previous_snapshot() {
        let rules = DerivationRules::default();
        let first = TeamSnapshot::from_payload(
            payload(vec![raw("a", 400_000), raw("b", 300_000)]),
            &TeamSnapshot::default(),
            &rules,
            at(0),
        );
        let second = TeamSnapshot::from_payload(
            payload(vec![raw("a", 425_000), raw("b", 300_000), raw("c", 200_000)]),
            &first,
            &rules,
            at(60),
        );

        let a = second.player("a").unwrap();
        assert_eq!(a.price_change, 25_000);
        assert_eq!(a.display.trend, PriceTrend::Rising);
        assert_eq!(second.player("b").unwrap().display.trend, PriceTrend::Unchanged);
        // New arrival has no prior price.
        assert_eq!(second.player("c").unwrap().price_change, 0);
    }

    #[test]
    fn validate_rejects_rank_zero_and_duplicates() {
        let mut p = payload(vec![raw("a", 1)]);
        p.rank = 0;
        assert!(p.validate().is_err());

        let dup = payload(vec![raw("a", 1), raw("a", 2)]);
        assert!(dup.validate().unwrap_err().contains("duplicate"));

        assert!(payload(vec![raw("a", 1), raw("b", 2)]).validate().is_ok());
    }

    #[test]
    fn cash_cow_and_doubtful_filters() {
        let mut cow = raw("cow", 250_000);
        cow.cash_cow = true;
        let mut hurt = raw("hurt", 600_000);
        hurt.doubtful = true;

        let snap = TeamSnapshot::from_payload(
            payload(vec![cow, hurt, raw("plain", 500_000)]),
            &TeamSnapshot::default(),
            &DerivationRules::default(),
            at(0),
        );
        assert_eq!(snap.cash_cows().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["cow"]);
        assert_eq!(
            snap.doubtful_players().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["hurt"]
        );
    }
}
