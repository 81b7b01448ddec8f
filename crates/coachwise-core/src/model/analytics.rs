// Analytic results fetched alongside the team: captain suggestions and
// cash-cow sell recommendations. The scoring behind them happens server-side.

use serde::{Deserialize, Serialize};

/// A suggested captain for the coming round.
///
/// Refers to a player by id only; the player itself lives in the team
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptainSuggestion {
    pub player_id: String,
    pub opponent: String,
    /// 0-100.
    pub confidence: u8,
    pub projected_points: i32,
    /// Normalized 0.0-1.0.
    pub form_rating: f64,
    /// Normalized 0.0-1.0.
    pub fixture_rating: f64,
}

impl CaptainSuggestion {
    pub fn validate(&self) -> Result<(), String> {
        if self.player_id.trim().is_empty() {
            return Err("captain suggestion without a player id".to_string());
        }
        if self.confidence > 100 {
            return Err(format!(
                "captain confidence {} for {} exceeds 100",
                self.confidence, self.player_id
            ));
        }
        check_unit("form_rating", self.form_rating)?;
        check_unit("fixture_rating", self.fixture_rating)
    }
}

/// Rank of the suggestion at `index` in an ordered suggestion list.
pub fn captain_rank(index: usize) -> usize {
    index + 1
}

/// How soon a cash cow should be traded out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SellUrgency {
    SellNow,
    Hold,
    Monitor,
}

impl SellUrgency {
    pub fn label(&self) -> &'static str {
        match self {
            SellUrgency::SellNow => "Sell now",
            SellUrgency::Hold => "Hold",
            SellUrgency::Monitor => "Monitor",
        }
    }
}

/// A sell recommendation for a cash cow, keyed by the player's name rather
/// than id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashCowRecommendation {
    pub player_name: String,
    pub cash_generated: i64,
    pub urgency: SellUrgency,
    /// Normalized 0.0-1.0.
    pub confidence: f64,
}

impl CashCowRecommendation {
    pub fn validate(&self) -> Result<(), String> {
        if self.player_name.trim().is_empty() {
            return Err("cash cow recommendation without a player name".to_string());
        }
        check_unit("confidence", self.confidence)
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be within 0.0..=1.0, got {value}"))
    }
}
