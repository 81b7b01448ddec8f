// Player records and the pure derivation of their display fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Cash generated at or above which a player counts as a cash cow when the
/// server has not flagged them itself.
pub const DEFAULT_CASH_COW_MIN_GENERATED: i64 = 150_000;

/// Alert flags that mark a player as doubtful for the upcoming round.
pub const DOUBTFUL_ALERTS: &[&str] = &["doubtful", "injury", "suspension", "late_out"];

/// Text shown when a price has not moved since the previous fetch.
pub const UNCHANGED_PRICE_TEXT: &str = "—";

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// On-field positions. There is deliberately no "unknown" variant: a payload
/// naming any other position fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Position {
    Defender,
    Midfielder,
    Ruck,
    Forward,
}

impl Position {
    /// Parse a position string.
    ///
    /// Accepts the short codes used on team sheets ("DEF", "MID", "RUC",
    /// "FWD"), the single letters the API sometimes sends ("D", "M", "R",
    /// "F"), and the full names, case-insensitively.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEF" | "D" | "DEFENDER" => Some(Position::Defender),
            "MID" | "M" | "MIDFIELDER" => Some(Position::Midfielder),
            "RUC" | "RUCK" | "R" => Some(Position::Ruck),
            "FWD" | "F" | "FORWARD" => Some(Position::Forward),
            _ => None,
        }
    }

    /// Short code shown on player cards.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Ruck => "RUC",
            Position::Forward => "FWD",
        }
    }

    /// Display colour for position badges, as a hex RGB string.
    pub fn color_hex(&self) -> &'static str {
        match self {
            Position::Defender => "#3B82F6",
            Position::Midfielder => "#10B981",
            Position::Ruck => "#8B5CF6",
            Position::Forward => "#EF4444",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

impl TryFrom<String> for Position {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Position::from_str_pos(&value).ok_or_else(|| format!("unknown position `{value}`"))
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.display_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Raw player fields
// ---------------------------------------------------------------------------

/// One player exactly as fetched, before any display derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlayer {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub price: u32,
    pub average_score: f64,
    /// Price movement reported by the server. `None` means the server did not
    /// report one and it is computed against the previously fetched price.
    #[serde(default)]
    pub price_change: Option<i32>,
    #[serde(default)]
    pub cash_generated: i64,
    #[serde(default)]
    pub cash_cow: bool,
    #[serde(default)]
    pub doubtful: bool,
    #[serde(default)]
    pub alert_flags: BTreeSet<String>,
}

impl RawPlayer {
    /// Check the invariants that serde's types alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err(format!("player `{}` has an empty id", self.name));
        }
        if !self.average_score.is_finite() || self.average_score < 0.0 {
            return Err(format!(
                "player {} has invalid average score {}",
                self.id, self.average_score
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Derived record
// ---------------------------------------------------------------------------

/// Direction of a price movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceTrend {
    Rising,
    Falling,
    Unchanged,
}

/// Thresholds that feed the derived flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivationRules {
    pub cash_cow_min_generated: i64,
}

impl Default for DerivationRules {
    fn default() -> Self {
        Self {
            cash_cow_min_generated: DEFAULT_CASH_COW_MIN_GENERATED,
        }
    }
}

/// Display fields computed from a player's raw fields. Never stored apart
/// from the record they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerDisplay {
    pub formatted_price: String,
    pub price_change_text: String,
    pub trend: PriceTrend,
    pub position_code: &'static str,
    pub color_hex: &'static str,
}

/// A player as held in the team snapshot: raw fields plus derived display
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub price: u32,
    pub average_score: f64,
    pub price_change: i32,
    pub cash_generated: i64,
    pub is_cash_cow: bool,
    pub is_doubtful: bool,
    pub alert_flags: BTreeSet<String>,
    pub display: PlayerDisplay,
}

impl PlayerRecord {
    /// Derive a record from raw fields.
    ///
    /// `previous_price` is this player's price in the previous snapshot, used
    /// only when the server did not report a price change. With neither, the
    /// change is zero.
    pub fn derive(
        raw: &RawPlayer,
        previous_price: Option<u32>,
        rules: &DerivationRules,
    ) -> PlayerRecord {
        let price_change = raw
            .price_change
            .or_else(|| previous_price.map(|prev| clamp_delta(raw.price as i64 - prev as i64)))
            .unwrap_or(0);

        let is_cash_cow = raw.cash_cow || raw.cash_generated >= rules.cash_cow_min_generated;
        let is_doubtful = raw.doubtful
            || raw
                .alert_flags
                .iter()
                .any(|flag| DOUBTFUL_ALERTS.contains(&flag.to_lowercase().as_str()));

        PlayerRecord {
            id: raw.id.clone(),
            name: raw.name.clone(),
            position: raw.position,
            price: raw.price,
            average_score: raw.average_score,
            price_change,
            cash_generated: raw.cash_generated,
            is_cash_cow,
            is_doubtful,
            alert_flags: raw.alert_flags.clone(),
            display: PlayerDisplay {
                formatted_price: format_price(raw.price),
                price_change_text: format_price_change(price_change),
                trend: trend_of(price_change),
                position_code: raw.position.display_str(),
                color_hex: raw.position.color_hex(),
            },
        }
    }

    /// The raw fields this record would be derived from. Deriving them again
    /// yields an identical record.
    pub fn inputs(&self) -> RawPlayer {
        RawPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
            position: self.position,
            price: self.price,
            average_score: self.average_score,
            price_change: Some(self.price_change),
            cash_generated: self.cash_generated,
            cash_cow: self.is_cash_cow,
            doubtful: self.is_doubtful,
            alert_flags: self.alert_flags.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Format a price the way player cards show it: "$512k", "$1.05M".
pub fn format_price(price: u32) -> String {
    let thousands = (price as f64 / 1_000.0).round();
    if thousands >= 1_000.0 {
        format!("${:.2}M", price as f64 / 1_000_000.0)
    } else if price >= 1_000 {
        format!("${}k", thousands as u32)
    } else {
        format!("${price}")
    }
}

/// Format a signed price movement: "+$12k", "-$8k", "+$500", or the neutral
/// marker for zero.
pub fn format_price_change(delta: i32) -> String {
    if delta == 0 {
        return UNCHANGED_PRICE_TEXT.to_string();
    }
    let sign = if delta > 0 { '+' } else { '-' };
    let magnitude = delta.unsigned_abs();
    if magnitude >= 1_000 {
        format!("{sign}${}k", (magnitude as f64 / 1_000.0).round() as u32)
    } else {
        format!("{sign}${magnitude}")
    }
}

fn trend_of(delta: i32) -> PriceTrend {
    match delta.signum() {
        1 => PriceTrend::Rising,
        -1 => PriceTrend::Falling,
        _ => PriceTrend::Unchanged,
    }
}

fn clamp_delta(delta: i64) -> i32 {
    delta.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, price: u32, change: Option<i32>) -> RawPlayer {
        RawPlayer {
            id: id.to_string(),
            name: format!("Player {id}"),
            position: Position::Midfielder,
            price,
            average_score: 98.4,
            price_change: change,
            cash_generated: 0,
            cash_cow: false,
            doubtful: false,
            alert_flags: BTreeSet::new(),
        }
    }

    #[test]
    fn from_str_pos_accepts_codes_letters_and_names() {
        assert_eq!(Position::from_str_pos("DEF"), Some(Position::Defender));
        assert_eq!(Position::from_str_pos("m"), Some(Position::Midfielder));
        assert_eq!(Position::from_str_pos("Ruck"), Some(Position::Ruck));
        assert_eq!(Position::from_str_pos(" fwd "), Some(Position::Forward));
    }

    #[test]
    fn from_str_pos_rejects_unknown() {
        assert_eq!(Position::from_str_pos("GK"), None);
        assert_eq!(Position::from_str_pos(""), None);
    }

    #[test]
    fn position_deserializes_from_code_and_rejects_unknown() {
        let pos: Position = serde_json::from_str("\"RUC\"").unwrap();
        assert_eq!(pos, Position::Ruck);
        assert!(serde_json::from_str::<Position>("\"UTIL\"").is_err());
        assert_eq!(serde_json::to_string(&Position::Forward).unwrap(), "\"FWD\"");
    }

    #[test]
    fn each_position_has_distinct_color() {
        let colors: BTreeSet<_> = [
            Position::Defender,
            Position::Midfielder,
            Position::Ruck,
            Position::Forward,
        ]
        .iter()
        .map(|p| p.color_hex())
        .collect();
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn format_price_thousands_and_millions() {
        assert_eq!(format_price(500_000), "$500k");
        assert_eq!(format_price(512_300), "$512k");
        assert_eq!(format_price(1_050_000), "$1.05M");
        assert_eq!(format_price(999_700), "$1.00M");
        assert_eq!(format_price(0), "$0");
    }

    #[test]
    fn format_price_change_signs() {
        assert_eq!(format_price_change(12_300), "+$12k");
        assert_eq!(format_price_change(-8_000), "-$8k");
        assert_eq!(format_price_change(500), "+$500");
        assert_eq!(format_price_change(0), UNCHANGED_PRICE_TEXT);
    }

    #[test]
    fn no_prior_price_renders_neutral() {
        let record = PlayerRecord::derive(&raw("p1", 500_000, None), None, &DerivationRules::default());
        assert_eq!(record.price_change, 0);
        assert_eq!(record.display.trend, PriceTrend::Unchanged);
        assert_eq!(record.display.price_change_text, UNCHANGED_PRICE_TEXT);
        assert_eq!(record.display.formatted_price, "$500k");
    }

    #[test]
    fn missing_change_is_computed_against_previous_price() {
        let rules = DerivationRules::default();
        let rising = PlayerRecord::derive(&raw("p1", 520_000, None), Some(500_000), &rules);
        assert_eq!(rising.price_change, 20_000);
        assert_eq!(rising.display.trend, PriceTrend::Rising);
        assert_eq!(rising.display.price_change_text, "+$20k");

        let falling = PlayerRecord::derive(&raw("p1", 480_000, None), Some(500_000), &rules);
        assert_eq!(falling.display.trend, PriceTrend::Falling);
    }

    #[test]
    fn reported_change_wins_over_previous_price() {
        let record = PlayerRecord::derive(
            &raw("p1", 520_000, Some(-4_000)),
            Some(500_000),
            &DerivationRules::default(),
        );
        assert_eq!(record.price_change, -4_000);
    }

    #[test]
    fn cash_cow_from_flag_or_threshold() {
        let rules = DerivationRules {
            cash_cow_min_generated: 100_000,
        };
        let mut p = raw("p1", 250_000, None);
        assert!(!PlayerRecord::derive(&p, None, &rules).is_cash_cow);

        p.cash_generated = 100_000;
        assert!(PlayerRecord::derive(&p, None, &rules).is_cash_cow);

        p.cash_generated = 0;
        p.cash_cow = true;
        assert!(PlayerRecord::derive(&p, None, &rules).is_cash_cow);
    }

    #[test]
    fn doubtful_from_flag_or_alert() {
        let rules = DerivationRules::default();
        let mut p = raw("p1", 250_000, None);
        p.alert_flags.insert("Injury".to_string());
        assert!(PlayerRecord::derive(&p, None, &rules).is_doubtful);

        let mut q = raw("p2", 250_000, None);
        q.alert_flags.insert("bye".to_string());
        assert!(!PlayerRecord::derive(&q, None, &rules).is_doubtful);
    }

    #[test]
    fn derivation_is_idempotent() {
        let rules = DerivationRules::default();
        let mut p = raw("p1", 731_900, None);
        p.position = Position::Ruck;
        p.cash_generated = 210_000;
        p.alert_flags.insert("late_out".to_string());

        for previous in [None, Some(700_000), Some(800_000)] {
            let first = PlayerRecord::derive(&p, previous, &rules);
            let again = PlayerRecord::derive(&first.inputs(), previous, &rules);
            assert_eq!(first, again);
            // The previous price no longer matters once the change is fixed.
            let unrelated = PlayerRecord::derive(&first.inputs(), Some(1), &rules);
            assert_eq!(first, unrelated);
        }
    }

    #[test]
    fn validate_rejects_negative_average_and_empty_id() {
        let mut p = raw("p1", 100_000, None);
        p.average_score = -1.0;
        assert!(p.validate().is_err());

        let q = raw("  ", 100_000, None);
        assert!(q.validate().is_err());

        assert!(raw("ok", 100_000, None).validate().is_ok());
    }

    #[test]
    fn negative_price_fails_to_decode() {
        let json = r#"{"id":"p1","name":"A","position":"DEF","price":-5,"average_score":50.0}"#;
        assert!(serde_json::from_str::<RawPlayer>(json).is_err());
    }
}
