use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single fixture, live game or completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Unique within one batch (e.g. "result_3")
    pub id: String,
    pub date: NaiveDate,
    /// Local clock time, "HH:MM"
    pub time: String,
    /// Home/away team codes in the order the source lists them
    pub teams: [String; 2],
    pub venue: String,
    pub status: MatchStatus,
    /// Team code → free-text score, e.g. "190/9 (20.0 OV)"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Round or stage label, e.g. "Qualifier 2" or "Match 70"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_order: Option<String>,
}

impl MatchRecord {
    /// Both team codes are present and distinct, and every score key names
    /// one of them.
    pub fn is_well_formed(&self) -> bool {
        let [home, away] = &self.teams;
        if home.is_empty() || away.is_empty() || home == away {
            return false;
        }
        self.score
            .as_ref()
            .map_or(true, |s| s.keys().all(|k| k == home || k == away))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Completed,
}

/// One row of the league points table.
///
/// `played == won + lost + nr` is not enforced; the source occasionally
/// violates it and rows are served as extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsRow {
    pub team: String,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    /// No-result count
    pub nr: u32,
    /// Net run rate, rounded to 3 fraction digits
    pub nrr: f64,
    pub points: u32,
    /// Aggregate runs scored, "runs/overs"
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub runs_for: Option<String>,
    /// Aggregate runs conceded, "runs/overs"
    #[serde(rename = "against", default, skip_serializing_if = "Option::is_none")]
    pub runs_against: Option<String>,
    /// Most recent results, oldest first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_form: Option<Vec<FormResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_change: Option<PositionTrend>,
}

impl StandingsRow {
    /// Net run rate with exactly three fraction digits, e.g. "-0.123".
    pub fn nrr_display(&self) -> String {
        format!("{:.3}", self.nrr)
    }
}

/// Round a net run rate to the 3-digit precision the table displays.
pub fn round_nrr(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormResult {
    W,
    L,
    N,
}

impl FormResult {
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "W" => Some(FormResult::W),
            "L" => Some(FormResult::L),
            "N" => Some(FormResult::N),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionTrend {
    Up,
    Down,
    Same,
}

/// Everything the dashboard shows, assembled at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    /// Live and upcoming view
    pub matches: Vec<MatchRecord>,
    pub points_table: Vec<StandingsRow>,
    pub schedule: Vec<MatchRecord>,
    pub results: Vec<MatchRecord>,
}
