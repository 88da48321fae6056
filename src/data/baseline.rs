//! Static league data served when live extraction yields nothing.
//!
//! `matches` and `schedule` are never scraped and always come from here;
//! standings and results fall back to these sets per category.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::models::{
    DataSnapshot, FormResult, MatchRecord, MatchStatus, PositionTrend, StandingsRow,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn fixture(id: &str, day: NaiveDate, time: &str, teams: [&str; 2], venue: &str) -> MatchRecord {
    MatchRecord {
        id: id.to_string(),
        date: day,
        time: time.to_string(),
        teams: [teams[0].to_string(), teams[1].to_string()],
        venue: venue.to_string(),
        status: MatchStatus::Upcoming,
        score: None,
        result: None,
        match_order: None,
    }
}

fn with_score(mut m: MatchRecord, status: MatchStatus, home: &str, away: &str) -> MatchRecord {
    let [h, a] = m.teams.clone();
    m.status = status;
    m.score = Some(BTreeMap::from([(h, home.to_string()), (a, away.to_string())]));
    m
}

fn completed(
    m: MatchRecord,
    home: &str,
    away: &str,
    result: &str,
    match_order: &str,
) -> MatchRecord {
    let mut m = with_score(m, MatchStatus::Completed, home, away);
    m.result = Some(result.to_string());
    m.match_order = Some(match_order.to_string());
    m
}

fn form(symbols: &str) -> Option<Vec<FormResult>> {
    Some(
        symbols
            .chars()
            .filter_map(|c| FormResult::from_symbol(&c.to_string()))
            .collect(),
    )
}

#[allow(clippy::too_many_arguments)]
fn standing(
    team: &str,
    won: u32,
    lost: u32,
    nrr: f64,
    runs_for: &str,
    runs_against: &str,
    recent: &str,
    trend: PositionTrend,
) -> StandingsRow {
    StandingsRow {
        team: team.to_string(),
        played: won + lost,
        won,
        lost,
        nr: 0,
        nrr,
        points: won * 2,
        runs_for: Some(runs_for.to_string()),
        runs_against: Some(runs_against.to_string()),
        recent_form: form(recent),
        pos_change: Some(trend),
    }
}

const WANKHEDE: &str = "Wankhede Stadium, Mumbai";
const CHINNASWAMY: &str = "M. Chinnaswamy Stadium, Bangalore";
const UPPAL: &str = "Rajiv Gandhi Intl. Stadium, Hyderabad";
const MOTERA: &str = "Narendra Modi Stadium, Ahmedabad";
const MULLANPUR: &str = "New PCA Stadium, Chandigarh";

/// Current and upcoming matches.
pub fn matches() -> Vec<MatchRecord> {
    vec![
        fixture("1", date(2025, 8, 7), "19:30", ["MI", "CSK"], WANKHEDE),
        with_score(
            fixture("2", date(2025, 8, 6), "19:30", ["RCB", "KKR"], CHINNASWAMY),
            MatchStatus::Live,
            "156/4 (18.3)",
            "142/8 (20)",
        ),
        with_score(
            fixture("3", date(2025, 8, 5), "19:30", ["SRH", "DC"], UPPAL),
            MatchStatus::Completed,
            "180/5 (20)",
            "165/9 (20)",
        ),
    ]
}

pub fn points_table() -> Vec<StandingsRow> {
    use PositionTrend::{Down, Same, Up};
    vec![
        standing("CSK", 9, 3, 1.456, "2250/240.0", "2100/240.0", "WWLWW", Up),
        standing("MI", 8, 4, 0.892, "2180/240.0", "2120/240.0", "LWWLW", Same),
        standing("RCB", 7, 5, 0.245, "2080/240.0", "2090/240.0", "LLWWL", Down),
        standing("KKR", 6, 6, -0.123, "2000/240.0", "2050/240.0", "WLLLW", Same),
        standing("SRH", 5, 7, -0.567, "1950/240.0", "2100/240.0", "LWLWL", Down),
        standing("DC", 4, 8, -0.789, "1900/240.0", "2150/240.0", "LLLWL", Down),
        standing("RR", 3, 9, -1.234, "1850/240.0", "2200/240.0", "LLWLL", Down),
        standing("PBKS", 2, 10, -1.567, "1800/240.0", "2250/240.0", "LLLLW", Down),
    ]
}

pub fn schedule() -> Vec<MatchRecord> {
    vec![
        fixture("1", date(2025, 8, 7), "19:30", ["MI", "CSK"], WANKHEDE),
        with_score(
            fixture("2", date(2025, 8, 6), "19:30", ["RCB", "KKR"], CHINNASWAMY),
            MatchStatus::Live,
            "156/4 (18.3)",
            "142/8 (20)",
        ),
        fixture("3", date(2025, 8, 8), "15:30", ["SRH", "DC"], UPPAL),
        fixture("4", date(2025, 8, 9), "19:30", ["RR", "PBKS"], "Sawai Mansingh Stadium, Jaipur"),
        fixture("5", date(2025, 8, 10), "19:30", ["CSK", "RCB"], "M. A. Chidambaram Stadium, Chennai"),
    ]
}

pub fn results() -> Vec<MatchRecord> {
    vec![
        completed(
            fixture("result_1", date(2025, 8, 3), "19:30", ["RCB", "PBKS"], MOTERA),
            "190/9 (20.0 OV)",
            "184/7 (20.0 OV)",
            "Royal Challengers Bengaluru Won by 6 Runs (Winners)",
            "Final",
        ),
        completed(
            fixture("result_2", date(2025, 8, 1), "19:30", ["PBKS", "MI"], MOTERA),
            "207/5 (19.0 OV)",
            "203/6 (20.0 OV)",
            "Punjab Kings Won by 5 Wickets (Qualified)",
            "Qualifier 2",
        ),
        completed(
            fixture("result_3", date(2025, 5, 30), "19:30", ["GT", "MI"], MULLANPUR),
            "208/6 (20.0 OV)",
            "228/5 (20.0 OV)",
            "Mumbai Indians Won by 20 Runs (Qualified)",
            "Eliminator",
        ),
        completed(
            fixture("result_4", date(2025, 5, 29), "19:30", ["RCB", "DC"], MULLANPUR),
            "187/4 (18.2 OV)",
            "185/8 (20.0 OV)",
            "Royal Challengers Bengaluru Won by 8 Wickets (Qualified)",
            "Qualifier 1",
        ),
        completed(
            fixture("result_5", date(2025, 5, 28), "19:30", ["CSK", "KKR"], "Eden Gardens, Kolkata"),
            "176/8 (20.0 OV)",
            "180/4 (19.1 OV)",
            "Kolkata Knight Riders Won by 6 Wickets",
            "Match 70",
        ),
        completed(
            fixture("result_6", date(2025, 5, 27), "15:30", ["SRH", "RR"], UPPAL),
            "201/7 (20.0 OV)",
            "187/9 (20.0 OV)",
            "Sunrisers Hyderabad Won by 14 Runs",
            "Match 69",
        ),
        completed(
            fixture("result_7", date(2025, 5, 26), "19:30", ["MI", "LSG"], WANKHEDE),
            "214/6 (20.0 OV)",
            "196/5 (20.0 OV)",
            "Mumbai Indians Won by 18 Runs",
            "Match 68",
        ),
    ]
}

/// The fully static snapshot served when a refresh fails outright.
pub fn default_snapshot() -> DataSnapshot {
    DataSnapshot {
        matches: matches(),
        points_table: points_table(),
        schedule: schedule(),
        results: results(),
    }
}
