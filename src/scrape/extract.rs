//! Record extraction from rendered league pages.
//!
//! Every lookup is optional: a missing cell or an unparseable number
//! degrades that field, a record missing a required field is skipped, and
//! nothing here can fail the page as a whole.

use chrono::{NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::data::models::{
    round_nrr, FormResult, MatchRecord, MatchStatus, PositionTrend, StandingsRow,
};

/// Result items scanned per page unless configured otherwise.
pub const DEFAULT_RESULTS_SCAN_LIMIT: usize = 20;

const DEFAULT_MATCH_TIME: &str = "19:30";
const DEFAULT_VENUE: &str = "TBD";
/// Cells a points-table row needs before it is considered at all.
const MIN_STANDINGS_CELLS: usize = 10;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static STANDINGS_ROW: LazyLock<Selector> =
    LazyLock::new(|| selector("#pointsdata tr, .ih-td-tab tbody tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static POS_STATUS: LazyLock<Selector> = LazyLock::new(|| selector(".posStatus"));
static TEAM_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".ih-pt-cont, h2"));
static FORM_ENTRY: LazyLock<Selector> = LazyLock::new(|| selector(".rf"));

static RESULT_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("#team_archive li"));
static MATCH_ORDER: LazyLock<Selector> = LazyLock::new(|| selector(".vn-matchOrder"));
static VENUE: LazyLock<Selector> = LazyLock::new(|| selector(".vn-venueDet p"));
static DATE_TIME: LazyLock<Selector> = LazyLock::new(|| selector(".vn-matchDateTime"));
static RESULT_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".vn-ticketTitle"));
static TEAM_BLOCK: LazyLock<Selector> = LazyLock::new(|| selector(".vn-shedTeam"));
static TEAM_CODE: LazyLock<Selector> = LazyLock::new(|| selector(".vn-teamCode h3"));
static TEAM_SCORE: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static TEAM_OVERS: LazyLock<Selector> = LazyLock::new(|| selector(".ov-display"));

// ── Standings ────────────────────────────────────────────────────────────────

/// Extract the points table in page order.
///
/// A row is kept when it names a team and its played count is a positive
/// integer; every other field falls back to zero or absent.
pub fn extract_standings(document: &Html) -> Vec<StandingsRow> {
    let rows: Vec<StandingsRow> = document
        .select(&STANDINGS_ROW)
        .filter_map(standings_row)
        .collect();
    debug!("Extracted {} standings rows", rows.len());
    rows
}

fn standings_row(row: ElementRef<'_>) -> Option<StandingsRow> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.len() < MIN_STANDINGS_CELLS {
        return None;
    }
    let cell_text = |i: usize| cells.get(i).map(|c| element_text(*c)).unwrap_or_default();
    let count = |i: usize| leading_int(&cell_text(i)).unwrap_or(0);

    let team = cells
        .get(2)
        .map(|c| first_text(*c, &TEAM_NAME))
        .unwrap_or_default();
    let played = count(3);
    if team.is_empty() || played == 0 {
        return None;
    }

    let recent_form: Vec<FormResult> = cells
        .get(11)
        .map(|c| {
            c.select(&FORM_ENTRY)
                .filter_map(|span| FormResult::from_symbol(&element_text(span)))
                .collect()
        })
        .unwrap_or_default();

    Some(StandingsRow {
        team,
        played,
        won: count(4),
        lost: count(5),
        nr: count(6),
        nrr: round_nrr(leading_float(&cell_text(7)).unwrap_or(0.0)),
        points: count(10),
        runs_for: non_empty(cell_text(8)),
        runs_against: non_empty(cell_text(9)),
        recent_form: (!recent_form.is_empty()).then_some(recent_form),
        pos_change: Some(position_trend(cells.get(1).copied())),
    })
}

fn position_trend(cell: Option<ElementRef<'_>>) -> PositionTrend {
    let Some(status) = cell.and_then(|c| c.select(&POS_STATUS).next()) else {
        return PositionTrend::Same;
    };
    if has_class(status, "pts-up") {
        PositionTrend::Up
    } else if has_class(status, "pts-down") {
        PositionTrend::Down
    } else {
        PositionTrend::Same
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

/// Extract completed matches from the results archive, scanning at most
/// `max_items` list entries.
pub fn extract_results(document: &Html, max_items: usize) -> Vec<MatchRecord> {
    let today = Utc::now().date_naive();
    let results: Vec<MatchRecord> = document
        .select(&RESULT_ITEM)
        .take(max_items)
        .enumerate()
        .filter_map(|(i, item)| result_record(i, item, today))
        .collect();
    debug!("Extracted {} result records", results.len());
    results
}

struct TeamLine {
    code: String,
    score: String,
    overs: String,
}

impl TeamLine {
    fn read(block: ElementRef<'_>) -> Self {
        TeamLine {
            code: first_text(block, &TEAM_CODE),
            score: first_text(block, &TEAM_SCORE),
            overs: first_text(block, &TEAM_OVERS),
        }
    }

    fn display_score(&self) -> Option<String> {
        if self.score.is_empty() {
            return None;
        }
        if self.overs.is_empty() {
            Some(self.score.clone())
        } else {
            Some(format!("{} {}", self.score, self.overs))
        }
    }
}

fn result_record(index: usize, item: ElementRef<'_>, today: NaiveDate) -> Option<MatchRecord> {
    let is_away = |b: &ElementRef<'_>| has_class(*b, "vn-team-2");
    let blocks: Vec<ElementRef<'_>> = item.select(&TEAM_BLOCK).collect();
    let home = blocks.iter().find(|b| !is_away(b)).map(|b| TeamLine::read(*b))?;
    let away = blocks.iter().find(|b| is_away(b)).map(|b| TeamLine::read(*b))?;
    if home.code.is_empty() || away.code.is_empty() || home.code == away.code {
        return None;
    }

    let date_time = first_text(item, &DATE_TIME);
    let venue = first_text(item, &VENUE);
    let venue = venue.trim_end_matches(|c: char| c == ',' || c.is_whitespace());

    let mut score = BTreeMap::new();
    for line in [&home, &away] {
        if let Some(s) = line.display_score() {
            score.insert(line.code.clone(), s);
        }
    }

    let record = MatchRecord {
        id: format!("result_{}", index),
        date: parse_match_date(&date_time).unwrap_or(today),
        time: parse_match_time(&date_time).unwrap_or_else(|| DEFAULT_MATCH_TIME.to_string()),
        teams: [home.code, away.code],
        venue: if venue.is_empty() {
            DEFAULT_VENUE.to_string()
        } else {
            venue.to_string()
        },
        status: MatchStatus::Completed,
        score: (!score.is_empty()).then_some(score),
        result: non_empty(first_text(item, &RESULT_TEXT)),
        match_order: non_empty(first_text(item, &MATCH_ORDER)),
    };
    Some(record).filter(MatchRecord::is_well_formed)
}

// ── Field helpers ────────────────────────────────────────────────────────────

/// Whitespace-normalised text content of an element.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> String {
    scope.select(sel).next().map(element_text).unwrap_or_default()
}

fn has_class(el: ElementRef<'_>, name: &str) -> bool {
    el.value().classes().any(|c| c == name)
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Leading unsigned integer of a cell ("12*" → 12). Signed or empty text
/// yields `None`.
fn leading_int(text: &str) -> Option<u32> {
    let t = text.trim();
    let t = t.strip_prefix('+').unwrap_or(t);
    let end = t.find(|c: char| !c.is_ascii_digit()).unwrap_or(t.len());
    t[..end].parse().ok()
}

/// Leading decimal of a cell ("+0.4567 " → 0.4567, "-1.2 (x)" → -1.2).
fn leading_float(text: &str) -> Option<f64> {
    let t = text.trim();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in t.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    t[..end].parse().ok()
}

const DATE_FORMATS: &[&str] = &["%b %d %Y", "%d %b %Y", "%B %d %Y", "%d %B %Y"];

/// Best-effort calendar date from text such as "Sun, Jun 01, 2025, 7:30 pm".
fn parse_match_date(text: &str) -> Option<NaiveDate> {
    let cleaned = text.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if let Some(d) = tokens
        .iter()
        .find_map(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d").ok())
    {
        return Some(d);
    }
    tokens.windows(3).find_map(|w| {
        let joined = w.join(" ");
        DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(&joined, f).ok())
    })
}

/// First "h:mm" clock in the text, normalised to 24-hour "HH:MM".
fn parse_match_time(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    for (idx, _) in lower.match_indices(':') {
        let before = lower[..idx].as_bytes();
        let hour_len = before
            .iter()
            .rev()
            .take(2)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if hour_len == 0 {
            continue;
        }
        let Ok(hour) = lower[idx - hour_len..idx].parse::<u32>() else {
            continue;
        };
        let after = &lower[idx + 1..];
        let Some(minute_str) = after.get(..2).filter(|m| m.bytes().all(|b| b.is_ascii_digit()))
        else {
            continue;
        };
        let Ok(minute) = minute_str.parse::<u32>() else {
            continue;
        };
        let rest = after.get(2..).unwrap_or("").trim_start();
        let hour = match (rest.starts_with("pm"), rest.starts_with("am")) {
            (true, _) if hour < 12 => hour + 12,
            (_, true) if hour == 12 => 0,
            _ => hour,
        };
        if hour < 24 && minute < 60 {
            return Some(format!("{:02}:{:02}", hour, minute));
        }
    }
    None
}
