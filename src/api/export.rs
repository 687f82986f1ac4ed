//! Game Export Options
//!
//! Every option the Lichess "export games of a user" endpoint accepts, with
//! its default, validated when built.

use crate::error::{ApiError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Speeds and variants a game can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerfType {
    UltraBullet,
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
    Chess960,
    Crazyhouse,
    Antichess,
    Atomic,
    Horde,
    KingOfTheHill,
    RacingKings,
    ThreeCheck,
}

impl PerfType {
    /// Name used in URLs and query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            PerfType::UltraBullet => "ultraBullet",
            PerfType::Bullet => "bullet",
            PerfType::Blitz => "blitz",
            PerfType::Rapid => "rapid",
            PerfType::Classical => "classical",
            PerfType::Correspondence => "correspondence",
            PerfType::Chess960 => "chess960",
            PerfType::Crazyhouse => "crazyhouse",
            PerfType::Antichess => "antichess",
            PerfType::Atomic => "atomic",
            PerfType::Horde => "horde",
            PerfType::KingOfTheHill => "kingOfTheHill",
            PerfType::RacingKings => "racingKings",
            PerfType::ThreeCheck => "threeCheck",
        }
    }
}

impl fmt::Display for PerfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Side played by the exported user
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Query value for `color`
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Export order by game date
pub enum SortOrder {
    #[default]
    #[serde(rename = "dateDesc")]
    DateDesc,
    #[serde(rename = "dateAsc")]
    DateAsc,
}

impl SortOrder {
    /// Query value for `sort`
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::DateDesc => "dateDesc",
            SortOrder::DateAsc => "dateAsc",
        }
    }
}

/// Validated options for a game export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: Option<u32>,
    vs: Option<String>,
    rated: Option<bool>,
    perf_types: Vec<PerfType>,
    color: Option<Color>,
    analysed: Option<bool>,
    moves: bool,
    tags: bool,
    evals: bool,
    pgn_in_json: bool,
    opening: bool,
    clocks: bool,
    accuracy: bool,
    ongoing: bool,
    finished: bool,
    literate: bool,
    last_fen: bool,
    sort: SortOrder,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            since: None,
            until: None,
            limit: None,
            vs: None,
            rated: None,
            perf_types: Vec::new(),
            color: None,
            analysed: None,
            moves: true,
            tags: true,
            evals: true,
            pgn_in_json: false,
            opening: false,
            clocks: false,
            accuracy: false,
            ongoing: false,
            finished: true,
            literate: false,
            last_fen: false,
            sort: SortOrder::DateDesc,
        }
    }
}

impl ExportOptions {
    /// Start from the defaults: finished games, newest first
    pub fn builder() -> ExportOptionsBuilder {
        ExportOptionsBuilder::default()
    }

    /// Maximum number of games, `None` for all
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Requested order
    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    /// Query parameters; unset filters are left out
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();

        if let Some(since) = self.since {
            query.push(("since", since.timestamp_millis().to_string()));
        }
        if let Some(until) = self.until {
            query.push(("until", until.timestamp_millis().to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("max", limit.to_string()));
        }
        if let Some(vs) = &self.vs {
            query.push(("vs", vs.clone()));
        }
        if let Some(rated) = self.rated {
            query.push(("rated", rated.to_string()));
        }
        if !self.perf_types.is_empty() {
            let joined = self
                .perf_types
                .iter()
                .map(PerfType::as_str)
                .collect::<Vec<_>>()
                .join(",");
            query.push(("perfType", joined));
        }
        if let Some(color) = self.color {
            query.push(("color", color.as_str().to_string()));
        }
        if let Some(analysed) = self.analysed {
            query.push(("analysed", analysed.to_string()));
        }

        query.extend([
            ("moves", self.moves.to_string()),
            ("tags", self.tags.to_string()),
            ("evals", self.evals.to_string()),
            ("pgnInJson", self.pgn_in_json.to_string()),
            ("opening", self.opening.to_string()),
            ("clocks", self.clocks.to_string()),
            ("accuracy", self.accuracy.to_string()),
            ("ongoing", self.ongoing.to_string()),
            ("finished", self.finished.to_string()),
            ("literate", self.literate.to_string()),
            ("lastFen", self.last_fen.to_string()),
            ("sort", self.sort.as_str().to_string()),
        ]);

        query
    }
}

/// Builder for [`ExportOptions`]
#[derive(Debug, Clone, Default)]
pub struct ExportOptionsBuilder {
    options: ExportOptions,
}

impl ExportOptionsBuilder {
    /// Games played since this time (default: account creation)
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.options.since = Some(since);
        self
    }

    /// Games played until this time (default: now)
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.options.until = Some(until);
        self
    }

    /// At most this many games (default: all)
    pub fn limit(mut self, limit: u32) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Only games against this opponent
    pub fn vs(mut self, opponent: impl Into<String>) -> Self {
        self.options.vs = Some(opponent.into());
        self
    }

    /// Only rated (true) or casual (false) games
    pub fn rated(mut self, rated: bool) -> Self {
        self.options.rated = Some(rated);
        self
    }

    /// Only games in this speed or variant; may be called repeatedly
    pub fn perf_type(mut self, perf: PerfType) -> Self {
        if !self.options.perf_types.contains(&perf) {
            self.options.perf_types.push(perf);
        }
        self
    }

    /// Only games played as this color
    pub fn color(mut self, color: Color) -> Self {
        self.options.color = Some(color);
        self
    }

    /// Only games with (true) or without (false) computer analysis
    pub fn analysed(mut self, analysed: bool) -> Self {
        self.options.analysed = Some(analysed);
        self
    }

    /// Include the move list
    pub fn moves(mut self, moves: bool) -> Self {
        self.options.moves = moves;
        self
    }

    /// Include PGN tags
    pub fn tags(mut self, tags: bool) -> Self {
        self.options.tags = tags;
        self
    }

    /// Include engine evaluations where available
    pub fn evals(mut self, evals: bool) -> Self {
        self.options.evals = evals;
        self
    }

    /// Embed the full PGN in each JSON game
    pub fn pgn_in_json(mut self, pgn_in_json: bool) -> Self {
        self.options.pgn_in_json = pgn_in_json;
        self
    }

    /// Include the opening name
    pub fn opening(mut self, opening: bool) -> Self {
        self.options.opening = opening;
        self
    }

    /// Include clock comments
    pub fn clocks(mut self, clocks: bool) -> Self {
        self.options.clocks = clocks;
        self
    }

    /// Include accuracy percentages
    pub fn accuracy(mut self, accuracy: bool) -> Self {
        self.options.accuracy = accuracy;
        self
    }

    /// Include ongoing games; the last 3 moves are omitted
    pub fn ongoing(mut self, ongoing: bool) -> Self {
        self.options.ongoing = ongoing;
        self
    }

    /// Include finished games
    pub fn finished(mut self, finished: bool) -> Self {
        self.options.finished = finished;
        self
    }

    /// Textual annotations about the opening, mistakes, and termination
    pub fn literate(mut self, literate: bool) -> Self {
        self.options.literate = literate;
        self
    }

    /// Include the final position as FEN
    pub fn last_fen(mut self, last_fen: bool) -> Self {
        self.options.last_fen = last_fen;
        self
    }

    /// Order by date, newest first unless changed
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.options.sort = sort;
        self
    }

    /// Validate and return the options
    ///
    /// Fails with [`ApiError::InvalidOption`] on an inverted date range, a
    /// zero limit, a blank opponent name, or when both ongoing and finished
    /// games are excluded.
    pub fn build(self) -> Result<ExportOptions> {
        let options = self.options;

        if let (Some(since), Some(until)) = (options.since, options.until) {
            if since > until {
                return Err(ApiError::InvalidOption(format!(
                    "since ({}) is after until ({})",
                    since, until
                )));
            }
        }

        if options.limit == Some(0) {
            return Err(ApiError::InvalidOption("limit must be at least 1".to_string()));
        }

        if let Some(vs) = &options.vs {
            if vs.trim().is_empty() {
                return Err(ApiError::InvalidOption("vs must not be empty".to_string()));
            }
        }

        if !options.ongoing && !options.finished {
            return Err(ApiError::InvalidOption(
                "at least one of ongoing and finished must be set".to_string(),
            ));
        }

        Ok(options)
    }
}
