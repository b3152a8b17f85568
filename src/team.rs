//! Teams, operating modes, and the model resolver.
//!
//! A team is one of four fixed slots. The operating mode decides which and
//! how many backend models a team fans out to. [`resolve`] is pure and
//! total: every `(team, mode)` pair maps to a non-empty, order-stable list,
//! and that order is the order labels and response blocks appear in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const GEMINI_PRO: &str = "google/gemini-2.5-pro";
const DEEPSEEK_R1: &str = "deepseek/deepseek-r1-0528-qwen3-8b:free";
const CLAUDE_OPUS: &str = "anthropic/claude-opus-4";
const GROK: &str = "x-ai/grok-4";

/// One of the four team slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TeamId {
    One,
    Two,
    Three,
    Four,
}

impl TeamId {
    pub const ALL: [TeamId; 4] = [TeamId::One, TeamId::Two, TeamId::Three, TeamId::Four];

    pub fn number(self) -> u8 {
        match self {
            TeamId::One => 1,
            TeamId::Two => 2,
            TeamId::Three => 3,
            TeamId::Four => 4,
        }
    }
}

impl TryFrom<u8> for TeamId {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(TeamId::One),
            2 => Ok(TeamId::Two),
            3 => Ok(TeamId::Three),
            4 => Ok(TeamId::Four),
            other => Err(format!("unknown team: {other} (expected 1-4)")),
        }
    }
}

impl From<TeamId> for u8 {
    fn from(team: TeamId) -> Self {
        team.number()
    }
}

impl FromStr for TeamId {
    type Err = String;

    /// Accepts `"3"`, `"team3"` or `"Team 3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let digits = lower.strip_prefix("team").unwrap_or(&lower).trim();
        let n: u8 = digits
            .parse()
            .map_err(|_| format!("invalid team: {s:?} (expected 1-4)"))?;
        TeamId::try_from(n)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team {}", self.number())
    }
}

/// How many and which backend models a team maps to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One free model, same for every team.
    #[default]
    Eco,
    /// One model per team, different for each team.
    Options,
    /// Two high-tier models.
    Pro,
    /// All four models.
    Max,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Eco, Mode::Options, Mode::Pro, Mode::Max];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Eco => "eco",
            Mode::Options => "options",
            Mode::Pro => "pro",
            Mode::Max => "max",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a team and mode to the ordered list of backend model ids.
pub fn resolve(team: TeamId, mode: Mode) -> Vec<&'static str> {
    match mode {
        Mode::Max => vec![GEMINI_PRO, DEEPSEEK_R1, CLAUDE_OPUS, GROK],
        Mode::Pro => vec![CLAUDE_OPUS, GROK],
        Mode::Options => vec![match team {
            TeamId::One => DEEPSEEK_R1,
            TeamId::Two => CLAUDE_OPUS,
            TeamId::Three => GROK,
            TeamId::Four => GEMINI_PRO,
        }],
        Mode::Eco => vec![DEEPSEEK_R1],
    }
}

/// Like [`resolve`] for a raw team number. Unknown numbers get Team 1's mapping.
pub fn resolve_number(team: u8, mode: Mode) -> Vec<&'static str> {
    let team = TeamId::try_from(team).unwrap_or_else(|_| {
        tracing::warn!(team, "unknown team number, falling back to Team 1 models");
        TeamId::One
    });
    resolve(team, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pair_resolves_non_empty() {
        for team in TeamId::ALL {
            for mode in Mode::ALL {
                assert!(!resolve(team, mode).is_empty(), "{team} / {mode}");
            }
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        for team in TeamId::ALL {
            for mode in Mode::ALL {
                assert_eq!(resolve(team, mode), resolve(team, mode));
            }
        }
    }

    #[test]
    fn max_uses_four_models_in_fixed_order() {
        assert_eq!(
            resolve(TeamId::Three, Mode::Max),
            vec![GEMINI_PRO, DEEPSEEK_R1, CLAUDE_OPUS, GROK]
        );
    }

    #[test]
    fn pro_uses_two_models() {
        assert_eq!(resolve(TeamId::One, Mode::Pro), vec![CLAUDE_OPUS, GROK]);
    }

    #[test]
    fn options_differs_per_team() {
        let picks: Vec<_> = TeamId::ALL
            .iter()
            .map(|t| resolve(*t, Mode::Options)[0])
            .collect();
        assert_eq!(picks, vec![DEEPSEEK_R1, CLAUDE_OPUS, GROK, GEMINI_PRO]);
    }

    #[test]
    fn eco_is_same_for_every_team() {
        for team in TeamId::ALL {
            assert_eq!(resolve(team, Mode::Eco), vec![DEEPSEEK_R1]);
        }
    }

    #[test]
    fn unknown_team_number_falls_back_to_team_one() {
        assert_eq!(
            resolve_number(9, Mode::Options),
            resolve(TeamId::One, Mode::Options)
        );
        assert_eq!(resolve_number(0, Mode::Max).len(), 4);
    }

    #[test]
    fn known_team_number_resolves_normally() {
        assert_eq!(
            resolve_number(4, Mode::Options),
            resolve(TeamId::Four, Mode::Options)
        );
    }

    #[test]
    fn team_parses_from_strings() {
        assert_eq!("2".parse::<TeamId>().unwrap(), TeamId::Two);
        assert_eq!("team3".parse::<TeamId>().unwrap(), TeamId::Three);
        assert_eq!("Team 4".parse::<TeamId>().unwrap(), TeamId::Four);
        assert!("5".parse::<TeamId>().is_err());
        assert!("x".parse::<TeamId>().is_err());
    }

    #[test]
    fn team_serializes_as_number() {
        assert_eq!(serde_json::to_string(&TeamId::Two).unwrap(), "2");
        let team: TeamId = serde_json::from_str("4").unwrap();
        assert_eq!(team, TeamId::Four);
        assert!(serde_json::from_str::<TeamId>("7").is_err());
    }

    #[test]
    fn team_display() {
        assert_eq!(TeamId::One.to_string(), "Team 1");
    }

    #[test]
    fn mode_default_is_eco() {
        assert_eq!(Mode::default(), Mode::Eco);
        assert_eq!(Mode::Max.to_string(), "max");
    }
}
