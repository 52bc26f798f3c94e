//! Server configuration read from `FLAG_DUEL_*` environment variables.

use crate::controllers::lifecycle::{GameRules, MercyRule, RulesError};
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

const ADDR: &str = "FLAG_DUEL_ADDR";
const QUESTIONS: &str = "FLAG_DUEL_QUESTIONS";
const ROUND_SECS: &str = "FLAG_DUEL_ROUND_SECS";
const INTERMISSION_MS: &str = "FLAG_DUEL_INTERMISSION_MS";
const FIXED_ROUNDS: &str = "FLAG_DUEL_FIXED_ROUNDS";
const MERCY_ROUND: &str = "FLAG_DUEL_MERCY_ROUND";
const MERCY_GAP: &str = "FLAG_DUEL_MERCY_GAP";
const OPTIONS: &str = "FLAG_DUEL_OPTIONS";
const QUESTIONS_PER_MATCH: &str = "FLAG_DUEL_QUESTIONS_PER_MATCH";
const MAX_SUDDEN_DEATH: &str = "FLAG_DUEL_MAX_SUDDEN_DEATH";

const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3030);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    /// Dataset file; the builtin flag set is used when absent.
    pub questions_path: Option<PathBuf>,
    pub rules: GameRules,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    InvalidVar { var: &'static str, value: String },
    #[error("invalid game rules: {0}")]
    InvalidRules(#[from] RulesError),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(DEFAULT_ADDR),
            questions_path: None,
            rules: GameRules::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a config from any variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = GameRules::default();
        let default_mercy = defaults.mercy.unwrap_or(MercyRule {
            after_round: 2,
            gap: 2,
        });

        let mercy_gap = vars.parse(MERCY_GAP)?.unwrap_or(default_mercy.gap);
        let mercy = (mercy_gap > 0).then(|| -> Result<MercyRule, ConfigError> {
            Ok(MercyRule {
                after_round: vars
                    .parse(MERCY_ROUND)?
                    .unwrap_or(default_mercy.after_round),
                gap: mercy_gap,
            })
        });

        let rules = GameRules {
            round_time: vars
                .parse(ROUND_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.round_time),
            intermission: vars
                .parse(INTERMISSION_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.intermission),
            fixed_rounds: vars.parse(FIXED_ROUNDS)?.unwrap_or(defaults.fixed_rounds),
            mercy: mercy.transpose()?,
            options_per_round: vars.parse(OPTIONS)?.unwrap_or(defaults.options_per_round),
            questions_per_match: vars.parse(QUESTIONS_PER_MATCH)?,
            max_sudden_death_rounds: vars.parse(MAX_SUDDEN_DEATH)?,
        };
        rules.validate()?;

        Ok(Self {
            addr: vars
                .parse(ADDR)?
                .unwrap_or_else(|| SocketAddr::from(DEFAULT_ADDR)),
            questions_path: vars.get(QUESTIONS).map(PathBuf::from),
            rules,
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, var: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(var)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidVar { var, value })
            })
            .transpose()
    }
}
