//! Status code selection.

use std::str::FromStr;

use rand::Rng;

use crate::echo::params::ParamError;

/// Requested status: a literal code, or a draw from the code pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSpec {
    Fixed(i64),
    Random,
}

impl FromStr for CodeSpec {
    type Err = ParamError;

    /// `random` and `r` select from the pool; anything else must be an integer.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "random" | "r" => Ok(CodeSpec::Random),
            other => parse_code("code", other).map(CodeSpec::Fixed),
        }
    }
}

/// Parse a comma-separated code pool. Any bad entry rejects the whole list.
pub fn parse_code_list(value: &str) -> Result<Vec<i64>, ParamError> {
    value
        .split(',')
        .map(|entry| parse_code("codes", entry.trim()))
        .collect()
}

fn parse_code(param: &'static str, value: &str) -> Result<i64, ParamError> {
    value.parse().map_err(|_| ParamError::InvalidInteger {
        param,
        value: value.to_string(),
    })
}

/// Pick a code uniformly at random. `None` when the pool is empty.
pub fn pick_random(pool: &[i64]) -> Option<i64> {
    if pool.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..pool.len());
    tracing::debug!(len = pool.len(), index, code = pool[index], "Random code selected");
    Some(pool[index])
}
