//! Chat command parsing
//!
//! `!chaos <map id> [difficulty] [m:ss]`

use chaos_common::Difficulty;
use once_cell::sync::Lazy;
use regex::Regex;

/// Difficulty and start-time overrides, matched against the whole message
static DIFF_TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<diff>Easy|Normal|Hard|Expert|ExpertPlus)?( (?P<m>[0-9]{1,2}):(?P<s>[0-5]?[0-9])|$)",
    )
    .expect("difficulty/time pattern is valid")
});

/// A message addressed to the request command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCommand<'a> {
    /// Full message text
    pub text: &'a str,
    /// Map identifier as typed
    pub target: Option<&'a str>,
    /// Whitespace-separated token count, command included
    pub token_count: usize,
}

impl<'a> RequestCommand<'a> {
    /// `None` unless the first token is `prefix`
    pub fn parse(text: &'a str, prefix: &str) -> Option<Self> {
        let text = text.trim();
        let mut tokens = text.split_whitespace();

        let command = tokens.next()?;
        if !command.eq_ignore_ascii_case(prefix.trim()) {
            return None;
        }

        let target = tokens.next();
        let token_count = 1 + usize::from(target.is_some()) + tokens.count();

        Some(Self {
            text,
            target,
            token_count,
        })
    }

    /// True if anything follows the map identifier
    pub fn has_trailing_args(&self) -> bool {
        self.token_count > 2
    }
}

/// What the difficulty/time pattern found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffTimeMatch {
    pub difficulty: Option<Difficulty>,
    /// `(minutes, seconds)`
    pub time: Option<(u32, u32)>,
}

impl DiffTimeMatch {
    pub fn start_time_secs(&self) -> Option<u32> {
        self.time
            .map(|(m, s)| chaos_common::human_time::minutes_seconds_to_secs(m, s))
    }
}

/// Apply the override pattern to a message (first match wins)
pub fn match_diff_time(text: &str) -> DiffTimeMatch {
    let Some(caps) = DIFF_TIME_PATTERN.captures(text) else {
        return DiffTimeMatch::default();
    };

    let difficulty = caps
        .name("diff")
        .and_then(|d| d.as_str().parse::<Difficulty>().ok());

    let time = match (caps.name("m"), caps.name("s")) {
        (Some(m), Some(s)) => m
            .as_str()
            .parse::<u32>()
            .ok()
            .zip(s.as_str().parse::<u32>().ok()),
        _ => None,
    };

    DiffTimeMatch { difficulty, time }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let cmd = RequestCommand::parse("!chaos abcd123456 hard 1:30", "!chaos").unwrap();
        assert_eq!(cmd.target, Some("abcd123456"));
        assert_eq!(cmd.token_count, 4);
        assert!(cmd.has_trailing_args());

        let cmd = RequestCommand::parse("  !CHAOS   25f ", "!chaos").unwrap();
        assert_eq!(cmd.target, Some("25f"));
        assert_eq!(cmd.token_count, 2);
        assert!(!cmd.has_trailing_args());

        let cmd = RequestCommand::parse("!chaos", "!chaos").unwrap();
        assert_eq!(cmd.target, None);
    }

    #[test]
    fn test_other_messages_are_not_commands() {
        assert!(RequestCommand::parse("hello !chaos 25f", "!chaos").is_none());
        assert!(RequestCommand::parse("!chaosfoo 25f", "!chaos").is_none());
        assert!(RequestCommand::parse("", "!chaos").is_none());
    }

    #[test]
    fn test_match_diff_and_time() {
        let m = match_diff_time("!chaos abcd123456 hard 1:30");
        assert_eq!(m.difficulty, Some(Difficulty::Hard));
        assert_eq!(m.time, Some((1, 30)));
        assert_eq!(m.start_time_secs(), Some(90));
    }

    #[test]
    fn test_match_expert_plus_case_insensitive() {
        let m = match_diff_time("!chaos 25f expertplus");
        assert_eq!(m.difficulty, Some(Difficulty::ExpertPlus));
        assert_eq!(m.time, None);

        let m = match_diff_time("!chaos 25f Expert");
        assert_eq!(m.difficulty, Some(Difficulty::Expert));
    }

    #[test]
    fn test_time_without_difficulty() {
        let m = match_diff_time("!chaos 25f 2:33");
        assert_eq!(m.difficulty, None);
        assert_eq!(m.start_time_secs(), Some(153));
    }

    #[test]
    fn test_invalid_time_does_not_match_time_group() {
        let m = match_diff_time("!chaos 25f hard 1.30");
        assert_eq!(m.time, None);
        assert_eq!(m.difficulty, None);

        let m = match_diff_time("!chaos 25f hard soon");
        assert_eq!(m.time, None);
        assert_eq!(m.difficulty, None);
    }

    #[test]
    fn test_unknown_difficulty_word() {
        let m = match_diff_time("!chaos 25f impossible");
        assert_eq!(m.difficulty, None);
        assert_eq!(m.time, None);
    }
}
