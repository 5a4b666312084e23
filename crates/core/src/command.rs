//! Chat command parsing.
//!
//! Directive matching is ordered: the URL-bearing `!play <url>` form is
//! tried before the bare `!play` control command, so a prefix never
//! shadows the argument-bearing form. Parse failures are returned to
//! the caller; deciding whether (and how) to tell the user about them
//! is the chat handler's job.

use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use thiserror::Error;
use url::Url;

use crate::types::{ControlCommand, PlaybackRequest, ViewMode};

/// Help text sent in response to `?help` and as the corrective part of
/// usage errors.
pub const USAGE: &str = "Commands: \
`!play <url> [--speed <value>] [--fullscreen]` queues a video \
(example: `!play https://youtu.be/xyz123 --speed 1.5 --fullscreen`), \
`!view <fullscreen|theater|default>` changes the view mode, \
`!pause` / `!play` / `!skip` control the current video, \
and a bare video link queues it with default options.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Play(PlaybackRequest),
    Control(ControlCommand),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid play command; use `!play <url> [--speed <value>] [--fullscreen]`")]
    InvalidPlay,

    #[error("unknown view mode `{0}`; use `!view fullscreen`, `!view theater`, or `!view default`")]
    UnknownViewMode(String),

    #[error("missing view mode; use `!view fullscreen`, `!view theater`, or `!view default`")]
    MissingViewMode,
}

fn play_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^!play\s+(https?://\S+)\s*(.*)$").unwrap())
}

fn speed_option() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)--speed\s+(\S+)").unwrap())
}

/// Turns one line of chat into a typed command.
///
/// `Ok(None)` means the text is not addressed to the jukebox at all and
/// should pass through untouched.
pub fn parse(text: &str) -> Result<Option<ChatCommand>, ParseError> {
    let trimmed = text.trim();

    if let Some(captures) = play_directive().captures(trimmed) {
        let url = Url::parse(&captures[1]).map_err(|_| ParseError::InvalidPlay)?;
        return Ok(Some(ChatCommand::Play(parse_play_options(
            url,
            captures.get(2).map_or("", |m| m.as_str()),
        ))));
    }

    let mut tokens = trimmed.split_whitespace();
    match tokens.next() {
        // A `!play` that did not match the URL form: bare means resume,
        // anything else is a malformed play request.
        Some("!play") => match tokens.next() {
            None => Ok(Some(ChatCommand::Control(ControlCommand::Resume))),
            Some(_) => Err(ParseError::InvalidPlay),
        },
        Some("!pause") => Ok(Some(ChatCommand::Control(ControlCommand::Pause))),
        Some("!skip") => Ok(Some(ChatCommand::Control(ControlCommand::Skip))),
        Some("!view") => {
            let word = tokens.next().ok_or(ParseError::MissingViewMode)?;
            let mode = ViewMode::from_str(word)
                .map_err(|unknown| ParseError::UnknownViewMode(unknown.0))?;
            Ok(Some(ChatCommand::Control(ControlCommand::SetViewMode(mode))))
        }
        Some("?help") | Some("!help") => Ok(Some(ChatCommand::Help)),
        _ => Ok(implicit_link(trimmed)),
    }
}

fn parse_play_options(url: Url, options: &str) -> PlaybackRequest {
    let mut request = PlaybackRequest::new(url);

    // Malformed speed values fall back to the default rather than
    // rejecting the whole command.
    if let Some(captures) = speed_option().captures(options) {
        if let Ok(speed) = captures[1].parse::<f64>() {
            if speed.is_finite() && speed > 0.0 {
                request.speed = speed;
            }
        }
    }

    // Whole-token match only: a URL containing the substring must not
    // flip the flag, and the URL is not part of `options` anyway.
    let fullscreen = options
        .split_whitespace()
        .any(|token| token.eq_ignore_ascii_case("--fullscreen"));

    request.with_fullscreen(fullscreen)
}

/// A plain message that merely contains a video link is treated as an
/// enqueue with default options.
fn implicit_link(text: &str) -> Option<ChatCommand> {
    let token = text
        .split_whitespace()
        .find(|token| token.contains("youtube.com/watch") || token.contains("youtu.be/"))?;

    let url = Url::parse(token).ok()?;
    matches!(url.scheme(), "http" | "https")
        .then(|| ChatCommand::Play(PlaybackRequest::new(url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_SPEED;

    fn parse_play(text: &str) -> PlaybackRequest {
        match parse(text).unwrap() {
            Some(ChatCommand::Play(request)) => request,
            other => panic!("expected play command, got {other:?}"),
        }
    }

    #[test]
    fn play_defaults_when_options_absent() {
        let request = parse_play("!play https://youtu.be/xyz123");
        assert_eq!(request.url.as_str(), "https://youtu.be/xyz123");
        assert_eq!(request.speed, DEFAULT_SPEED);
        assert!(!request.fullscreen);
    }

    #[test]
    fn play_with_speed_and_fullscreen() {
        let request = parse_play("!play https://youtu.be/xyz123 --speed 1.5 --fullscreen");
        assert_eq!(request.speed, 1.5);
        assert!(request.fullscreen);
    }

    #[test]
    fn non_numeric_speed_falls_back_to_default() {
        let request = parse_play("!play https://youtu.be/xyz123 --speed abc");
        assert_eq!(request.speed, DEFAULT_SPEED);
    }

    #[test]
    fn non_positive_speed_falls_back_to_default() {
        assert_eq!(parse_play("!play https://youtu.be/x --speed 0").speed, DEFAULT_SPEED);
        assert_eq!(parse_play("!play https://youtu.be/x --speed -2").speed, DEFAULT_SPEED);
    }

    #[test]
    fn missing_speed_value_falls_back_to_default() {
        let request = parse_play("!play https://youtu.be/xyz123 --speed");
        assert_eq!(request.speed, DEFAULT_SPEED);
    }

    #[test]
    fn fullscreen_flag_is_case_insensitive() {
        assert!(parse_play("!play https://youtu.be/x --Fullscreen").fullscreen);
    }

    #[test]
    fn fullscreen_substring_in_url_does_not_count() {
        let request = parse_play("!play https://example.com/watch?v=--fullscreen-tour");
        assert!(!request.fullscreen);
    }

    #[test]
    fn bare_play_is_resume() {
        assert_eq!(
            parse("!play").unwrap(),
            Some(ChatCommand::Control(ControlCommand::Resume))
        );
    }

    #[test]
    fn play_without_url_is_an_error() {
        assert_eq!(parse("!play turn it up"), Err(ParseError::InvalidPlay));
    }

    #[test]
    fn playlist_is_not_a_play_directive() {
        assert_eq!(parse("!playlist show").unwrap(), None);
    }

    #[test]
    fn view_round_trips() {
        assert_eq!(
            parse("!view theater").unwrap(),
            Some(ChatCommand::Control(ControlCommand::SetViewMode(ViewMode::Theater)))
        );
    }

    #[test]
    fn unknown_view_mode_is_an_error_not_a_crash() {
        assert_eq!(
            parse("!view loud"),
            Err(ParseError::UnknownViewMode("loud".to_string()))
        );
    }

    #[test]
    fn view_without_mode_is_an_error() {
        assert_eq!(parse("!view"), Err(ParseError::MissingViewMode));
    }

    #[test]
    fn bare_controls() {
        assert_eq!(
            parse("!pause").unwrap(),
            Some(ChatCommand::Control(ControlCommand::Pause))
        );
        assert_eq!(
            parse("!skip").unwrap(),
            Some(ChatCommand::Control(ControlCommand::Skip))
        );
        assert_eq!(parse("?help").unwrap(), Some(ChatCommand::Help));
    }

    #[test]
    fn plain_link_is_an_implicit_enqueue() {
        let request = parse_play("https://www.youtube.com/watch?v=xyz123");
        assert_eq!(request.speed, DEFAULT_SPEED);
        assert!(!request.fullscreen);
    }

    #[test]
    fn link_inside_chatter_is_detected() {
        let request = parse_play("have you all seen https://youtu.be/xyz123 yet?");
        assert_eq!(request.url.as_str(), "https://youtu.be/xyz123");
    }

    #[test]
    fn unrelated_chatter_passes_through() {
        assert_eq!(parse("good evening everyone").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn schemeless_link_passes_through() {
        assert_eq!(parse("youtu.be/xyz123").unwrap(), None);
    }
}
