use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::TimestampPolicy;
use crate::error::{Error, Result};

lazy_static! {
    static ref COMMAND_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// A `[ignored] [timestamp] [command] ...` line that passed the field and
/// command checks. The timestamp is still raw text at this point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub line_number: usize,
    pub timestamp: &'a str,
    pub command: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub timestamp: NaiveDateTime,
    pub command: String,
}

#[derive(Debug, Default)]
pub struct History {
    pub events: Vec<Event>,
    pub skipped_timestamps: usize,
}

pub fn is_command_name(token: &str) -> bool {
    COMMAND_RE.is_match(token)
}

/// Lazily yields one record per usable line. Lines with fewer than three
/// fields, or whose third field is not a plain command name, are dropped.
pub fn parse_records(text: &str) -> impl Iterator<Item = RawRecord<'_>> {
    text.lines().enumerate().filter_map(|(index, line)| {
        let mut fields = line.split_whitespace();
        let (_, timestamp, command) = (fields.next()?, fields.next()?, fields.next()?);
        if !is_command_name(command) {
            debug!(line = index + 1, command, "ignoring non-identifier command");
            return None;
        }
        Some(RawRecord {
            line_number: index + 1,
            timestamp,
            command,
        })
    })
}

/// Decodes an ISO-8601 style timestamp. Offsets are normalised to UTC and
/// sub-second precision is dropped.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return truncate_to_second(dt.naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return truncate_to_second(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn truncate_to_second(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(dt.and_utc().timestamp(), 0).map(|utc| utc.naive_utc())
}

/// Parses the whole log into events, applying `policy` to records whose
/// timestamp does not decode.
pub fn load(text: &str, policy: TimestampPolicy) -> Result<History> {
    let mut history = History::default();

    for record in parse_records(text) {
        match parse_timestamp(record.timestamp) {
            Some(timestamp) => history.events.push(Event {
                timestamp,
                command: record.command.to_string(),
            }),
            None if policy == TimestampPolicy::Fail => {
                return Err(Error::Timestamp {
                    line: record.line_number,
                    value: record.timestamp.to_string(),
                });
            }
            None => {
                debug!(line = record.line_number, value = record.timestamp, "skipping bad timestamp");
                history.skipped_timestamps += 1;
            }
        }
    }

    info!(
        events = history.events.len(),
        skipped_timestamps = history.skipped_timestamps,
        "parsed history"
    );
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn takes_second_and_third_fields() {
        let records: Vec<_> = parse_records("x 2023-01-01T00:00:05 ls -la /tmp\n").collect();
        assert_eq!(
            records,
            vec![RawRecord {
                line_number: 1,
                timestamp: "2023-01-01T00:00:05",
                command: "ls",
            }]
        );
    }

    #[test]
    fn drops_short_and_non_identifier_lines() {
        let text = "\n\
                    x 2023-01-01T00:00:05\n\
                    x 2023-01-01T00:00:05 ./run.sh\n\
                    x 2023-01-01T00:00:05 git\n\
                    x 2023-01-01T00:00:05 cargo-watch\n\
                    x 2023-01-01T00:00:05 FOO=1\n";
        let commands: Vec<_> = parse_records(text).map(|r| (r.line_number, r.command)).collect();
        assert_eq!(commands, vec![(4, "git"), (5, "cargo-watch")]);
    }

    #[test]
    fn parser_does_not_look_at_timestamps() {
        let records: Vec<_> = parse_records("x yesterday ls").collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, "yesterday");
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(parse_timestamp("2023-01-01T00:00:05"), Some(at("2023-01-01T00:00:05")));
        assert_eq!(parse_timestamp("2023-01-01T00:00:05.999"), Some(at("2023-01-01T00:00:05")));
        assert_eq!(parse_timestamp("2023-01-01T02:00:05+02:00"), Some(at("2023-01-01T00:00:05")));
        assert_eq!(parse_timestamp("2023-01-01T00:00:05Z"), Some(at("2023-01-01T00:00:05")));
        assert_eq!(parse_timestamp("2023-01-01T13:45"), Some(at("2023-01-01T13:45:00")));
        assert_eq!(parse_timestamp("2023-01-01"), Some(at("2023-01-01T00:00:00")));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2023-13-01T00:00:00"), None);
    }

    #[test]
    fn skip_policy_counts_bad_timestamps() {
        let text = "x 2023-01-01T00:00:05 ls\nx garbage cd\nx 2023-01-01T00:30:00 cd\n";
        let history = load(text, TimestampPolicy::Skip).unwrap();
        assert_eq!(history.skipped_timestamps, 1);
        assert_eq!(
            history.events,
            vec![
                Event { timestamp: at("2023-01-01T00:00:05"), command: "ls".into() },
                Event { timestamp: at("2023-01-01T00:30:00"), command: "cd".into() },
            ]
        );
    }

    #[test]
    fn fail_policy_names_the_line() {
        let text = "x 2023-01-01T00:00:05 ls\nx garbage cd\n";
        match load(text, TimestampPolicy::Fail) {
            Err(Error::Timestamp { line, value }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "garbage");
            }
            other => panic!("expected timestamp error, got {:?}", other),
        }
    }

    #[test]
    fn empty_log_loads_to_no_events() {
        let history = load("", TimestampPolicy::Fail).unwrap();
        assert!(history.events.is_empty());
    }

    proptest! {
        #[test]
        fn prop_short_lines_never_produce_records(a in "[a-z0-9:-]{1,12}", b in "[a-z0-9:-]{1,12}") {
            let one = a.clone();
            let two = format!("{} {}", a, b);
            prop_assert_eq!(parse_records(&one).count(), 0);
            prop_assert_eq!(parse_records(&two).count(), 0);
        }

        #[test]
        fn prop_bad_command_chars_never_produce_records(
            prefix in "[a-z]{0,4}",
            bad in "[./=$|&;:()]",
            suffix in "[a-z]{0,4}",
        ) {
            let line = format!("x 2023-01-01T00:00:00 {}{}{}", prefix, bad, suffix);
            prop_assert_eq!(parse_records(&line).count(), 0);
        }

        #[test]
        fn prop_identifier_commands_are_kept(cmd in "[A-Za-z0-9_-]{1,16}") {
            let line = format!("x 2023-01-01T00:00:00 {} --flag", cmd);
            let records: Vec<_> = parse_records(&line).collect();
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(records[0].command, cmd.as_str());
        }
    }
}
