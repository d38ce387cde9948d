//! Schedule block parsing
//!
//! Turns one date's block text into per-queue outage intervals. The base
//! schedule list carries one queue per line:
//!
//! ```text
//! підчерга 1.1 – з 04:00 до 09:00;
//! ```
//!
//! Operational notices are free text. Only strict `з HH:MM до HH:MM`
//! tokens attached to explicitly named queues become [`IntervalKind::Adjustment`]
//! intervals; the notice itself is always preserved verbatim as the day's
//! message, and no natural-language time expressions are interpreted.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::warn;

use crate::error::Result;
use crate::models::{ClockTime, IntervalKind, QueueId, TimeInterval};
use crate::parser::page::ScheduleBlock;

/// Parsed intervals and message for one published date
#[derive(Debug, Clone)]
pub struct ParsedDay {
    pub date: chrono::NaiveDate,
    pub queues: BTreeMap<QueueId, Vec<TimeInterval>>,
    pub message: Option<String>,
}

/// Regex-driven parser for one schedule block
pub struct BlockParser {
    /// `підчерга N.N` at the start of a base schedule line
    queue_label: Regex,
    /// Strict `з HH:MM до HH:MM` range token
    time_range: Regex,
    /// Any inflection of the queue word, marking a notice clause
    queue_mention: Regex,
    /// Queue numbers following a queue mention
    queue_numbers: Regex,
    /// A single `N.N` queue number
    queue_number: Regex,
}

impl BlockParser {
    pub fn new() -> Self {
        Self {
            // Hardcoded patterns; new() only fails on invalid syntax.
            queue_label: Regex::new(r"(?i)підчерга\s+(\d\.\d)").unwrap(),
            time_range: Regex::new(r"з\s*(\d{1,2}:\d{2})\s*до\s*(\d{1,2}:\d{2})").unwrap(),
            queue_mention: Regex::new(r"(?i)підчерг[а-яіїє]*").unwrap(),
            queue_numbers: Regex::new(r"(?i)підчерг[а-яіїє]*\s*№?\s*([\d.,\s]+)").unwrap(),
            queue_number: Regex::new(r"\d\.\d").unwrap(),
        }
    }

    /// Parse one block into per-queue intervals and the day's message
    ///
    /// Stray labels outside the valid 12 queues are skipped with a warning.
    /// A range crossing midnight fails the whole publication.
    pub fn parse_block(&self, block: &ScheduleBlock) -> Result<ParsedDay> {
        let mut queues: BTreeMap<QueueId, Vec<TimeInterval>> = BTreeMap::new();

        for line in block.schedule_text.lines() {
            let Some(caps) = self.queue_label.captures(line) else {
                continue;
            };

            let label = &caps[1];
            let queue: QueueId = match label.parse() {
                Ok(q) => q,
                Err(_) => {
                    warn!(label, date = %block.date, "stray queue label, ignoring");
                    continue;
                }
            };

            let intervals = self.extract_ranges(line, IntervalKind::Base)?;
            if !intervals.is_empty() {
                // A duplicate block for the same queue: the later occurrence
                // overwrites the earlier one.
                queues.insert(queue, intervals);
            }
        }

        if !block.extras_text.is_empty() {
            self.apply_notices(&block.extras_text, &mut queues)?;
        }

        let message = match block.extras_text.trim() {
            "" => None,
            text => Some(text.to_string()),
        };

        Ok(ParsedDay {
            date: block.date,
            queues,
            message,
        })
    }

    /// Extract strict range tokens from one line as intervals of `kind`
    fn extract_ranges(&self, text: &str, kind: IntervalKind) -> Result<Vec<TimeInterval>> {
        let mut intervals = Vec::new();

        for caps in self.time_range.captures_iter(text) {
            let (Some(start), Some(end)) = (ClockTime::parse(&caps[1]), ClockTime::parse(&caps[2]))
            else {
                warn!(token = &caps[0], "unparsable time range, ignoring");
                continue;
            };
            intervals.push(TimeInterval::new(start, end, kind)?);
        }

        Ok(intervals)
    }

    /// Attach strict range tokens from notice text to the queues the notice
    /// names, as adjustment intervals
    ///
    /// The notice is split into clauses at each mention of the queue word;
    /// a clause contributes intervals only when it names queues and carries
    /// strict range tokens. Everything else stays text.
    fn apply_notices(
        &self,
        extras: &str,
        queues: &mut BTreeMap<QueueId, Vec<TimeInterval>>,
    ) -> Result<()> {
        let starts: Vec<usize> = self.queue_mention.find_iter(extras).map(|m| m.start()).collect();

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(extras.len());
            let clause = &extras[start..end];

            let named = self.named_queues(clause);
            if named.is_empty() {
                continue;
            }

            let intervals = self.extract_ranges(clause, IntervalKind::Adjustment)?;
            for queue in named {
                queues.entry(queue).or_default().extend(intervals.iter().copied());
            }
        }

        Ok(())
    }

    /// Queue ids explicitly named right after a queue-word mention
    fn named_queues(&self, clause: &str) -> Vec<QueueId> {
        let mut found = Vec::new();

        for caps in self.queue_numbers.captures_iter(clause) {
            for m in self.queue_number.find_iter(&caps[1]) {
                match m.as_str().parse::<QueueId>() {
                    Ok(q) => {
                        if !found.contains(&q) {
                            found.push(q);
                        }
                    }
                    Err(_) => warn!(label = m.as_str(), "stray queue number in notice, ignoring"),
                }
            }
        }

        found
    }
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::NaiveDate;

    fn block(schedule: &str, extras: &str) -> ScheduleBlock {
        ScheduleBlock {
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            schedule_text: schedule.to_string(),
            extras_text: extras.to_string(),
        }
    }

    fn iv(start: &str, end: &str, kind: IntervalKind) -> TimeInterval {
        TimeInterval::new(
            ClockTime::parse(start).unwrap(),
            ClockTime::parse(end).unwrap(),
            kind,
        )
        .unwrap()
    }

    #[test]
    fn parses_base_schedule_lines() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 1.1 – з 04:00 до 09:00;\nпідчерга 2.1 – з 06:00 до 11:00 та з 18:00 до 23:00.",
                "",
            ))
            .unwrap();

        let q11: QueueId = "1.1".parse().unwrap();
        let q21: QueueId = "2.1".parse().unwrap();

        assert_eq!(day.queues[&q11], vec![iv("04:00", "09:00", IntervalKind::Base)]);
        assert_eq!(
            day.queues[&q21],
            vec![
                iv("06:00", "11:00", IntervalKind::Base),
                iv("18:00", "23:00", IntervalKind::Base),
            ]
        );
        assert!(day.message.is_none());
    }

    #[test]
    fn normalizes_single_digit_hours() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block("підчерга 3.2 – з 7:00 до 9:30;", ""))
            .unwrap();

        let q: QueueId = "3.2".parse().unwrap();
        assert_eq!(day.queues[&q], vec![iv("07:00", "09:30", IntervalKind::Base)]);
    }

    #[test]
    fn accepts_day_boundary_ranges() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 1.1 – з 00:00 до 02:00;\nпідчерга 1.2 – з 22:00 до 24:00;",
                "",
            ))
            .unwrap();

        let q12: QueueId = "1.2".parse().unwrap();
        assert_eq!(day.queues[&q12][0].end, ClockTime::END_OF_DAY);
    }

    #[test]
    fn midnight_wrap_is_malformed() {
        let parser = BlockParser::new();
        let err = parser
            .parse_block(&block("підчерга 1.1 – з 22:00 до 02:00;", ""))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedPublication(_)));
    }

    #[test]
    fn stray_label_is_ignored_not_fatal() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 7.1 – з 04:00 до 09:00;\nпідчерга 1.1 – з 10:00 до 12:00;",
                "",
            ))
            .unwrap();

        assert_eq!(day.queues.len(), 1);
        assert!(day.queues.contains_key(&"1.1".parse().unwrap()));
    }

    #[test]
    fn duplicate_block_later_occurrence_wins() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 1.1 – з 04:00 до 09:00;\nпідчерга 1.1 – з 10:00 до 12:00;",
                "",
            ))
            .unwrap();

        let q: QueueId = "1.1".parse().unwrap();
        assert_eq!(day.queues[&q], vec![iv("10:00", "12:00", IntervalKind::Base)]);
    }

    #[test]
    fn notice_range_becomes_adjustment() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 2.1 – з 06:00 до 11:00;",
                "У підчергах 2.1, 2.2 додатково буде знеструмлено з 16:00 до 18:00.",
            ))
            .unwrap();

        let q21: QueueId = "2.1".parse().unwrap();
        let q22: QueueId = "2.2".parse().unwrap();
        let adj = iv("16:00", "18:00", IntervalKind::Adjustment);

        assert!(day.queues[&q21].contains(&adj));
        assert_eq!(day.queues[&q22], vec![adj]);
        assert!(day.message.as_deref().unwrap().contains("додатково"));
    }

    #[test]
    fn natural_language_notice_stays_text_only() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 3.1 – з 08:00 до 13:00;",
                "Відключення у підчерги 3.1 розпочнеться раніше – о 07:00.",
            ))
            .unwrap();

        let q: QueueId = "3.1".parse().unwrap();
        // "о 07:00" is not a strict range token, so the schedule keeps only
        // the base interval; the notice survives as the message.
        assert_eq!(day.queues[&q], vec![iv("08:00", "13:00", IntervalKind::Base)]);
        assert!(day.message.as_deref().unwrap().contains("раніше"));
    }

    #[test]
    fn notice_without_queue_numbers_adds_nothing() {
        let parser = BlockParser::new();
        let day = parser
            .parse_block(&block(
                "підчерга 1.1 – з 04:00 до 09:00;",
                "За командою Укренерго відключення діятимуть з 16:00 до 18:00 по всій області.",
            ))
            .unwrap();

        let q: QueueId = "1.1".parse().unwrap();
        assert_eq!(day.queues[&q].len(), 1);
        assert!(day.message.is_some());
    }
}
