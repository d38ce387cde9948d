//! Publication parsing
//!
//! Converts the raw markup of one fetched publication into per-date,
//! per-queue outage intervals plus free-text operational messages.
//!
//! Parsing happens in two stages:
//!
//! - [`page`] slices the HTML into per-date blocks using the date-marker
//!   images and `<hr>` separators the source uses between days;
//! - [`schedule`] turns each block's text into `QueueId -> intervals`
//!   plus the block's operational message.
//!
//! The source pages are manually edited, so stray queue labels are skipped
//! with a warning rather than failing the whole publication. A publication
//! where nothing parses at all is an error, not an empty result: the
//! source always publishes at least one queue's schedule when reachable.

pub mod page;
pub mod schedule;

pub use page::{PageExtractor, ScheduleBlock};
pub use schedule::{BlockParser, ParsedDay};

use tracing::warn;

use crate::error::{Error, Result};

/// Two-stage parser for a complete fetched publication
pub struct PublicationParser {
    extractor: PageExtractor,
    block_parser: BlockParser,
}

impl PublicationParser {
    pub fn new() -> Self {
        Self {
            extractor: PageExtractor::new(),
            block_parser: BlockParser::new(),
        }
    }

    /// Parse the raw page markup into one [`ParsedDay`] per published date
    ///
    /// Fails with [`Error::MalformedPublication`] when no block yields any
    /// queue schedule, or when a time range would cross midnight.
    pub fn parse_publication(&self, html: &str) -> Result<Vec<ParsedDay>> {
        let blocks = self.extractor.extract_blocks(html);
        if blocks.is_empty() {
            return Err(Error::MalformedPublication(
                "no schedule blocks found in page".to_string(),
            ));
        }

        let mut days = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let day = self.block_parser.parse_block(block)?;
            if day.queues.is_empty() {
                warn!(date = %day.date, "schedule block contained no parsable queues, skipping");
                continue;
            }
            days.push(day);
        }

        if days.is_empty() {
            return Err(Error::MalformedPublication(
                "no queue schedules recognized in publication".to_string(),
            ));
        }

        Ok(days)
    }
}

impl Default for PublicationParser {
    fn default() -> Self {
        Self::new()
    }
}
