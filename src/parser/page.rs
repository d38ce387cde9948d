//! HTML page extraction
//!
//! The source page lists several days of schedules in one document:
//!
//! ```text
//! [operational notices]          <p> paragraphs BEFORE the marker
//! <img alt="ГПВ-DD.MM.YY">       date marker image
//! <ul>base schedule</ul>         one <li> per queue
//! <hr>                           separator before the next day
//! ```
//!
//! Extraction walks the content container's elements in document order and
//! slices them into per-date blocks around the marker images.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Raw text for one date's publication, before schedule parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBlock {
    pub date: NaiveDate,
    /// Lines of the base schedule list, one queue per line
    pub schedule_text: String,
    /// Operational notice paragraphs published above the marker
    pub extras_text: String,
}

/// Keywords that mark a paragraph as an operational notice
const NOTICE_KEYWORDS: &[&str] = &[
    "підчерг",
    "відключення",
    "знеструм",
    "раніше",
    "довше",
    "додатково",
    "укренерго",
];

/// Boilerplate lead-in paragraph repeated on every page, not a notice
const BOILERPLATE_PREFIX: &str = "Електроенергія у підчерг";

/// Flattened view of the elements the block-slicing algorithm cares about
#[derive(Debug)]
enum PageElement {
    DateMarker(NaiveDate),
    List(String),
    Paragraph(String),
    Separator,
}

/// Extracts per-date schedule blocks from the page markup
pub struct PageExtractor {
    container_selector: Selector,
    item_selector: Selector,
    date_pattern: Regex,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self {
            // Hardcoded selectors; parse() only fails on invalid syntax.
            container_selector: Selector::parse("div.post, article").unwrap(),
            item_selector: Selector::parse("li").unwrap(),
            date_pattern: Regex::new(r"ГПВ-(\d{2})\.(\d{2})\.(\d{2,4})").unwrap(),
        }
    }

    /// Extract all date-marked schedule blocks from the page
    ///
    /// Returns an empty vector when the page has no recognizable content;
    /// the caller decides whether that is an error.
    pub fn extract_blocks(&self, html: &str) -> Vec<ScheduleBlock> {
        let document = Html::parse_document(html);

        let Some(container) = document.select(&self.container_selector).next() else {
            return Vec::new();
        };

        let elements = self.flatten(container);

        let markers: Vec<(usize, NaiveDate)> = elements
            .iter()
            .enumerate()
            .filter_map(|(i, el)| match el {
                PageElement::DateMarker(date) => Some((i, *date)),
                _ => None,
            })
            .collect();

        let mut blocks = Vec::with_capacity(markers.len());

        for (n, &(marker_idx, date)) in markers.iter().enumerate() {
            // Notices for this day start after the previous day's separator.
            let mut extras_start = 0;
            if n > 0 {
                let prev_idx = markers[n - 1].0;
                for (j, el) in elements.iter().enumerate().take(marker_idx).skip(prev_idx + 1) {
                    if matches!(el, PageElement::Separator) {
                        extras_start = j + 1;
                        break;
                    }
                }
            }

            // The schedule runs until the next separator or the next marker.
            let mut schedule_end = elements.len();
            for (j, el) in elements.iter().enumerate().skip(marker_idx + 1) {
                if matches!(el, PageElement::Separator | PageElement::DateMarker(_)) {
                    schedule_end = j;
                    break;
                }
            }

            let mut extras_text = String::new();
            for el in &elements[extras_start..marker_idx] {
                if let PageElement::Paragraph(text) = el {
                    if text.starts_with(BOILERPLATE_PREFIX) {
                        continue;
                    }
                    let lower = text.to_lowercase();
                    if NOTICE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                        extras_text.push_str(text);
                        extras_text.push('\n');
                    }
                }
            }

            let mut schedule_text = String::new();
            for el in &elements[marker_idx + 1..schedule_end] {
                if let PageElement::List(text) = el {
                    if text.to_lowercase().contains("підчерга") {
                        schedule_text.push_str(text);
                        schedule_text.push('\n');
                    }
                }
            }

            if schedule_text.is_empty() {
                warn!(%date, "date marker without a schedule list, skipping");
                continue;
            }

            blocks.push(ScheduleBlock {
                date,
                schedule_text,
                extras_text: extras_text.trim().to_string(),
            });
        }

        blocks
    }

    /// Flatten the container into the element kinds the slicer understands,
    /// in document order
    fn flatten(&self, container: ElementRef<'_>) -> Vec<PageElement> {
        let mut elements = Vec::new();

        for node in container.descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };

            match el.value().name() {
                "img" => {
                    let alt = el.value().attr("alt").unwrap_or("");
                    if let Some(date) = self.parse_marker_date(alt) {
                        elements.push(PageElement::DateMarker(date));
                    }
                }
                "ul" => {
                    let lines: Vec<String> = el
                        .select(&self.item_selector)
                        .map(|li| collapse_text(li))
                        .filter(|line| !line.is_empty())
                        .collect();
                    if !lines.is_empty() {
                        elements.push(PageElement::List(lines.join("\n")));
                    }
                }
                "p" => {
                    let text = collapse_text(el);
                    if !text.is_empty() {
                        elements.push(PageElement::Paragraph(text));
                    }
                }
                "hr" => elements.push(PageElement::Separator),
                _ => {}
            }
        }

        elements
    }

    /// Parse `ГПВ-DD.MM.YY` (or a four-digit year) from an image alt text
    fn parse_marker_date(&self, alt: &str) -> Option<NaiveDate> {
        let caps = self.date_pattern.captures(alt)?;

        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year_raw = &caps[3];
        let year: i32 = year_raw.parse().ok()?;
        let year = if year_raw.len() == 2 { 2000 + year } else { year };

        let date = NaiveDate::from_ymd_opt(year, month, day);
        if date.is_none() {
            warn!(alt, "date marker with impossible date, ignoring");
        }
        date
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenate an element's text with whitespace collapsed
fn collapse_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}
