//! Integration tests for publication parsing
//!
//! Exercises the full page-to-intervals path on realistic markup shaped
//! like the source site's publications.

use svitlo::error::Error;
use svitlo::models::{ClockTime, IntervalKind, QueueId, TimeInterval};
use svitlo::parser::PublicationParser;

fn iv(start: &str, end: &str, kind: IntervalKind) -> TimeInterval {
    TimeInterval::new(
        ClockTime::parse(start).unwrap(),
        ClockTime::parse(end).unwrap(),
        kind,
    )
    .unwrap()
}

fn q(s: &str) -> QueueId {
    s.parse().unwrap()
}

/// Two-day publication in the source's usual shape: notices above each
/// date marker, base schedule list below, days separated by <hr>.
const TWO_DAY_PAGE: &str = r#"
<html><body>
<div class="post">
    <p>Шановні клієнти!</p>
    <p>Електроенергія у підчергах подається згідно з затвердженим графіком.</p>
    <p>16 січня у підчергах 2.1, 2.2 додатково буде знеструмлено з 16:00 до 18:00 за командою Укренерго.</p>
    <p><img src="/img/gpv16.png" alt="ГПВ-16.01.26"></p>
    <ul>
        <li>підчерга 1.1 – з 04:00 до 09:00;</li>
        <li>підчерга 1.2 – з 05:00 до 10:00;</li>
        <li>підчерга 2.1 – з 06:00 до 11:00 та з 18:00 до 23:00;</li>
        <li>підчерга 2.2 – з 07:00 до 12:00;</li>
    </ul>
    <hr>
    <p><img src="/img/gpv15.png" alt="ГПВ-15.01.26"></p>
    <ul>
        <li>підчерга 1.1 – з 10:00 до 15:00;</li>
        <li>підчерга 6.2 – з 22:00 до 24:00.</li>
    </ul>
</div>
</body></html>
"#;

#[test]
fn parses_two_day_publication() {
    let days = PublicationParser::new()
        .parse_publication(TWO_DAY_PAGE)
        .unwrap();

    assert_eq!(days.len(), 2);

    let first = &days[0];
    assert_eq!(first.date.to_string(), "2026-01-16");
    assert_eq!(first.queues.len(), 4);
    assert_eq!(
        first.queues[&q("2.1")][..2],
        [
            iv("06:00", "11:00", IntervalKind::Base),
            iv("18:00", "23:00", IntervalKind::Base),
        ]
    );

    let second = &days[1];
    assert_eq!(second.date.to_string(), "2026-01-15");
    assert_eq!(second.queues.len(), 2);
    assert_eq!(second.queues[&q("6.2")][0].end, ClockTime::END_OF_DAY);
}

#[test]
fn notice_ranges_land_on_named_queues_only() {
    let days = PublicationParser::new()
        .parse_publication(TWO_DAY_PAGE)
        .unwrap();

    let first = &days[0];
    let adj = iv("16:00", "18:00", IntervalKind::Adjustment);

    assert!(first.queues[&q("2.1")].contains(&adj));
    assert!(first.queues[&q("2.2")].contains(&adj));
    assert!(!first.queues[&q("1.1")].contains(&adj));
    assert!(!first.queues[&q("1.2")].contains(&adj));
}

#[test]
fn notice_text_survives_as_message() {
    let days = PublicationParser::new()
        .parse_publication(TWO_DAY_PAGE)
        .unwrap();

    let message = days[0].message.as_deref().unwrap();
    assert!(message.contains("додатково"));
    assert!(message.contains("Укренерго"));
    // Greeting and boilerplate paragraphs are not part of the message.
    assert!(!message.contains("Шановні"));
    assert!(!message.contains("затвердженим графіком"));

    // The second day has no notices of its own.
    assert!(days[1].message.is_none());
}

#[test]
fn notices_stay_attached_to_their_own_day() {
    // Notices published between two days belong to the day below them.
    let html = r#"
    <div class="post">
        <img alt="ГПВ-16.01.26">
        <ul><li>підчерга 1.1 – з 04:00 до 09:00;</li></ul>
        <hr>
        <p>У підчерзі 3.1 відключення триватиме довше.</p>
        <img alt="ГПВ-15.01.26">
        <ul><li>підчерга 3.1 – з 08:00 до 13:00;</li></ul>
    </div>
    "#;

    let days = PublicationParser::new().parse_publication(html).unwrap();
    assert_eq!(days.len(), 2);
    assert!(days[0].message.is_none());
    assert!(days[1].message.as_deref().unwrap().contains("довше"));
}

#[test]
fn empty_page_is_malformed() {
    let err = PublicationParser::new()
        .parse_publication("<html><body><p>сторінку оновлюється</p></body></html>")
        .unwrap_err();
    assert!(matches!(err, Error::MalformedPublication(_)));
}

#[test]
fn midnight_crossing_range_fails_publication() {
    let html = r#"
    <div class="post">
        <img alt="ГПВ-15.01.26">
        <ul><li>підчерга 1.1 – з 22:00 до 02:00;</li></ul>
    </div>
    "#;

    let err = PublicationParser::new().parse_publication(html).unwrap_err();
    assert!(matches!(err, Error::MalformedPublication(_)));
}

#[test]
fn stray_queue_labels_do_not_fail_the_day() {
    let html = r#"
    <div class="post">
        <img alt="ГПВ-15.01.26">
        <ul>
            <li>підчерга 8.1 – з 04:00 до 09:00;</li>
            <li>підчерга 4.2 – з 12:00 до 17:00;</li>
        </ul>
    </div>
    "#;

    let days = PublicationParser::new().parse_publication(html).unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].queues.len(), 1);
    assert_eq!(
        days[0].queues[&q("4.2")],
        vec![iv("12:00", "17:00", IntervalKind::Base)]
    );
}
