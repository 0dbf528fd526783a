//! # Report Formatter
//!
//! Plain-text rendering of availability reports and sync summaries.
//!
//! ## Daily Report Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  📊 Stop-list report for 01.03.2026 08:00-21:00                         │
//! │                                                                         │
//! │  ▫️ Mushroom soup — 03:12                                               │
//! │  ▫️ Cheesecake — 00:45                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are rendered in the order the aggregator returns them.

use std::fmt::Write;

use crate::diff::DiffResult;
use crate::types::{AggregatedEntry, ItemState};

/// Body of a report with no entries.
pub const NO_STOPS_SENTINEL: &str = "No items were stopped in this period.";

/// Placeholder line for an empty summary section.
const EMPTY_SECTION: &str = "▫️ —";

/// Hashtag appended to sync summaries so chats can filter them.
const SYNC_TAG: &str = "#stoplist";

/// Formats seconds as `HH:MM`, truncating leftover seconds.
///
/// Zero and negative inputs render as `00:00`. Hours are not capped.
///
/// ## Example
/// ```rust
/// use stoplist_core::report::format_duration;
///
/// assert_eq!(format_duration(0), "00:00");
/// assert_eq!(format_duration(3661), "01:01");
/// assert_eq!(format_duration(360_000), "100:00");
/// ```
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "00:00".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{:02}:{:02}", hours, minutes)
}

/// Renders the aggregated report for a window.
pub fn render_report(entries: &[AggregatedEntry], label: &str) -> String {
    let mut out = format!("📊 Stop-list report for {}\n\n", label);

    if entries.is_empty() {
        out.push_str(NO_STOPS_SENTINEL);
        return out;
    }

    for entry in entries {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "▫️ {} — {}",
            entry.display_name,
            format_duration(entry.unavailable_seconds)
        );
    }
    out
}

/// Renders the message sent after a sync cycle.
///
/// Items whose stock moved while stopped are listed under "Still stopped"
/// with their new stock level.
pub fn render_sync_summary(diff: &DiffResult) -> String {
    let mut out = String::from("Newly stopped 🚫");
    push_lines(&mut out, diff.entered.iter().map(|i| i.display_name.clone()));

    out.push_str("\n\nBack in stock ✅");
    push_lines(&mut out, diff.exited.iter().map(|i| i.display_name.clone()));

    let mut still: Vec<(&ItemState, bool)> = diff
        .unchanged
        .iter()
        .map(|i| (i, false))
        .chain(diff.changed.iter().map(|i| (i, true)))
        .collect();
    still.sort_by(|a, b| a.0.identity.cmp(&b.0.identity));

    out.push_str("\n\nStill stopped");
    push_lines(
        &mut out,
        still.into_iter().map(|(item, changed)| {
            if changed {
                format!("{} (stock: {})", item.display_name, item.stock_level)
            } else {
                item.display_name.clone()
            }
        }),
    );

    let _ = write!(
        out,
        "\n\n{}\n\n✅ Sync complete. Added: {}, removed: {}",
        SYNC_TAG,
        diff.entered.len(),
        diff.exited.len()
    );
    out
}

fn push_lines(out: &mut String, lines: impl Iterator<Item = String>) {
    let mut any = false;
    for line in lines {
        any = true;
        out.push_str("\n▫️ ");
        out.push_str(&line);
    }
    if !any {
        out.push('\n');
        out.push_str(EMPTY_SECTION);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ExitedItem;
    use crate::types::ItemIdentity;

    fn id(raw: &str) -> ItemIdentity {
        ItemIdentity::parse(raw).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(-30), "00:00");
        assert_eq!(format_duration(59), "00:00");
        assert_eq!(format_duration(3661), "01:01");
        assert_eq!(format_duration(4500), "01:15");
        assert_eq!(format_duration(3000), "00:50");
    }

    #[test]
    fn test_render_report_lines() {
        let entries = vec![
            AggregatedEntry {
                identity: id("A"),
                display_name: "Soup".to_string(),
                unavailable_seconds: 4500,
            },
            AggregatedEntry {
                identity: id("B"),
                display_name: "Tea".to_string(),
                unavailable_seconds: 3600,
            },
        ];
        let text = render_report(&entries, "01.03.2026 08:00-21:00");

        assert_eq!(
            text,
            "📊 Stop-list report for 01.03.2026 08:00-21:00\n\n▫️ Soup — 01:15\n▫️ Tea — 01:00\n"
        );
    }

    #[test]
    fn test_render_report_empty_uses_sentinel() {
        let text = render_report(&[], "01.03.2026");
        assert!(text.ends_with(NO_STOPS_SENTINEL));
        assert!(!text.contains("▫️"));
    }

    #[test]
    fn test_render_sync_summary() {
        let diff = DiffResult {
            entered: vec![ItemState::new(id("A"), "Soup", 0.0)],
            exited: vec![ExitedItem {
                identity: id("B"),
                display_name: "Tea".to_string(),
            }],
            unchanged: vec![ItemState::new(id("D"), "Pie", 0.0)],
            changed: vec![ItemState::reported_stopped(id("C"), "Cake", 1.5)],
        };
        let text = render_sync_summary(&diff);

        assert_eq!(
            text,
            "Newly stopped 🚫\n▫️ Soup\n\n\
             Back in stock ✅\n▫️ Tea\n\n\
             Still stopped\n▫️ Cake (stock: 1.5)\n▫️ Pie\n\n\
             #stoplist\n\n✅ Sync complete. Added: 1, removed: 1"
        );
    }

    #[test]
    fn test_render_sync_summary_empty_sections() {
        let text = render_sync_summary(&DiffResult::default());
        assert_eq!(text.matches(EMPTY_SECTION).count(), 3);
        assert!(text.ends_with("Added: 0, removed: 0"));
    }
}
