//! Fixed-width coloured bar showing each kind's share of a count set.

use crate::core::result::ResultKind;
use crate::core::stats::KindCounts;

pub const BAR_WIDTH: usize = 80;
const BOX: char = '▓';

const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const MAGENTA: &str = "\x1b[95m";
const CYAN: &str = "\x1b[96m";
const WHITE: &str = "\x1b[97m";
const GREY: &str = "\x1b[90m";
const CYAN_UNDERLINE: &str = "\x1b[4;36m";
const RESET: &str = "\x1b[0m";

/// Colours handed out, in order, to kinds without a preferred colour.
const COLOR_CYCLE: [&str; 9] = [
    GREEN,
    RED,
    YELLOW,
    BLUE,
    MAGENTA,
    CYAN,
    WHITE,
    GREY,
    CYAN_UNDERLINE,
];

/// One coloured run of the bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: ResultKind,
    pub width: usize,
    pub color: &'static str,
}

fn preferred_colors() -> [(ResultKind, &'static str); 4] {
    [
        (ResultKind::Success, GREEN),
        (ResultKind::Error, RED),
        (ResultKind::Timeout, YELLOW),
        (ResultKind::AflErr, CYAN_UNDERLINE),
    ]
}

/// Split `width` cells between the kinds in `counts`.
///
/// Preferred kinds come first in their fixed order, then the rest by name.
/// Each segment gets the floor of its share; the cells lost to rounding go to
/// the widest segment so the widths always add up to `width`.
pub fn segments(counts: &KindCounts, width: usize) -> Vec<Segment> {
    let total = counts.total();
    if total == 0 {
        return Vec::new();
    }
    let share = |n: u64| (width as u128 * n as u128 / total as u128) as usize;

    let preferred = preferred_colors();
    let mut cycle: Vec<&'static str> = COLOR_CYCLE
        .iter()
        .copied()
        .filter(|color| {
            !preferred
                .iter()
                .any(|(kind, pref)| pref == color && counts.get(kind) > 0)
        })
        .collect();
    if cycle.is_empty() {
        cycle.push(WHITE);
    }

    let mut out = Vec::new();
    for (kind, color) in &preferred {
        let n = counts.get(kind);
        if n > 0 {
            out.push(Segment {
                kind: kind.clone(),
                width: share(n),
                color: *color,
            });
        }
    }
    // The cycle position advances past one slot per preferred segment drawn.
    let offset = out.len();
    let rest = counts
        .iter()
        .filter(|(kind, n)| *n > 0 && !preferred.iter().any(|(pref, _)| pref == *kind));
    for (i, (kind, n)) in rest.enumerate() {
        out.push(Segment {
            kind: kind.clone(),
            width: share(n),
            color: cycle[(offset + i) % cycle.len()],
        });
    }

    let used: usize = out.iter().map(|segment| segment.width).sum();
    let mut widest = 0;
    for (i, segment) in out.iter().enumerate() {
        if segment.width > out[widest].width {
            widest = i;
        }
    }
    out[widest].width += width - used;
    out
}

/// Render the bar followed by its legend.
pub fn draw(counts: &KindCounts) -> String {
    let segments = segments(counts, BAR_WIDTH);
    let bar: String = segments
        .iter()
        .map(|s| format!("{}{}{RESET}", s.color, BOX.to_string().repeat(s.width)))
        .collect();
    let legend: Vec<String> = segments
        .iter()
        .map(|s| format!("{}{BOX}{RESET} {}", s.color, s.kind))
        .collect();
    format!("{bar}  {}", legend.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widths(segments: &[Segment]) -> Vec<(&str, usize)> {
        segments.iter().map(|s| (s.kind.as_str(), s.width)).collect()
    }

    #[test]
    fn widths_always_sum_to_bar_width() {
        let cases = [
            KindCounts::from([(ResultKind::Success, 1)]),
            KindCounts::from([(ResultKind::Success, 1), (ResultKind::Timeout, 2)]),
            KindCounts::from([
                (ResultKind::Success, 7),
                (ResultKind::Error, 3),
                (ResultKind::Timeout, 11),
                (ResultKind::AflErr, 1),
                (ResultKind::RunError, 13),
                (ResultKind::Other("X".to_string()), 97),
            ]),
            KindCounts::from([(ResultKind::UnknownErr, 1), (ResultKind::Success, 999_999)]),
        ];
        for counts in &cases {
            let total: usize = segments(counts, BAR_WIDTH).iter().map(|s| s.width).sum();
            assert_eq!(total, BAR_WIDTH, "{counts}");
        }
    }

    #[test]
    fn remainder_goes_to_largest_segment() {
        let counts = KindCounts::from([(ResultKind::Success, 2), (ResultKind::Timeout, 1)]);
        assert_eq!(widths(&segments(&counts, 80)), vec![("Success", 54), ("Timeout", 26)]);
    }

    #[test]
    fn preferred_kinds_first_then_by_name() {
        let counts = KindCounts::from([
            (ResultKind::RunError, 1),
            (ResultKind::AflErr, 1),
            (ResultKind::NoLogErr, 1),
            (ResultKind::Success, 1),
        ]);
        let segs = segments(&counts, 80);
        let order: Vec<&str> = segs.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(order, vec!["Success", "AFLErr", "NoLogErr", "RunError"]);
    }

    #[test]
    fn preferred_colors_are_not_reused() {
        let counts = KindCounts::from([(ResultKind::Success, 1), (ResultKind::RunError, 1)]);
        let segs = segments(&counts, 80);
        assert_eq!(segs[0].color, GREEN);
        assert_ne!(segs[1].color, GREEN);
    }

    #[test]
    fn cycle_skips_one_slot_per_preferred_segment() {
        let counts = KindCounts::from([
            (ResultKind::Success, 1),
            (ResultKind::Timeout, 1),
            (ResultKind::NoLogErr, 1),
            (ResultKind::RunError, 1),
        ]);
        let colors: Vec<&str> = segments(&counts, 80).iter().map(|s| s.color).collect();
        // GREEN and YELLOW leave the cycle; the first free kind starts at slot 2.
        assert_eq!(colors, vec![GREEN, YELLOW, MAGENTA, CYAN]);
    }

    #[test]
    fn empty_counts_draw_nothing() {
        assert!(segments(&KindCounts::default(), 80).is_empty());
    }

    #[test]
    fn draw_contains_every_cell_and_legend() {
        let counts = KindCounts::from([(ResultKind::Success, 3), (ResultKind::Timeout, 1)]);
        let drawn = draw(&counts);
        // legend adds one box per kind
        assert_eq!(drawn.chars().filter(|c| *c == BOX).count(), BAR_WIDTH + 2);
        assert!(drawn.contains("Success"));
        assert!(drawn.contains("Timeout"));
    }
}
