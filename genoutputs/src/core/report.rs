//! Human-readable campaign summary, rendered from [`CampaignStats`].

use std::fmt::Write;

use crate::core::bar;
use crate::core::result::ResultKind;
use crate::core::stats::CampaignStats;

/// Render the stats block printed after a campaign (or by `--stats-only`).
pub fn render_stats(stats: &CampaignStats) -> String {
    let combined = stats.combined();
    let mut out = String::new();

    out.push_str("Stats:\n");
    for (name, counts) in stats.gentypes() {
        let _ = writeln!(out, "  {name}: {counts}");
    }
    let _ = writeln!(out, "  combined: {combined}");

    out.push_str("Stats (visual):\n");
    for (name, counts) in stats.gentypes() {
        let _ = writeln!(out, "  {name}: {}", bar::draw(counts));
    }
    let _ = writeln!(out, "  combined: {}", bar::draw(&combined));

    let total = combined.total();
    let success = combined.get(&ResultKind::Success);
    let _ = writeln!(out, "     total: {total} files attempted");
    let _ = writeln!(out, "   success: {success} files generated");
    if total != 0 {
        let _ = writeln!(
            out,
            "  success%: {:.2}%",
            success as f64 / total as f64 * 100.0
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::OutcomeRecord;

    #[test]
    fn report_lists_gentypes_and_totals() {
        let records = vec![
            OutcomeRecord::synthetic(ResultKind::Success, "var_0000.complete.py", "f"),
            OutcomeRecord::synthetic(ResultKind::Success, "var_0000.complete.py", "f"),
            OutcomeRecord::synthetic(ResultKind::Timeout, "var_0001.infilled.py", "f"),
        ];
        let stats = CampaignStats::from_records(&records, 2);
        let text = render_stats(&stats);
        assert!(text.contains("  complete: {Success: 2}\n"));
        assert!(text.contains("  infilled: {Timeout: 1}\n"));
        assert!(text.contains("  combined: {Success: 2, Timeout: 1}\n"));
        assert!(text.contains("     total: 3 files attempted\n"));
        assert!(text.contains("   success: 2 files generated\n"));
        assert!(text.contains("  success%: 66.67%\n"));
    }

    #[test]
    fn empty_log_report_has_no_percentage() {
        let text = render_stats(&CampaignStats::default());
        assert!(text.contains("  combined: {}\n"));
        assert!(text.contains("     total: 0 files attempted\n"));
        assert!(!text.contains("success%"));
    }

    #[test]
    fn all_failures_report_zero_success() {
        let records =
            vec![OutcomeRecord::synthetic(ResultKind::NoLogErr, "var_0003.complete.py", "f"); 4];
        let text = render_stats(&CampaignStats::from_records(&records, 4));
        assert!(text.contains("  success%: 0.00%\n"));
    }
}
