use std::fmt::Write;

use crate::config::{DISTRIBUTION_BUCKETS, MAX_GRADE, MIN_GRADE};
use crate::models::ModuleStatistics;

fn format_average(average: f64) -> String {
    if average.is_nan() {
        "n/a".to_string()
    } else {
        format!("{average:.2}")
    }
}

pub fn build_report(module: &str, institution: &str, stats: &ModuleStatistics) -> String {
    let mut output = String::new();
    let total = &stats.total;

    let _ = writeln!(output, "# Grade Statistics for {module} ({institution})");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Total");

    if total.count == 0 {
        let _ = writeln!(output, "No grades recorded for this module.");
    } else {
        let _ = writeln!(
            output,
            "- {} grades: {} passed, {} failed",
            total.count, total.passed, total.failed
        );
        let _ = writeln!(output, "- average {}", format_average(total.average));
        let _ = writeln!(output, "- median {:.2}", total.median);
        if let Some(stddev) = total.stddev {
            let _ = writeln!(output, "- standard deviation {stddev:.2}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Period");

    if stats.detailed.is_empty() {
        let _ = writeln!(output, "No periods recorded for this module.");
    } else {
        for period in stats.detailed.iter() {
            let source = period
                .provenance
                .as_ref()
                .map(|p| format!(" [source: {}]", p.source))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {}: average {:.2}, {} passed, {} failed{}",
                period.period, period.average, period.passed, period.failed, source
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribution");

    let width = (MAX_GRADE - MIN_GRADE) / DISTRIBUTION_BUCKETS as f64;
    for (index, count) in stats.distribution.iter().enumerate() {
        let low = MIN_GRADE + width * index as f64;
        let _ = writeln!(output, "- {:.2}-{:.2}: {}", low, low + width, count);
    }

    output
}
