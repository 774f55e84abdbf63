//! Human-readable rendering of a [`TreeUsage`].

use std::fmt;

use crate::usage::{TotalStats, TreeUsage};

const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

/// `1234567` -> `1,234,567`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Scale into B/KiB/MiB/GiB with at most two decimals. Anything above bytes
/// also shows the exact count, e.g. `1.5 KiB (1,536 bytes)`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let mut number = format!("{:.2}", scaled);
    if number.contains('.') {
        number = number.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    if unit == 0 {
        format!("{} {}", number, UNITS[unit])
    } else {
        format!(
            "{} {} ({} bytes)",
            number,
            UNITS[unit],
            format_count(bytes)
        )
    }
}

fn write_stats(f: &mut fmt::Formatter<'_>, stats: &TotalStats, indent: &str) -> fmt::Result {
    let rows = [
        ("Total Nodes", stats.total_nodes, stats.total_size),
        ("Internals", stats.internals.count, stats.internals.size),
        ("Leaves", stats.leaves.count, stats.leaves.size),
        ("Nulls", stats.nulls.count, stats.nulls.size),
        ("Data", stats.data.count, stats.data.size),
    ];
    for (name, count, size) in rows {
        writeln!(
            f,
            "{}{}: {}, Size: {}",
            indent,
            name,
            format_count(count),
            format_bytes(size)
        )?;
    }
    Ok(())
}

impl fmt::Display for TreeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let empty = TotalStats::default();

        writeln!(f, "PerDepth ({}):", self.max_depth)?;
        for depth in 0..=self.max_depth {
            writeln!(f, "Depth: {}", depth)?;
            write_stats(f, self.per_depth.get(&depth).unwrap_or(&empty), "  ")?;
        }

        writeln!(f, "PerFile:")?;
        for file in 1..=self.max_file {
            writeln!(f, "File: {}", file)?;
            write_stats(f, self.per_file.get(&file).unwrap_or(&empty), "  ")?;
        }

        writeln!(f, "Total")?;
        write_stats(f, &self.total, "  ")?;
        write!(f, "Resolves: {}, maxDepth: {}", self.resolves, self.max_depth)
    }
}
