use std::fmt::Write as _;

use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", render_table(headers, &rows));
}

/// Render an aligned two-space-separated table. Cells beyond the header
/// count are dropped, and lines carry no trailing padding, so piping the
/// output through line-based tools stays clean.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths = rows.iter().fold(
        headers.iter().map(|h| h.len()).collect::<Vec<_>>(),
        |mut widths, row| {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell.len());
            }
            widths
        },
    );

    let mut out = String::new();
    push_row(&mut out, &widths, headers.iter().copied());
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let mut line = String::new();
    for (i, cell) in cells.take(widths.len()).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let width = widths[i];
        let _ = write!(line, "{cell:width$}");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_the_widest_cell() {
        let rendered = render_table(
            &["id", "status"],
            &[
                vec!["a1".to_string(), "sent".to_string()],
                vec!["a2-long".to_string(), "ok".to_string()],
            ],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id       status");
        assert_eq!(lines[1], "-------  ------");
        assert_eq!(lines[2], "a1       sent");
        assert_eq!(lines[3], "a2-long  ok");
    }

    #[test]
    fn lines_never_end_in_padding() {
        let rendered = render_table(
            &["key", "note"],
            &[vec!["k".to_string(), "long note".to_string()]],
        );
        for line in rendered.lines() {
            assert_eq!(line, line.trim_end());
        }
    }

    #[test]
    fn cells_beyond_the_headers_are_dropped() {
        let rendered = render_table(&["one"], &[vec!["a".to_string(), "spillover".to_string()]]);
        assert!(!rendered.contains("spillover"));
    }
}
