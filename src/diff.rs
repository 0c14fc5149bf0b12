use console::style;
use similar::{DiffTag, TextDiff};

const CONTEXT_LINES: usize = 2;

/// Renders the changed lines between two versions of a document, with
/// 1-based line numbers and a little context around each hunk.
pub fn render_diff(old: &str, new: &str) -> String {
    if old == new {
        return "No changes detected.".to_string();
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let diff = TextDiff::from_slices(&old_lines, &new_lines);

    let mut diff_lines = Vec::new();

    for (hunk_idx, group) in diff.grouped_ops(CONTEXT_LINES).iter().enumerate() {
        if hunk_idx > 0 {
            diff_lines.push("...".to_string());
        }

        for op in group {
            let (tag, old_range, new_range) = (op.tag(), op.old_range(), op.new_range());
            match tag {
                DiffTag::Equal => {
                    for i in new_range {
                        diff_lines.push(format!("  {:>4}: {}", i + 1, new_lines[i]));
                    }
                }
                DiffTag::Delete | DiffTag::Insert | DiffTag::Replace => {
                    for i in old_range {
                        diff_lines.push(
                            style(format!("- {:>4}: {}", i + 1, old_lines[i]))
                                .red()
                                .to_string(),
                        );
                    }
                    for i in new_range {
                        diff_lines.push(
                            style(format!("+ {:>4}: {}", i + 1, new_lines[i]))
                                .green()
                                .to_string(),
                        );
                    }
                }
            }
        }
    }
    diff_lines.join("\n")
}
