//! Text layout for the conversion preview.

/// Lay out two columns next to each other.
///
/// The left column is padded to its widest line plus two spaces; the shorter
/// column is filled with empty lines.
pub fn side_by_side(left: &[String], right: &[String]) -> String {
    let width = left.iter().map(|line| line.chars().count()).max().unwrap_or(0) + 2;
    let rows = left.len().max(right.len());
    let mut out = String::new();
    for idx in 0..rows {
        let l = left.get(idx).map(String::as_str).unwrap_or("");
        let r = right.get(idx).map(String::as_str).unwrap_or("");
        let pad = width - l.chars().count();
        out.push_str(l);
        out.push_str(&" ".repeat(pad));
        out.push_str(r);
        out.push('\n');
    }
    out
}

/// Drop `-> target` suffixes that `tree` prints for symlinks (annexed files).
pub fn strip_link_targets(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(|line| match line.find("-> ") {
            Some(idx) => line[..idx].trim_end().to_string(),
            None => line.to_string(),
        })
        .collect()
}

/// Replace the first line of a `tree` listing (the root path) with a heading.
pub fn with_heading(mut lines: Vec<String>, heading: &str) -> Vec<String> {
    match lines.first_mut() {
        Some(first) => *first = heading.to_string(),
        None => lines.push(heading.to_string()),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn columns_are_aligned_and_padded() {
        let out = side_by_side(
            &lines(&["source:", "dicoms"]),
            &lines(&["result:", "anat", "func"]),
        );
        assert_eq!(out, "source:  result:\ndicoms   anat\n         func\n");
    }

    #[test]
    fn link_targets_are_removed() {
        let listing = "sub-001\n└── anat\n    └── sub-001_T1w.nii.gz -> ../../.git/annex/objects/xy\n";
        let out = strip_link_targets(listing);
        assert_eq!(out[2], "    └── sub-001_T1w.nii.gz");
    }

    #[test]
    fn heading_replaces_root_line() {
        let out = with_heading(lines(&["/tmp/ds/sub-001", "anat"]), "result:");
        assert_eq!(out, lines(&["result:", "anat"]));
        assert_eq!(with_heading(Vec::new(), "source:"), lines(&["source:"]));
    }
}
