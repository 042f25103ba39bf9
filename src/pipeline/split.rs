//! Document splitting: break oversized Markdown into linked part-files.
//!
//! ## Algorithm
//!
//! Content is partitioned into sections at header-line boundaries (a line
//! whose trimmed form starts with 1–6 `#` followed by whitespace). Sections
//! accumulate into the current part until appending the next section would
//! exceed the threshold, then the part is closed and a new one started.
//! Sections are atomic — a single section larger than the threshold is never
//! split mid-section, so one oversized part can occur. Accepted limitation:
//! splitting inside a section would break tables, fenced code, and list
//! nesting.
//!
//! Section boundaries preserve every byte: the concatenation of all part
//! bodies is exactly the original document. The generated part headings and
//! the index file are the only injected content.

use once_cell::sync::Lazy;
use regex::Regex;

/// One part of a split document.
///
/// `content` includes the generated part heading; `body` is the verbatim
/// slice of the original document this part carries.
#[derive(Debug, Clone)]
pub struct DocumentPart {
    /// 1-based ordinal of this part.
    pub index: usize,
    /// Total number of parts in the split.
    pub total_parts: usize,
    /// Full file content: generated heading + verbatim body.
    pub content: String,
    /// Name of the source document, used in the generated heading.
    pub source_file_name: String,
}

/// Result of [`split_if_needed`].
#[derive(Debug, Clone)]
pub enum SplitOutcome {
    /// At or below threshold (or indivisible): write the document as-is.
    Single(String),
    /// Write `parts` as `<base>_part<N>.md` plus `index` as `<base>_index.md`.
    Split {
        parts: Vec<DocumentPart>,
        index: String,
    },
}

static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());

fn is_header_line(line: &str) -> bool {
    RE_HEADER.is_match(line.trim_start())
}

/// Partition `content` into sections at header boundaries.
///
/// Lossless: `sections.concat() == content`, byte for byte. A document with
/// zero headers yields exactly one section.
pub fn split_by_headers(content: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in content.split_inclusive('\n') {
        if is_header_line(line) && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }

    if sections.is_empty() {
        vec![content.to_string()]
    } else {
        sections
    }
}

/// File name of part `index` (1-based) for a document with stem `base_name`.
pub fn part_file_name(base_name: &str, index: usize) -> String {
    format!("{base_name}_part{index}.md")
}

/// File name of the index document for a document with stem `base_name`.
pub fn index_file_name(base_name: &str) -> String {
    format!("{base_name}_index.md")
}

/// Split `markdown` into parts if it exceeds `threshold_bytes`.
///
/// `source_file_name` appears in generated headings (e.g. `report.pdf`);
/// `base_name` is the output stem used for the part links in the index
/// (e.g. `report`).
pub fn split_if_needed(
    markdown: &str,
    threshold_bytes: usize,
    source_file_name: &str,
    base_name: &str,
) -> SplitOutcome {
    if markdown.len() <= threshold_bytes {
        return SplitOutcome::Single(markdown.to_string());
    }

    let sections = split_by_headers(markdown);

    let mut bodies: Vec<String> = Vec::new();
    let mut current = String::new();
    for section in sections {
        if !current.is_empty() && current.len() + section.len() > threshold_bytes {
            bodies.push(std::mem::take(&mut current));
        }
        current.push_str(&section);
    }
    if !current.is_empty() {
        bodies.push(current);
    }

    // A headerless or single-section document never splits, even oversized:
    // producing artefacts for one part is pointless directory clutter.
    if bodies.len() <= 1 {
        return SplitOutcome::Single(markdown.to_string());
    }

    let total = bodies.len();
    let parts: Vec<DocumentPart> = bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let index = i + 1;
            DocumentPart {
                index,
                total_parts: total,
                content: format!(
                    "# {source_file_name} - Part {index} of {total}\n\n{body}"
                ),
                source_file_name: source_file_name.to_string(),
            }
        })
        .collect();

    let index = render_index(source_file_name, total, base_name);
    SplitOutcome::Split { parts, index }
}

/// Generate the index document listing all parts in order.
fn render_index(source_file_name: &str, total_parts: usize, base_name: &str) -> String {
    let mut index = format!("# {source_file_name} - Document Index\n\n");
    index.push_str(&format!(
        "This document has been split into {total_parts} parts for better readability and performance.\n\n"
    ));
    index.push_str("## Parts:\n\n");
    for i in 1..=total_parts {
        index.push_str(&format!("- [Part {i}](./{})\n", part_file_name(base_name, i)));
    }
    index.push_str("\n---\n\n*This index was automatically generated by office2md.*\n");
    index
}
