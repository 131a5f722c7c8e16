//! README and description discovery

use std::fs;
use std::path::Path;

use tracing::debug;

/// README names in order of preference (matched case-insensitively)
const README_NAMES: &[&str] = &[
    "readme.md",
    "readme.markdown",
    "readme.rst",
    "readme.txt",
    "readme",
];

/// Placeholder git writes into `.git/description`
const GIT_DESCRIPTION_PLACEHOLDER: &str = "Unnamed repository";

const MAX_DESCRIPTION_CHARS: usize = 300;

/// Read the README at the root of `root`, if any
#[must_use]
pub fn find_readme(root: &Path) -> Option<String> {
    let entries = fs::read_dir(root).ok()?;
    let mut candidates: Vec<(usize, std::path::PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            README_NAMES
                .iter()
                .position(|candidate| *candidate == name)
                .map(|rank| (rank, e.path()))
        })
        .collect();
    candidates.sort();

    candidates.into_iter().find_map(|(_, path)| match fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable README");
            None
        }
    })
}

/// One-paragraph description of the repository
///
/// Uses `.git/description` unless it still holds git's placeholder, then
/// falls back to the first prose paragraph of `readme`.
#[must_use]
pub fn read_description(root: &Path, readme: Option<&str>) -> Option<String> {
    let from_git = fs::read_to_string(root.join(".git").join("description"))
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty() && !text.starts_with(GIT_DESCRIPTION_PLACEHOLDER));

    from_git.or_else(|| readme.and_then(first_paragraph))
}

/// First paragraph of prose, skipping headings, badges, HTML and fences
#[must_use]
pub fn first_paragraph(markdown: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            if !lines.is_empty() {
                break;
            }
            continue;
        }
        if in_fence {
            continue;
        }
        let skip = trimmed.starts_with('#')
            || trimmed.starts_with("![")
            || trimmed.starts_with("[![")
            || trimmed.starts_with('<')
            || trimmed.starts_with("---")
            || trimmed.starts_with("===");
        if trimmed.is_empty() || skip {
            if !lines.is_empty() {
                break;
            }
            continue;
        }
        lines.push(trimmed);
    }

    if lines.is_empty() {
        return None;
    }
    let paragraph = lines.join(" ");
    Some(match paragraph.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((cut, _)) => format!("{}...", paragraph[..cut].trim_end()),
        None => paragraph,
    })
}
