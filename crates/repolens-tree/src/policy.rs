// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Exclusion policy applied to every scanned entry

/// Extensions whose content is never captured (images, audio, video,
/// fonts, archives and compiled binaries)
pub const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "svg",
    // audio
    "mp3", "wav", "ogg", "flac", "aac", "m4a",
    // video
    "mp4", "avi", "mov", "mkv", "webm", "wmv", "flv",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar",
    // binaries
    "pdf", "exe", "dll", "so", "dylib", "wasm", "bin",
];

/// File names omitted from the tree entirely
pub const ARTIFACT_NAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "Pipfile.lock",
    "go.sum",
    ".DS_Store",
    "Thumbs.db",
];

/// Name suffixes omitted from the tree entirely (logs, generated output)
pub const ARTIFACT_SUFFIXES: &[&str] = &[
    ".log",
    ".min.js",
    ".min.css",
    ".map",
    ".tsbuildinfo",
    ".pyc",
];

/// Ignore patterns used when the caller supplies none
pub const DEFAULT_IGNORE_PATTERNS: &[&str] =
    &[".git/", "node_modules/", "target/", "dist/", "build/"];

/// What to do with one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// List the entry and capture content if requested
    Include,
    /// List the entry without content
    ListOnly,
    /// Leave the entry (and any subtree) out
    Exclude,
}

/// Substring ignore patterns plus the fixed binary/artifact rules
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    ignore_patterns: Vec<String>,
    max_file_size_kb: Option<u64>,
}

impl ExclusionPolicy {
    /// Build a policy from literal substring patterns
    #[must_use]
    pub fn new(ignore_patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ignore_patterns: ignore_patterns
                .into_iter()
                .map(Into::<String>::into)
                .filter(|p| !p.is_empty())
                .collect(),
            max_file_size_kb: None,
        }
    }

    /// Cap content capture at `kb` kilobytes
    #[must_use]
    pub fn with_max_file_size_kb(mut self, kb: Option<u64>) -> Self {
        self.max_file_size_kb = kb;
        self
    }

    /// The configured patterns
    #[must_use]
    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    /// Whether `relative_path` matches an ignore pattern
    ///
    /// Directories are matched with a trailing `/` so that `target/` hits
    /// the `target` directory itself.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        if self.ignore_patterns.is_empty() {
            return false;
        }
        let candidate = if is_dir {
            format!("{relative_path}/")
        } else {
            relative_path.to_string()
        };
        self.ignore_patterns
            .iter()
            .any(|pattern| candidate.contains(pattern.as_str()))
    }

    /// Decide for a directory
    #[must_use]
    pub fn directory_verdict(&self, relative_path: &str) -> Verdict {
        if self.is_ignored(relative_path, true) {
            Verdict::Exclude
        } else {
            Verdict::Include
        }
    }

    /// Decide for a file
    #[must_use]
    pub fn file_verdict(&self, relative_path: &str, name: &str, size_bytes: u64) -> Verdict {
        if self.is_ignored(relative_path, false) || is_artifact_name(name) {
            return Verdict::Exclude;
        }
        if is_binary_name(name) || self.exceeds_size(size_bytes) {
            return Verdict::ListOnly;
        }
        Verdict::Include
    }

    fn exceeds_size(&self, size_bytes: u64) -> bool {
        self.max_file_size_kb
            .is_some_and(|kb| size_bytes > kb.saturating_mul(1024))
    }
}

/// Whether `name` has a denylisted binary extension
#[must_use]
pub fn is_binary_name(name: &str) -> bool {
    name.rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .is_some_and(|(_, ext)| {
            BINARY_EXTENSIONS
                .iter()
                .any(|b| b.eq_ignore_ascii_case(ext))
        })
}

/// Whether `name` is a lockfile, log or generated artifact
#[must_use]
pub fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_NAMES.contains(&name)
        || ARTIFACT_SUFFIXES
            .iter()
            .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any path containing a pattern is never included
        #[test]
        fn prop_pattern_paths_excluded(
            prefix in "[a-z/]{0,10}",
            pattern in "[a-z_]{1,8}",
            suffix in "[a-z/.]{0,10}",
        ) {
            let policy = ExclusionPolicy::new([pattern.clone()]);
            let path = format!("{prefix}{pattern}{suffix}");
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            prop_assert_eq!(policy.file_verdict(&path, &name, 0), Verdict::Exclude);
            prop_assert_eq!(policy.directory_verdict(&path), Verdict::Exclude);
        }

        /// Property: files over the limit never get content
        #[test]
        fn prop_size_limit(kb in 0u64..64, size in 0u64..131_072) {
            let policy = ExclusionPolicy::new(Vec::<String>::new()).with_max_file_size_kb(Some(kb));
            let verdict = policy.file_verdict("src/a.rs", "a.rs", size);
            if size > kb * 1024 {
                prop_assert_eq!(verdict, Verdict::ListOnly);
            } else {
                prop_assert_eq!(verdict, Verdict::Include);
            }
        }
    }
}
