//! Release selection: which build outputs are eligible for upload.
//!
//! The effective pattern list is always `["*", ...caller_patterns]`, so with no
//! caller patterns everything is selected. Caller patterns never remove the
//! implicit match-all; the only way to narrow the selection is an exclusion
//! pattern prefixed with `!`, which is applied after every inclusion.
//!
//! Patterns without a `/` match the final path segment (`*.map` matches
//! `js/app.js.map`); patterns with a `/` match the whole name, and `*` never
//! crosses a `/` there.
//!
//! Hidden names are opt-in. A wildcard never matches a leading `.`, so
//! `.nojekyll` or `js/.DS_Store` are only selected when an inclusion pattern
//! spells out the dot itself (`.nojekyll`, `.well-known/*`). Files inside a
//! hidden directory still match base-name patterns through their own name.

use std::collections::BTreeSet;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use upsync_core::{ArtifactName, Selection};

use crate::SyncError;

/// The implicit first pattern.
pub const MATCH_ALL: &str = "*";

/// Compiled pattern list.
#[derive(Debug, Clone)]
pub struct Selector {
    include_name: GlobSet,
    include_base: GlobSet,
    dotted_name: GlobSet,
    dotted_base: GlobSet,
    exclude_name: GlobSet,
    exclude_base: GlobSet,
}

struct Builders {
    include_name: GlobSetBuilder,
    include_base: GlobSetBuilder,
    dotted_name: GlobSetBuilder,
    dotted_base: GlobSetBuilder,
    exclude_name: GlobSetBuilder,
    exclude_base: GlobSetBuilder,
}

impl Builders {
    fn new() -> Self {
        Self {
            include_name: GlobSetBuilder::new(),
            include_base: GlobSetBuilder::new(),
            dotted_name: GlobSetBuilder::new(),
            dotted_base: GlobSetBuilder::new(),
            exclude_name: GlobSetBuilder::new(),
            exclude_base: GlobSetBuilder::new(),
        }
    }
}

impl Selector {
    /// Compile `patterns` behind the implicit match-all. The input is not modified.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SyncError> {
        let mut builders = Builders::new();

        let all = std::iter::once(MATCH_ALL).chain(patterns.iter().map(AsRef::as_ref));
        for raw in all {
            let (exclude, pattern) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| SyncError::Selection {
                    pattern: raw.to_string(),
                    source,
                })?;
            let whole_name = pattern.contains('/');
            let builder = match (exclude, whole_name) {
                (false, true) if names_hidden(pattern) => &mut builders.dotted_name,
                (false, false) if names_hidden(pattern) => &mut builders.dotted_base,
                (false, true) => &mut builders.include_name,
                (false, false) => &mut builders.include_base,
                (true, true) => &mut builders.exclude_name,
                (true, false) => &mut builders.exclude_base,
            };
            builder.add(glob);
        }

        let build = |builder: GlobSetBuilder, pattern: &str| {
            builder.build().map_err(|source| SyncError::Selection {
                pattern: pattern.to_string(),
                source,
            })
        };
        let joined = patterns
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Self {
            include_name: build(builders.include_name, &joined)?,
            include_base: build(builders.include_base, &joined)?,
            dotted_name: build(builders.dotted_name, &joined)?,
            dotted_base: build(builders.dotted_base, &joined)?,
            exclude_name: build(builders.exclude_name, &joined)?,
            exclude_base: build(builders.exclude_base, &joined)?,
        })
    }

    pub fn is_selected(&self, name: &str) -> bool {
        let base = name.rsplit('/').next().unwrap_or(name);
        let included = (!names_hidden(name) && self.include_name.is_match(name))
            || (!names_hidden(base) && self.include_base.is_match(base))
            || self.dotted_name.is_match(name)
            || self.dotted_base.is_match(base);
        let excluded = self.exclude_name.is_match(name) || self.exclude_base.is_match(base);
        included && !excluded
    }

    pub fn select<'a, I>(&self, names: I) -> Selection
    where
        I: IntoIterator<Item = &'a ArtifactName>,
    {
        names
            .into_iter()
            .filter(|name| self.is_selected(name.as_str()))
            .cloned()
            .collect()
    }
}

/// True when any `/`-separated segment starts with a dot.
fn names_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}

/// Filter `all` down to the release selection.
pub fn select<S: AsRef<str>>(
    all: &BTreeSet<ArtifactName>,
    patterns: &[S],
) -> Result<Selection, SyncError> {
    Ok(Selector::new(patterns)?.select(all))
}
