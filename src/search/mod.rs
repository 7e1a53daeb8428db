//! Occurrence search
//!
//! Finds every occurrence of a literal needle in the flattened text of a
//! scope. Occurrences are numbered in document order and never overlap: each
//! search resumes strictly after the end of the previous match. The number of
//! an occurrence is what text descriptors persist, so the enumeration must be
//! a pure function of the document.

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId, TextIndex, TextRange};

/// Occurrence index persisted for selections that could not be resolved
pub const UNRESOLVED_OCCURRENCE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Matches visited before the search gives up
    pub max_occurrences: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            max_occurrences: 10_000,
        }
    }
}

/// One match of the needle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccurrenceMatch {
    /// Zero-based occurrence number
    pub index: usize,
    /// Byte offsets into the scope's flattened text
    pub start: usize,
    pub end: usize,
    pub range: TextRange,
}

/// Resume position of an occurrence enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchCursor {
    pos: usize,
    emitted: usize,
    done: bool,
}

impl SearchCursor {
    /// Matches produced so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// A prepared search over one scope
///
/// Holds its own copy of the flattened text, so it can outlive borrows of the
/// document and be driven step by step.
#[derive(Debug, Clone)]
pub struct OccurrenceSearch {
    index: TextIndex,
    haystack: String,
    /// `(folded offset, original offset)` at every char boundary when folding
    fold_map: Option<Vec<(usize, usize)>>,
    needle: String,
    options: SearchOptions,
}

fn fold(text: &str) -> (String, Vec<(usize, usize)>) {
    let mut folded = String::with_capacity(text.len());
    let mut map = Vec::with_capacity(text.len() + 1);
    for (offset, ch) in text.char_indices() {
        map.push((folded.len(), offset));
        folded.extend(ch.to_lowercase());
    }
    map.push((folded.len(), text.len()));
    (folded, map)
}

impl OccurrenceSearch {
    pub fn new(doc: &Document, scope: NodeId, needle: &str, options: SearchOptions) -> Self {
        let index = TextIndex::build(doc, scope);
        let (haystack, fold_map, needle) = if options.case_sensitive {
            (index.text().to_string(), None, needle.to_string())
        } else {
            let (haystack, map) = fold(index.text());
            let needle = needle.chars().flat_map(char::to_lowercase).collect();
            (haystack, Some(map), needle)
        };

        Self {
            index,
            haystack,
            fold_map,
            needle,
            options,
        }
    }

    /// Flattened text of the scope
    pub fn text(&self) -> &str {
        self.index.text()
    }

    pub fn text_index(&self) -> &TextIndex {
        &self.index
    }

    fn original_offset(&self, offset: usize) -> Option<usize> {
        match &self.fold_map {
            None => Some(offset),
            Some(map) => map
                .binary_search_by_key(&offset, |&(folded, _)| folded)
                .ok()
                .map(|i| map[i].1),
        }
    }

    /// Produce the next match after `cursor`, advancing it
    pub fn next_match(&self, cursor: &mut SearchCursor) -> Option<OccurrenceMatch> {
        if cursor.done || self.needle.is_empty() {
            return None;
        }

        loop {
            if cursor.emitted >= self.options.max_occurrences {
                tracing::warn!(
                    "Occurrence search for {:?} stopped after {} matches",
                    self.needle,
                    cursor.emitted
                );
                cursor.done = true;
                return None;
            }

            let Some(rel) = self.haystack.get(cursor.pos..).and_then(|h| h.find(&self.needle)) else {
                cursor.done = true;
                return None;
            };
            let folded_start = cursor.pos + rel;
            let folded_end = folded_start + self.needle.len();
            cursor.pos = folded_end;

            // A folded match may begin or end inside a multi-char lowercase expansion
            let (Some(start), Some(end)) = (
                self.original_offset(folded_start),
                self.original_offset(folded_end),
            ) else {
                continue;
            };
            let Some(range) = self.index.range(start, end) else {
                continue;
            };

            let index = cursor.emitted;
            cursor.emitted += 1;
            return Some(OccurrenceMatch {
                index,
                start,
                end,
                range,
            });
        }
    }

    /// Lazy enumeration from the start of the scope. Call again to restart.
    pub fn iter(&self) -> Occurrences<'_> {
        Occurrences {
            search: self,
            cursor: SearchCursor::default(),
        }
    }

    /// The `n`-th occurrence (0-based). Negative `n` is never found.
    pub fn nth(&self, n: i64) -> Option<OccurrenceMatch> {
        let n = usize::try_from(n).ok()?;
        self.iter().nth(n)
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

/// Iterator over the matches of an [`OccurrenceSearch`]
pub struct Occurrences<'a> {
    search: &'a OccurrenceSearch,
    cursor: SearchCursor,
}

impl Iterator for Occurrences<'_> {
    type Item = OccurrenceMatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.search.next_match(&mut self.cursor)
    }
}

/// Prepare a search for `needle` under `scope`
pub fn find_occurrences(
    doc: &Document,
    scope: NodeId,
    needle: &str,
    options: SearchOptions,
) -> OccurrenceSearch {
    OccurrenceSearch::new(doc, scope, needle, options)
}

/// The `n`-th occurrence of `needle` under `scope`
///
/// `n < 0` (including the [`UNRESOLVED_OCCURRENCE`] sentinel) returns `None`
/// without searching.
pub fn find_nth(
    doc: &Document,
    scope: NodeId,
    needle: &str,
    n: i64,
    options: SearchOptions,
) -> Option<OccurrenceMatch> {
    if n < 0 {
        return None;
    }
    OccurrenceSearch::new(doc, scope, needle, options).nth(n)
}
