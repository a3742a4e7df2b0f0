use std::collections::HashSet;
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::trace;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Span;
use crate::index::SegmentInfo;
use crate::index::forward::Terms;
use crate::index::memory::{MemoryForwardIndex, MemoryIndex, LOWER};
use crate::query::{HitQueryContext, SegmentCursor, SpanWeight};

/// What one token position must look like
#[derive(Debug, Clone, PartialEq)]
pub enum TokenMatcher {
    Term(String),
    Prefix(String),
    /// `*` wildcards, e.g. "get*User"
    Wildcard(String),
    Any,
}

#[derive(Debug, Clone)]
pub struct TokenClause {
    pub annotation: String,
    pub matcher: TokenMatcher,
    pub capture: Option<String>,
}

impl TokenClause {
    pub fn term(annotation: &str, value: &str) -> Self {
        TokenClause::new(annotation, TokenMatcher::Term(value.to_string()))
    }

    pub fn prefix(annotation: &str, prefix: &str) -> Self {
        TokenClause::new(annotation, TokenMatcher::Prefix(prefix.to_string()))
    }

    pub fn wildcard(annotation: &str, pattern: &str) -> Self {
        TokenClause::new(annotation, TokenMatcher::Wildcard(pattern.to_string()))
    }

    pub fn any() -> Self {
        TokenClause::new(LOWER, TokenMatcher::Any)
    }

    fn new(annotation: &str, matcher: TokenMatcher) -> Self {
        TokenClause { annotation: annotation.to_string(), matcher, capture: None }
    }

    /// Capture this token under `name`
    pub fn captured_as(mut self, name: &str) -> Self {
        self.capture = Some(name.to_string());
        self
    }
}

/// Sequence of adjacent token clauses
#[derive(Debug, Clone, Default)]
pub struct TokenPattern {
    clauses: Vec<TokenClause>,
}

impl TokenPattern {
    pub fn new() -> Self {
        TokenPattern::default()
    }

    /// Phrase of exact terms on the lowercase annotation
    pub fn phrase(words: &[&str]) -> Self {
        words.iter().fold(TokenPattern::new(), |p, w| p.then(TokenClause::term(LOWER, w)))
    }

    pub fn then(mut self, clause: TokenClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[TokenClause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// One clause resolved against the dictionary
struct ResolvedClause {
    tokens: Arc<MemoryForwardIndex>,
    /// `None` accepts every token
    ids: Option<HashSet<u32>>,
}

impl ResolvedClause {
    fn accepts(&self, id: u32) -> bool {
        match &self.ids {
            Some(ids) => ids.contains(&id),
            None => true,
        }
    }
}

/// `SpanWeight` for a `TokenPattern` over a `MemoryIndex`
pub struct PatternWeight {
    index: Arc<MemoryIndex>,
    pattern: TokenPattern,
    resolved: Mutex<Option<Arc<Vec<ResolvedClause>>>>,
}

impl PatternWeight {
    pub fn new(index: Arc<MemoryIndex>, pattern: TokenPattern) -> Self {
        PatternWeight {
            index,
            pattern,
            resolved: Mutex::new(None),
        }
    }

    fn resolve(&self, max_terms: usize) -> Result<Arc<Vec<ResolvedClause>>> {
        let mut cached = self.resolved.lock();
        if let Some(resolved) = cached.as_ref() {
            return Ok(resolved.clone());
        }
        if self.pattern.is_empty() {
            return Err(Error::invalid_argument("empty token pattern"));
        }

        let mut clauses = Vec::with_capacity(self.pattern.len());
        let mut expanded = 0usize;
        for clause in self.pattern.clauses() {
            let tokens = self.index
                .annotation_data(&clause.annotation)
                .ok_or_else(|| Error::invalid_argument(format!("unknown annotation '{}'", clause.annotation)))?
                .clone();
            let dict = tokens.dictionary();
            let ids: Option<Vec<u32>> = match &clause.matcher {
                TokenMatcher::Term(term) => Some(dict.id_of(term).into_iter().collect()),
                TokenMatcher::Prefix(prefix) => Some(dict.expand_prefix(prefix, max_terms)?),
                TokenMatcher::Wildcard(pattern) => Some(dict.expand_wildcard(pattern, max_terms)?),
                TokenMatcher::Any => None,
            };
            if let Some(ids) = &ids {
                expanded += ids.len();
                if expanded > max_terms {
                    return Err(Error::new(
                        ErrorKind::QueryTooBroad,
                        format!("pattern expands to more than {} terms", max_terms),
                    ));
                }
            }
            clauses.push(ResolvedClause {
                tokens,
                ids: ids.map(|ids| ids.into_iter().collect()),
            });
        }

        let resolved = Arc::new(clauses);
        *cached = Some(resolved.clone());
        Ok(resolved)
    }
}

impl SpanWeight for PatternWeight {
    fn extract_terms(&self, max_terms: usize) -> Result<Vec<String>> {
        let resolved = self.resolve(max_terms)?;
        let mut terms = Vec::new();
        for clause in resolved.iter() {
            if let Some(ids) = &clause.ids {
                let dict = clause.tokens.dictionary();
                terms.extend(ids.iter().filter_map(|id| dict.get(*id)).map(|t| t.to_string()));
            }
        }
        // resolve() may have been cached under a looser limit
        if terms.len() > max_terms {
            return Err(Error::new(
                ErrorKind::QueryTooBroad,
                format!("pattern expands to {} terms, limit is {}", terms.len(), max_terms),
            ));
        }
        Ok(terms)
    }

    fn cursor(&self, segment: &SegmentInfo) -> Result<Option<Box<dyn SegmentCursor>>> {
        let clauses = self.resolve(usize::MAX)?;
        // A clause with no matching terms can never match
        if clauses.iter().any(|c| matches!(&c.ids, Some(ids) if ids.is_empty())) {
            return Ok(None);
        }
        let captures = self.pattern.clauses()
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.capture.clone().map(|name| (i, name)))
            .collect();
        trace!(segment = segment.ord, "opened pattern cursor");
        Ok(Some(Box::new(PatternCursor {
            clauses,
            segment: segment.clone(),
            captures,
            capture_slots: Vec::new(),
            next_local: 0,
            doc: 0,
            starts: Vec::new(),
            position: 0,
            start: 0,
        })))
    }
}

/// Scans each document of a segment for the clause sequence
struct PatternCursor {
    clauses: Arc<Vec<ResolvedClause>>,
    segment: SegmentInfo,
    captures: Vec<(usize, String)>,
    capture_slots: Vec<usize>,
    next_local: u32,
    doc: u32,
    starts: Vec<u32>,
    position: usize,
    start: u32,
}

impl PatternCursor {
    fn match_starts(&self, global_doc: u32) -> Vec<u32> {
        let width = self.clauses.len();
        let doc_tokens: Vec<&[u32]> = self.clauses.iter().map(|c| c.tokens.tokens(global_doc)).collect();
        let len = doc_tokens.first().map(|t| t.len()).unwrap_or(0);
        if len < width {
            return Vec::new();
        }
        (0..=len - width)
            .filter(|&start| {
                self.clauses.iter()
                    .enumerate()
                    .all(|(i, clause)| clause.accepts(doc_tokens[i][start + i]))
            })
            .map(|start| start as u32)
            .collect()
    }
}

impl SegmentCursor for PatternCursor {
    fn next_doc(&mut self) -> Result<Option<u32>> {
        while self.next_local < self.segment.doc_count {
            let local = self.next_local;
            self.next_local += 1;
            let starts = self.match_starts(self.segment.global_doc(local));
            if !starts.is_empty() {
                self.doc = local;
                self.starts = starts;
                self.position = 0;
                return Ok(Some(local));
            }
        }
        self.starts.clear();
        Ok(None)
    }

    fn next_start(&mut self) -> Result<Option<u32>> {
        match self.starts.get(self.position) {
            Some(&start) => {
                self.position += 1;
                self.start = start;
                Ok(Some(start))
            }
            None => Ok(None),
        }
    }

    fn doc(&self) -> u32 {
        self.doc
    }

    fn start(&self) -> u32 {
        self.start
    }

    fn end(&self) -> u32 {
        self.start + self.clauses.len() as u32
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.capture_slots = self.captures.iter().map(|(_, name)| context.register(name)).collect();
    }

    fn captured_groups(&self, out: &mut [Option<Span>]) {
        for ((clause, _), &slot) in self.captures.iter().zip(&self.capture_slots) {
            if let Some(target) = out.get_mut(slot) {
                let at = self.start + *clause as u32;
                *target = Some(Span::new(at, at + 1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CorpusIndex;
    use crate::index::memory::WORD;

    fn index() -> Arc<MemoryIndex> {
        MemoryIndex::builder("contents")
            .add_document("The cat sat on the mat")
            .add_document("no match here")
            .add_document("the cat and the catalogue")
            .build()
            .unwrap()
    }

    fn drain(weight: &PatternWeight, segment: &SegmentInfo) -> Vec<(u32, u32, u32)> {
        let mut out = Vec::new();
        let Some(mut cursor) = weight.cursor(segment).unwrap() else {
            return out;
        };
        while cursor.next_doc().unwrap().is_some() {
            while cursor.next_start().unwrap().is_some() {
                out.push((cursor.doc(), cursor.start(), cursor.end()));
            }
        }
        out
    }

    #[test]
    fn phrase_matches_per_document_in_order() {
        let index = index();
        let weight = PatternWeight::new(index.clone(), TokenPattern::phrase(&["the", "cat"]));
        let segment = index.segments()[0].clone();
        assert_eq!(drain(&weight, &segment), vec![(0, 0, 2), (2, 0, 2)]);
    }

    #[test]
    fn prefix_clause_and_case_sensitive_word() {
        let index = index();
        let pattern = TokenPattern::new().then(TokenClause::prefix(LOWER, "cat"));
        let weight = PatternWeight::new(index.clone(), pattern);
        let mut terms = weight.extract_terms(10).unwrap();
        terms.sort();
        assert_eq!(terms, vec!["cat", "catalogue"]);

        let exact = PatternWeight::new(index.clone(), TokenPattern::new().then(TokenClause::term(WORD, "The")));
        assert_eq!(drain(&exact, &index.segments()[0]), vec![(0, 0, 1)]);
    }

    #[test]
    fn unknown_term_yields_no_cursor() {
        let index = index();
        let weight = PatternWeight::new(index.clone(), TokenPattern::phrase(&["dog"]));
        assert!(weight.cursor(&index.segments()[0]).unwrap().is_none());
    }

    #[test]
    fn captures_fill_registered_slots() {
        let index = index();
        let pattern = TokenPattern::new()
            .then(TokenClause::term(LOWER, "the"))
            .then(TokenClause::any().captured_as("noun"));
        let weight = PatternWeight::new(index.clone(), pattern);
        let mut cursor = weight.cursor(&index.segments()[0]).unwrap().unwrap();
        let mut context = HitQueryContext::new();
        cursor.register_captures(&mut context);
        assert_eq!(context.names(), &["noun".to_string()]);

        cursor.next_doc().unwrap();
        cursor.next_start().unwrap();
        let mut slots = vec![None; context.len()];
        cursor.captured_groups(&mut slots);
        assert_eq!(slots[0], Some(Span::new(1, 2)));
    }
}
