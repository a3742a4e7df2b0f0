use std::collections::BTreeSet;
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::forward::Terms;

/// FST-backed term dictionary for one annotation.
///
/// Ids are assigned in sorted term order, so the FST value of a term is its id.
pub struct TermDictionary {
    fst: Map<Vec<u8>>,
    terms: Vec<String>,
}

impl TermDictionary {
    pub fn build<I>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        // FST requires sorted, unique input
        let sorted: BTreeSet<String> = terms.into_iter().collect();
        let mut builder = MapBuilder::memory();
        for (id, term) in sorted.iter().enumerate() {
            builder.insert(term.as_bytes(), id as u64)?;
        }
        Ok(TermDictionary {
            fst: builder.into_map(),
            terms: sorted.into_iter().collect(),
        })
    }

    /// Ids of all terms starting with `prefix`, failing past `max_terms`
    pub fn expand_prefix(&self, prefix: &str, max_terms: usize) -> Result<Vec<u32>> {
        let prefix_bytes = prefix.as_bytes();
        let mut ids = Vec::new();
        let mut stream = self.fst.range().ge(prefix_bytes).into_stream();

        while let Some((term_bytes, id)) = stream.next() {
            if !term_bytes.starts_with(prefix_bytes) {
                break;
            }
            ids.push(id as u32);
            if ids.len() > max_terms {
                return Err(too_broad(prefix, max_terms));
            }
        }
        Ok(ids)
    }

    /// Ids of terms matching a `*` wildcard pattern ("prog*", "get*User")
    pub fn expand_wildcard(&self, pattern: &str, max_terms: usize) -> Result<Vec<u32>> {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 1 {
            return Ok(self.id_of(pattern).into_iter().collect());
        }
        if parts.len() == 2 && parts[1].is_empty() {
            return self.expand_prefix(parts[0], max_terms);
        }

        let mut ids = Vec::new();
        let mut stream = self.fst.stream();
        while let Some((term_bytes, id)) = stream.next() {
            let Ok(term) = std::str::from_utf8(term_bytes) else {
                continue;
            };
            if matches_wildcard(term, &parts) {
                ids.push(id as u32);
                if ids.len() > max_terms {
                    return Err(too_broad(pattern, max_terms));
                }
            }
        }
        Ok(ids)
    }
}

impl Terms for TermDictionary {
    fn get(&self, id: u32) -> Option<&str> {
        self.terms.get(id as usize).map(|t| t.as_str())
    }

    fn id_of(&self, term: &str) -> Option<u32> {
        self.fst.get(term.as_bytes()).map(|id| id as u32)
    }

    fn len(&self) -> usize {
        self.terms.len()
    }
}

fn too_broad(pattern: &str, max_terms: usize) -> Error {
    Error::new(
        ErrorKind::QueryTooBroad,
        format!("'{}' matches more than {} terms", pattern, max_terms),
    )
}

fn matches_wildcard(text: &str, parts: &[&str]) -> bool {
    let last = parts.len() - 1;
    let mut pos = 0;

    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            // Pattern must start with this part
            if !text.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == last {
            // ...and end with this one, without overlapping what we consumed
            return text.len() >= pos + part.len() && text.ends_with(part);
        } else if !part.is_empty() {
            match text[pos..].find(part) {
                Some(idx) => pos += idx + part.len(),
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> TermDictionary {
        TermDictionary::build(
            ["program", "programme", "progress", "project", "the", "getUser", "getAdminUser"]
                .iter()
                .map(|s| s.to_string()),
        ).unwrap()
    }

    #[test]
    fn ids_follow_sorted_order() {
        let dict = dictionary();
        assert_eq!(dict.len(), 7);
        assert_eq!(dict.get(0), Some("getAdminUser"));
        assert_eq!(dict.id_of("the"), Some(6));
        assert_eq!(dict.get(dict.id_of("project").unwrap()), Some("project"));
        assert_eq!(dict.id_of("missing"), None);
    }

    #[test]
    fn prefix_expansion() {
        let dict = dictionary();
        let ids = dict.expand_prefix("progr", 10).unwrap();
        let terms: Vec<_> = ids.iter().map(|id| dict.get(*id).unwrap()).collect();
        assert_eq!(terms, vec!["program", "programme", "progress"]);
    }

    #[test]
    fn prefix_expansion_over_limit_is_too_broad() {
        let dict = dictionary();
        let err = dict.expand_prefix("pro", 2).unwrap_err();
        assert!(err.is_query_too_broad());
    }

    #[test]
    fn infix_wildcard() {
        let dict = dictionary();
        let ids = dict.expand_wildcard("get*User", 10).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(dict.expand_wildcard("p*t", 10).unwrap().len() == 1);
    }
}
