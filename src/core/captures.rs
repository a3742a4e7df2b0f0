use std::collections::HashMap;
use std::sync::Arc;
use serde::Serialize;
use crate::core::types::{Hit, Span};

/// Captured sub-spans per hit.
///
/// All hits share one name list; each hit maps to a slot array of the same length.
#[derive(Debug, Clone)]
pub struct CapturedGroups {
    names: Arc<[String]>,
    groups: HashMap<Hit, Arc<[Option<Span>]>>,
}

/// Name/span pair for display and serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCapture {
    pub name: String,
    pub span: Option<Span>,
}

impl CapturedGroups {
    pub fn new(names: Arc<[String]>) -> Self {
        CapturedGroups {
            names,
            groups: HashMap::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn shared_names(&self) -> Arc<[String]> {
        self.names.clone()
    }

    pub fn put(&mut self, hit: Hit, spans: Arc<[Option<Span>]>) {
        debug_assert_eq!(spans.len(), self.names.len());
        self.groups.insert(hit, spans);
    }

    pub fn get(&self, hit: &Hit) -> Option<&[Option<Span>]> {
        self.groups.get(hit).map(|spans| &spans[..])
    }

    pub(crate) fn get_shared(&self, hit: &Hit) -> Option<Arc<[Option<Span>]>> {
        self.groups.get(hit).cloned()
    }

    /// Span captured under `name` for this hit
    pub fn by_name(&self, hit: &Hit, name: &str) -> Option<Span> {
        let index = self.names.iter().position(|n| n == name)?;
        self.groups.get(hit).and_then(|spans| spans[index])
    }

    pub fn named(&self, hit: &Hit) -> Option<Vec<NamedCapture>> {
        let spans = self.groups.get(hit)?;
        Some(self.names.iter()
            .zip(spans.iter())
            .map(|(name, span)| NamedCapture { name: name.clone(), span: *span })
            .collect())
    }

    /// Copy the entries of the given hits into a new map with the same names
    pub fn subset<'a, I>(&self, hits: I) -> CapturedGroups
    where
        I: IntoIterator<Item = &'a Hit>,
    {
        let mut out = CapturedGroups::new(self.names.clone());
        for hit in hits {
            if let Some(spans) = self.groups.get(hit) {
                out.groups.insert(*hit, spans.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Arc<[String]> {
        vec!["a".to_string(), "b".to_string()].into()
    }

    #[test]
    fn lookup_by_name() {
        let mut groups = CapturedGroups::new(names());
        let hit = Hit::new(0, 3, 6);
        groups.put(hit, vec![Some(Span::new(3, 4)), None].into());

        assert_eq!(groups.by_name(&hit, "a"), Some(Span::new(3, 4)));
        assert_eq!(groups.by_name(&hit, "b"), None);
        assert_eq!(groups.by_name(&hit, "c"), None);
        assert_eq!(groups.named(&hit).map(|n| n.len()), Some(2));
    }

    #[test]
    fn subset_keeps_names_and_only_requested_hits() {
        let mut groups = CapturedGroups::new(names());
        let h1 = Hit::new(0, 0, 1);
        let h2 = Hit::new(1, 0, 1);
        groups.put(h1, vec![None, None].into());
        groups.put(h2, vec![Some(Span::new(0, 1)), None].into());

        let sub = groups.subset([&h2]);
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.names(), groups.names());
        assert!(sub.get(&h1).is_none());
        assert!(sub.get(&h2).is_some());
    }
}
