use std::collections::HashMap;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use quick_xml::escape::escape;
use crate::context::contexts::{ContextExtractor, ContextPart};
use crate::core::cancel::Checkpoint;
use crate::core::error::Result;
use crate::core::types::{ContextSize, Hit};
use crate::index::CorpusIndex;

/// Annotation name used for the punctuation slot when the field has none
pub const DEFAULT_PUNCT_ANNOTATION: &str = "punct";

/// Left context, match and right context as display strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concordance {
    pub left: String,
    pub hit: String,
    pub right: String,
}

impl Concordance {
    pub fn new(left: String, hit: String, right: String) -> Self {
        Concordance { left, hit, right }
    }

    /// Left, match and right joined back together
    pub fn full(&self) -> String {
        format!("{}{}{}", self.left, self.hit, self.right)
    }
}

/// Keyword in context: the hit plus surrounding tokens, every annotation.
///
/// Tokens are stored per position as `[punct, attributes..., word]`; punct
/// is the text between the previous word and this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kwic {
    annotations: Arc<[String]>,
    tokens: Vec<String>,
    hit_start: usize,
    hit_end: usize,
    fragment_start_in_doc: u32,
}

impl Kwic {
    pub fn new(
        annotations: Arc<[String]>,
        tokens: Vec<String>,
        hit_start: usize,
        hit_end: usize,
        fragment_start_in_doc: u32,
    ) -> Self {
        debug_assert!(annotations.len() >= 2);
        debug_assert!(hit_end * annotations.len() <= tokens.len());
        Kwic { annotations, tokens, hit_start, hit_end, fragment_start_in_doc }
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Positions in the fragment
    pub fn len(&self) -> usize {
        self.tokens.len() / self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn hit_start(&self) -> usize {
        self.hit_start
    }

    pub fn hit_end(&self) -> usize {
        self.hit_end
    }

    pub fn fragment_start_in_doc(&self) -> u32 {
        self.fragment_start_in_doc
    }

    pub fn fragment_end_in_doc(&self) -> u32 {
        self.fragment_start_in_doc + self.len() as u32
    }

    pub fn before(&self) -> &[String] {
        &self.tokens[..self.hit_start * self.annotations.len()]
    }

    pub fn matched(&self) -> &[String] {
        let n = self.annotations.len();
        &self.tokens[self.hit_start * n..self.hit_end * n]
    }

    pub fn after(&self) -> &[String] {
        &self.tokens[self.hit_end * self.annotations.len()..]
    }

    pub fn before_of(&self, annotation: &str) -> Option<Vec<&str>> {
        self.single_annotation(annotation, 0, self.hit_start)
    }

    pub fn matched_of(&self, annotation: &str) -> Option<Vec<&str>> {
        self.single_annotation(annotation, self.hit_start, self.hit_end)
    }

    pub fn after_of(&self, annotation: &str) -> Option<Vec<&str>> {
        self.single_annotation(annotation, self.hit_end, self.len())
    }

    fn single_annotation(&self, annotation: &str, from: usize, to: usize) -> Option<Vec<&str>> {
        let slot = self.annotations.iter().position(|a| a == annotation)?;
        let n = self.annotations.len();
        Some((from..to).map(|pos| self.tokens[pos * n + slot].as_str()).collect())
    }

    /// Concordance strings, either `<w>`-tagged XML with the middle
    /// annotations as attributes, or plain words and punctuation.
    ///
    /// Punctuation before the first matched word belongs to the left part.
    pub fn to_concordance(&self, produce_xml: bool) -> Concordance {
        let matched = self.matched();
        let punct_before_match = matched.first().map(String::as_str);
        Concordance {
            left: self.render(self.before(), true, punct_before_match, produce_xml),
            hit: self.render(matched, true, None, produce_xml),
            right: self.render(self.after(), false, None, produce_xml),
        }
    }

    fn render(&self, part: &[String], skip_first_punct: bool, append: Option<&str>, produce_xml: bool) -> String {
        let n = self.annotations.len();
        let mut out = String::new();
        for (i, token) in part.chunks_exact(n).enumerate() {
            let (punct, rest) = (&token[0], &token[1..]);
            let Some((word, attributes)) = rest.split_last() else {
                continue;
            };
            if i > 0 || !skip_first_punct {
                out.push_str(&escape_if(punct, produce_xml));
            }
            if produce_xml {
                out.push_str("<w");
                for (name, value) in self.annotations[1..n - 1].iter().zip(attributes) {
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value.as_str())));
                }
                out.push('>');
                out.push_str(&escape(word.as_str()));
                out.push_str("</w>");
            } else {
                out.push_str(word);
            }
        }
        if let Some(punct) = append {
            out.push_str(&escape_if(punct, produce_xml));
        }
        out
    }
}

fn escape_if(text: &str, xml: bool) -> String {
    if xml { escape(text).into_owned() } else { text.to_string() }
}

/// Kwics for a list of hits, keyed by hit
#[derive(Debug, Clone)]
pub struct Kwics {
    size: ContextSize,
    kwics: HashMap<Hit, Kwic>,
}

impl Kwics {
    /// Build from the forward index: punctuation first, other annotations
    /// with a forward index next, the main annotation last.
    pub fn build(index: &dyn CorpusIndex, hits: &[Hit], size: ContextSize, checkpoint: &Checkpoint) -> Result<Kwics> {
        let field = index.field();
        let main = field.main_annotation();
        let punct = field.punct_annotation().filter(|p| index.forward_index(p).is_some());

        let mut requested: Vec<&str> = Vec::new();
        requested.extend(punct);
        requested.extend(field.annotations()
            .iter()
            .map(String::as_str)
            .filter(|a| *a != main && Some(*a) != field.punct_annotation() && index.forward_index(a).is_some()));
        requested.push(main);

        let mut names: Vec<String> = Vec::with_capacity(requested.len() + 1);
        if punct.is_none() {
            names.push(field.punct_annotation().unwrap_or(DEFAULT_PUNCT_ANNOTATION).to_string());
        }
        names.extend(requested.iter().map(|a| a.to_string()));
        let names: Arc<[String]> = names.into();

        let contexts = ContextExtractor::new(index, checkpoint).extract(hits, size, &requested)?;
        let mut kwics = HashMap::with_capacity(hits.len());
        for (i, hit) in hits.iter().enumerate() {
            let columns: Vec<Vec<String>> = (0..requested.len())
                .map(|a| contexts.words(i, a, ContextPart::Whole))
                .collect();
            let length = contexts.length(i);
            let mut tokens = Vec::with_capacity(length * names.len());
            for pos in 0..length {
                if punct.is_none() {
                    tokens.push(" ".to_string());
                }
                for column in &columns {
                    tokens.push(column.get(pos).cloned().unwrap_or_default());
                }
            }
            let hit_start = contexts.hit_start(i);
            let fragment_start = hit.start() - hit_start as u32;
            let kwic = Kwic::new(names.clone(), tokens, hit_start, contexts.right_start(i), fragment_start);
            kwics.insert(*hit, kwic);
        }
        Ok(Kwics { size, kwics })
    }

    pub fn size(&self) -> ContextSize {
        self.size
    }

    pub fn get(&self, hit: &Hit) -> Option<&Kwic> {
        self.kwics.get(hit)
    }

    pub fn len(&self) -> usize {
        self.kwics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kwics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hit, &Kwic)> {
        self.kwics.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwic() -> Kwic {
        let annotations: Arc<[String]> = vec!["punct".to_string(), "lemma".to_string(), "word".to_string()].into();
        let tokens = [
            ("", "the", "The"),
            (" ", "cat", "cat"),
            (", ", "sit", "sat"),
            (" ", "on", "on"),
            (" ", "a&b", "mats"),
        ]
        .iter()
        .flat_map(|(p, l, w)| [p.to_string(), l.to_string(), w.to_string()])
        .collect();
        Kwic::new(annotations, tokens, 2, 4, 10)
    }

    #[test]
    fn parts_and_single_annotations() {
        let kwic = kwic();
        assert_eq!(kwic.len(), 5);
        assert_eq!(kwic.before().len(), 6);
        assert_eq!(kwic.matched_of("word"), Some(vec!["sat", "on"]));
        assert_eq!(kwic.after_of("lemma"), Some(vec!["a&b"]));
        assert_eq!(kwic.before_of("pos"), None);
        assert_eq!(kwic.fragment_end_in_doc(), 15);
    }

    #[test]
    fn plain_concordance_moves_match_punct_left() {
        let conc = kwic().to_concordance(false);
        assert_eq!(conc.left, "The cat, ");
        assert_eq!(conc.hit, "sat on");
        assert_eq!(conc.right, " mats");
        assert_eq!(conc.full(), "The cat, sat on mats");
    }

    #[test]
    fn xml_concordance_tags_words() {
        let conc = kwic().to_concordance(true);
        assert_eq!(conc.left, "<w lemma=\"the\">The</w> <w lemma=\"cat\">cat</w>, ");
        assert_eq!(conc.hit, "<w lemma=\"sit\">sat</w> <w lemma=\"on\">on</w>");
        assert_eq!(conc.right, " <w lemma=\"a&amp;b\">mats</w>");
    }
}
