use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use crate::context::contexts::{ContextExtractor, ContextPart};
use crate::core::cancel::Checkpoint;
use crate::core::captures::CapturedGroups;
use crate::core::error::Result;
use crate::core::types::{ContextSize, Hit, Span};
use crate::index::CorpusIndex;

/// Group identity / sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Str(String),
    Tokens(Vec<String>),
    Span(Option<Span>),
    Multiple(Vec<PropertyValue>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Str(s) => write!(f, "{}", s),
            PropertyValue::Tokens(tokens) => write!(f, "{}", tokens.join(" ")),
            PropertyValue::Span(Some(span)) => write!(f, "{}-{}", span.start, span.end),
            PropertyValue::Span(None) => Ok(()),
            PropertyValue::Multiple(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " / ")?;
                    }
                    write!(f, "{}", value)?;
                }
                Ok(())
            }
        }
    }
}

/// What a property may look at besides the hit itself
pub struct PropertyContext<'a> {
    pub index: &'a dyn CorpusIndex,
    pub captures: Option<&'a CapturedGroups>,
    pub checkpoint: &'a Checkpoint,
}

/// Maps hits to values for grouping, sorting and filtering
pub trait HitProperty: Send + Sync + fmt::Debug {
    fn name(&self) -> String;

    /// Whether values come from forward-index context
    fn needs_context(&self) -> bool {
        false
    }

    /// One value per hit, in order. Context is fetched once for the whole slice.
    fn values(&self, hits: &[Hit], context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocIdProperty;

impl HitProperty for DocIdProperty {
    fn name(&self) -> String {
        "docid".to_string()
    }

    fn values(&self, hits: &[Hit], _context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>> {
        Ok(hits.iter().map(|h| PropertyValue::Int(h.doc() as i64)).collect())
    }
}

/// Start position of the hit in its document
#[derive(Debug, Clone, Copy, Default)]
pub struct HitPositionProperty;

impl HitProperty for HitPositionProperty {
    fn name(&self) -> String {
        "hitposition".to_string()
    }

    fn values(&self, hits: &[Hit], _context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>> {
        Ok(hits.iter().map(|h| PropertyValue::Int(h.start() as i64)).collect())
    }
}

/// Span captured under a group name; `Span(None)` when not captured
#[derive(Debug, Clone)]
pub struct CaptureGroupProperty {
    name: String,
}

impl CaptureGroupProperty {
    pub fn new(name: &str) -> Self {
        CaptureGroupProperty { name: name.to_string() }
    }
}

impl HitProperty for CaptureGroupProperty {
    fn name(&self) -> String {
        format!("capture:{}", self.name)
    }

    fn values(&self, hits: &[Hit], context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>> {
        Ok(hits.iter()
            .map(|h| PropertyValue::Span(context.captures.and_then(|c| c.by_name(h, &self.name))))
            .collect())
    }
}

/// Words of one annotation from a part of the hit's context
#[derive(Debug, Clone)]
pub struct ContextWordsProperty {
    annotation: String,
    part: ContextPart,
    size: ContextSize,
}

impl ContextWordsProperty {
    /// The matched words themselves
    pub fn hit_text(annotation: &str) -> Self {
        ContextWordsProperty {
            annotation: annotation.to_string(),
            part: ContextPart::Match,
            size: ContextSize::symmetric(0),
        }
    }

    pub fn left(annotation: &str, words: u32) -> Self {
        ContextWordsProperty {
            annotation: annotation.to_string(),
            part: ContextPart::Before,
            size: ContextSize::new(words, 0),
        }
    }

    pub fn right(annotation: &str, words: u32) -> Self {
        ContextWordsProperty {
            annotation: annotation.to_string(),
            part: ContextPart::After,
            size: ContextSize::new(0, words),
        }
    }
}

impl HitProperty for ContextWordsProperty {
    fn name(&self) -> String {
        let part = match self.part {
            ContextPart::Before => "left",
            ContextPart::Match => "hit",
            ContextPart::After => "right",
            ContextPart::Whole => "context",
        };
        format!("{}:{}", part, self.annotation)
    }

    fn needs_context(&self) -> bool {
        true
    }

    fn values(&self, hits: &[Hit], context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>> {
        let contexts = ContextExtractor::new(context.index, context.checkpoint)
            .extract(hits, self.size, &[self.annotation.as_str()])?;
        Ok((0..hits.len())
            .map(|i| PropertyValue::Tokens(contexts.words(i, 0, self.part)))
            .collect())
    }
}

/// Several properties combined into one compound value
#[derive(Debug, Clone)]
pub struct MultipleProperty {
    parts: Vec<Arc<dyn HitProperty>>,
}

impl MultipleProperty {
    pub fn new(parts: Vec<Arc<dyn HitProperty>>) -> Self {
        MultipleProperty { parts }
    }
}

impl HitProperty for MultipleProperty {
    fn name(&self) -> String {
        self.parts.iter().map(|p| p.name()).collect::<Vec<_>>().join(",")
    }

    fn needs_context(&self) -> bool {
        self.parts.iter().any(|p| p.needs_context())
    }

    fn values(&self, hits: &[Hit], context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>> {
        let mut columns = self.parts
            .iter()
            .map(|p| p.values(hits, context).map(|v| v.into_iter()))
            .collect::<Result<Vec<_>>>()?;
        Ok((0..hits.len())
            .map(|_| PropertyValue::Multiple(columns.iter_mut().filter_map(|c| c.next()).collect()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_order_and_display() {
        let mut values = vec![
            PropertyValue::Int(3),
            PropertyValue::Int(1),
            PropertyValue::Int(2),
        ];
        values.sort();
        assert_eq!(values[0], PropertyValue::Int(1));

        let tokens = PropertyValue::Tokens(vec!["the".into(), "cat".into()]);
        assert_eq!(tokens.to_string(), "the cat");
        let multiple = PropertyValue::Multiple(vec![PropertyValue::Int(1), PropertyValue::Str("x".into())]);
        assert_eq!(multiple.to_string(), "1 / x");
    }
}
