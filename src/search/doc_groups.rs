use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::QueryInfo;
use crate::core::stats::WindowStats;
use crate::search::docs::{DocProperty, DocResult, DocResults};
use crate::search::group::GroupProperty;
use crate::search::property::PropertyValue;
use crate::search::sample::{sample_indices, SampleParameters};
use crate::search::window::window_bounds;

/// Documents sharing one property value
#[derive(Debug)]
pub struct DocGroup {
    identity: PropertyValue,
    stored: DocResults,
    size: usize,
    total_hits: usize,
}

impl DocGroup {
    pub fn identity(&self) -> &PropertyValue {
        &self.identity
    }

    /// Stored documents, at most `max_per_group` of them
    pub fn stored_results(&self) -> &DocResults {
        &self.stored
    }

    /// Number of documents in the group, stored or not
    pub fn size(&self) -> usize {
        self.size
    }

    /// Hits over every document in the group
    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    fn value_of(&self, by: GroupProperty) -> PropertyValue {
        match by {
            GroupProperty::Identity => self.identity.clone(),
            GroupProperty::Size => PropertyValue::Int(self.size as i64),
        }
    }
}

/// Per-document results grouped by a document property, in first-seen order
#[derive(Debug, Clone)]
pub struct DocGroups {
    query_info: Arc<QueryInfo>,
    property: DocProperty,
    groups: Vec<Arc<DocGroup>>,
    positions: HashMap<PropertyValue, usize>,
    max_per_group: Option<usize>,
    largest_group_size: usize,
    sum_of_group_sizes: usize,
    window_stats: Option<WindowStats>,
    sample_parameters: Option<SampleParameters>,
}

impl DocResults {
    /// Group every document by `property`, storing at most `max_per_group`
    /// documents per group (`None` stores all). Sizes count every document.
    pub fn group(&self, property: DocProperty, max_per_group: Option<usize>) -> Result<DocGroups> {
        let mut order: Vec<PropertyValue> = Vec::new();
        let mut members: HashMap<PropertyValue, (Vec<Arc<DocResult>>, usize, usize)> = HashMap::new();
        for result in self.results()? {
            let entry = members.entry(property.value_of(&result)).or_insert_with_key(|key| {
                order.push(key.clone());
                (Vec::new(), 0, 0)
            });
            entry.1 += 1;
            entry.2 += result.size();
            if max_per_group.is_none_or(|max| entry.0.len() < max) {
                entry.0.push(result);
            }
        }

        let groups = order.into_iter()
            .filter_map(|identity| {
                let (stored, size, total_hits) = members.remove(&identity)?;
                Some(Arc::new(DocGroup {
                    identity,
                    stored: self.derived(stored),
                    size,
                    total_hits,
                }))
            })
            .collect();

        let grouped = DocGroups::from_groups(self.query_info().clone(), property, groups, max_per_group);
        debug!(
            search = grouped.query_info.id(),
            property = ?property,
            groups = grouped.len(),
            largest = grouped.largest_group_size,
            "grouped documents"
        );
        Ok(grouped)
    }
}

impl DocGroups {
    fn from_groups(
        query_info: Arc<QueryInfo>,
        property: DocProperty,
        groups: Vec<Arc<DocGroup>>,
        max_per_group: Option<usize>,
    ) -> Self {
        let positions = groups.iter()
            .enumerate()
            .map(|(i, g)| (g.identity.clone(), i))
            .collect();
        let largest_group_size = groups.iter().map(|g| g.size).max().unwrap_or(0);
        let sum_of_group_sizes = groups.iter().map(|g| g.size).sum();
        DocGroups {
            query_info,
            property,
            groups,
            positions,
            max_per_group,
            largest_group_size,
            sum_of_group_sizes,
            window_stats: None,
            sample_parameters: None,
        }
    }

    fn derived(&self, groups: Vec<Arc<DocGroup>>) -> DocGroups {
        DocGroups::from_groups(self.query_info.clone(), self.property, groups, self.max_per_group)
    }

    pub fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }

    pub fn property(&self) -> DocProperty {
        self.property
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Arc<DocGroup>] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DocGroup>> {
        self.groups.iter()
    }

    pub fn get(&self, identity: &PropertyValue) -> Result<&Arc<DocGroup>> {
        self.positions
            .get(identity)
            .map(|&i| &self.groups[i])
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no document group with identity '{}'", identity)))
    }

    pub fn max_per_group(&self) -> Option<usize> {
        self.max_per_group
    }

    /// Documents in the largest group
    pub fn largest_group_size(&self) -> usize {
        self.largest_group_size
    }

    pub fn sum_of_group_sizes(&self) -> usize {
        self.sum_of_group_sizes
    }

    pub fn window_stats(&self) -> Option<WindowStats> {
        self.window_stats
    }

    pub fn sample_parameters(&self) -> Option<SampleParameters> {
        self.sample_parameters
    }

    /// Stable sort on identity or size
    pub fn sort(&self, by: GroupProperty, reverse: bool) -> DocGroups {
        let mut sorted = self.groups.clone();
        if reverse {
            sorted.sort_by(|a, b| b.value_of(by).cmp(&a.value_of(by)));
        } else {
            sorted.sort_by_key(|g| g.value_of(by));
        }
        self.derived(sorted)
    }

    pub fn filter(&self, by: GroupProperty, value: &PropertyValue) -> DocGroups {
        let kept = self.groups.iter()
            .filter(|g| g.value_of(by) == *value)
            .cloned()
            .collect();
        self.derived(kept)
    }

    pub fn window(&self, first: usize, size: usize) -> Result<DocGroups> {
        let total = self.groups.len();
        let (end, has_next) = window_bounds(first, size, |n| Ok(total >= n))?;
        let selected = self.groups[first..end.min(total)].to_vec();
        let actual = selected.len();
        let mut window = self.derived(selected);
        window.window_stats = Some(WindowStats {
            first,
            requested_size: size,
            actual_size: actual,
            has_next,
        });
        Ok(window)
    }

    pub fn sample(&self, parameters: SampleParameters) -> DocGroups {
        let selected = sample_indices(&parameters, self.groups.len())
            .into_iter()
            .map(|i| self.groups[i].clone())
            .collect();
        let mut sample = self.derived(selected);
        sample.sample_parameters = Some(parameters);
        sample
    }

    /// Same groups, each storing at most `max` documents. Sizes are unchanged.
    pub fn with_fewer_stored_results(&self, max: usize) -> Result<DocGroups> {
        if self.max_per_group.is_some_and(|current| current <= max) {
            return Ok(self.clone());
        }
        let groups = self.groups.iter()
            .map(|group| {
                let kept = group.stored.results()?.into_iter().take(max).collect();
                Ok(Arc::new(DocGroup {
                    identity: group.identity.clone(),
                    stored: group.stored.derived(kept),
                    size: group.size,
                    total_hits: group.total_hits,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DocGroups::from_groups(self.query_info.clone(), self.property, groups, Some(max)))
    }
}
