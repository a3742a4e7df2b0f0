use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::QueryInfo;
use crate::core::stats::WindowStats;
use crate::core::types::Hit;
use crate::search::hits::Hits;
use crate::search::property::{HitProperty, PropertyContext, PropertyValue};
use crate::search::sample::{sample_indices, SampleParameters};
use crate::search::window::window_bounds;

/// What groups can be sorted or filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupProperty {
    Identity,
    Size,
}

impl GroupProperty {
    fn value_of(self, group: &HitGroup) -> PropertyValue {
        match self {
            GroupProperty::Identity => group.identity.clone(),
            GroupProperty::Size => PropertyValue::Int(group.size as i64),
        }
    }
}

/// Hits sharing one property value
#[derive(Debug, Clone)]
pub struct HitGroup {
    identity: PropertyValue,
    stored: Hits,
    size: usize,
}

impl HitGroup {
    pub fn identity(&self) -> &PropertyValue {
        &self.identity
    }

    /// Stored hits, at most `max_per_group` of them
    pub fn stored_results(&self) -> &Hits {
        &self.stored
    }

    /// Number of hits in the group, stored or not
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Hits grouped by a property, in first-seen order
#[derive(Debug, Clone)]
pub struct HitGroups {
    query_info: Arc<QueryInfo>,
    property_name: String,
    groups: Vec<Arc<HitGroup>>,
    positions: HashMap<PropertyValue, usize>,
    max_per_group: Option<usize>,
    largest_group_size: usize,
    sum_of_group_sizes: usize,
    window_stats: Option<WindowStats>,
    sample_parameters: Option<SampleParameters>,
}

impl Hits {
    /// Group every hit by `property`, storing at most `max_per_group` hits
    /// per group (`None` stores all).
    pub fn group(&self, property: &dyn HitProperty, max_per_group: Option<usize>) -> Result<HitGroups> {
        self.ensure_all_read()?;
        let query_info = self.query_info().clone();

        let mut order: Vec<PropertyValue> = Vec::new();
        let mut members: HashMap<PropertyValue, (Vec<Hit>, usize)> = HashMap::new();
        {
            let state = self.state();
            let context = PropertyContext {
                index: query_info.index().as_ref(),
                captures: state.captures.as_ref(),
                checkpoint: query_info.checkpoint(),
            };
            let values = property.values(&state.hits, &context)?;
            for (value, hit) in values.into_iter().zip(state.hits.iter()) {
                let entry = members.entry(value).or_insert_with_key(|key| {
                    order.push(key.clone());
                    (Vec::new(), 0)
                });
                entry.1 += 1;
                if max_per_group.is_none_or(|max| entry.0.len() < max) {
                    entry.0.push(*hit);
                }
            }
        }

        let mut groups = Vec::with_capacity(order.len());
        for identity in order {
            let Some((stored, size)) = members.remove(&identity) else {
                continue;
            };
            let captures = self.captures_for(&stored);
            groups.push(Arc::new(HitGroup {
                identity,
                stored: Hits::from_list(&query_info, stored, captures),
                size,
            }));
        }

        let grouped = HitGroups::from_groups(query_info, property.name(), groups, max_per_group);
        debug!(
            results = self.id(),
            property = %grouped.property_name,
            groups = grouped.len(),
            largest = grouped.largest_group_size,
            "grouped hits"
        );
        Ok(grouped)
    }
}

impl HitGroups {
    fn from_groups(
        query_info: Arc<QueryInfo>,
        property_name: String,
        groups: Vec<Arc<HitGroup>>,
        max_per_group: Option<usize>,
    ) -> Self {
        let positions = groups.iter()
            .enumerate()
            .map(|(i, g)| (g.identity.clone(), i))
            .collect();
        let largest_group_size = groups.iter().map(|g| g.size).max().unwrap_or(0);
        let sum_of_group_sizes = groups.iter().map(|g| g.size).sum();
        HitGroups {
            query_info,
            property_name,
            groups,
            positions,
            max_per_group,
            largest_group_size,
            sum_of_group_sizes,
            window_stats: None,
            sample_parameters: None,
        }
    }

    /// Same lineage, different selection of groups
    fn derived(&self, groups: Vec<Arc<HitGroup>>) -> HitGroups {
        HitGroups::from_groups(self.query_info.clone(), self.property_name.clone(), groups, self.max_per_group)
    }

    pub fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Arc<HitGroup>] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<HitGroup>> {
        self.groups.iter()
    }

    pub fn get(&self, identity: &PropertyValue) -> Result<&Arc<HitGroup>> {
        self.positions
            .get(identity)
            .map(|&i| &self.groups[i])
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no group with identity '{}'", identity)))
    }

    pub fn max_per_group(&self) -> Option<usize> {
        self.max_per_group
    }

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
    pub fn sort(&self, by: GroupProperty, reverse: bool) -> HitGroups {
        let mut sorted = self.groups.clone();
        match (by, reverse) {
            (GroupProperty::Size, false) => sorted.sort_by_key(|g| g.size),
            (GroupProperty::Size, true) => sorted.sort_by(|a, b| b.size.cmp(&a.size)),
            (GroupProperty::Identity, false) => sorted.sort_by(|a, b| a.identity.cmp(&b.identity)),
            (GroupProperty::Identity, true) => sorted.sort_by(|a, b| b.identity.cmp(&a.identity)),
        }
        self.derived(sorted)
    }

    /// Groups whose identity or size equals `value`
    pub fn filter(&self, by: GroupProperty, value: &PropertyValue) -> HitGroups {
        let kept = self.groups.iter()
            .filter(|g| by.value_of(g) == *value)
            .cloned()
            .collect();
        self.derived(kept)
    }

    pub fn window(&self, first: usize, size: usize) -> Result<HitGroups> {
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

    pub fn sample(&self, parameters: SampleParameters) -> HitGroups {
        let selected = sample_indices(&parameters, self.groups.len())
            .into_iter()
            .map(|i| self.groups[i].clone())
            .collect();
        let mut sample = self.derived(selected);
        sample.sample_parameters = Some(parameters);
        sample
    }

    /// Same groups, each storing at most `max` hits. Sizes are unchanged.
    pub fn with_fewer_stored_results(&self, max: usize) -> HitGroups {
        if self.max_per_group.is_some_and(|current| current <= max) {
            return self.clone();
        }
        let groups = self.groups.iter()
            .map(|group| {
                let kept: Vec<Hit> = group.stored.hits_snapshot().into_iter().take(max).collect();
                let captures = group.stored.captures_for(&kept);
                Arc::new(HitGroup {
                    identity: group.identity.clone(),
                    stored: Hits::from_list(&self.query_info, kept, captures),
                    size: group.size,
                })
            })
            .collect();
        HitGroups::from_groups(self.query_info.clone(), self.property_name.clone(), groups, Some(max))
    }
}
