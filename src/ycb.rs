//! Reference dimensional resolver
//!
//! A small priority-merge engine over section bundles. Dimensions are listed in
//! increasing priority; each dimension is a tree of values where a child is more
//! specific than its parent. A section's `settings` list holds `master` or
//! `dimension:value[,value...]` entries and matches a context when every constrained
//! dimension's context value is one of the listed values or a descendant of one.

use crate::context::{scalar_string, Context};
use crate::error::ResolveError;
use crate::resolver::{DimensionalResolver, ReadOptions, ResolverFactory};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

const MASTER: &str = "master";

/// Builds [`SectionResolver`]s
#[derive(Debug, Default, Clone)]
pub struct SectionResolverFactory;

impl ResolverFactory for SectionResolverFactory {
    fn build(&self, bundle: Vec<Value>) -> Result<Box<dyn DimensionalResolver>, ResolveError> {
        Ok(Box::new(SectionResolver::from_bundle(bundle)?))
    }
}

/// One axis of variation
#[derive(Debug)]
struct Dimension {
    name: String,
    /// value -> parent value
    parents: HashMap<String, Option<String>>,
}

impl Dimension {
    fn parse(index: usize, entry: &Value) -> Result<Self, ResolveError> {
        let map = entry.as_object().filter(|m| m.len() == 1).ok_or_else(|| {
            ResolveError::InvalidDimensions(format!(
                "entry {} must be an object with a single dimension name",
                index
            ))
        })?;
        let (name, tree) = map.iter().next().ok_or_else(|| {
            ResolveError::InvalidDimensions(format!("entry {} is empty", index))
        })?;

        let mut parents = HashMap::new();
        collect_values(tree, None, &mut parents);
        Ok(Self {
            name: name.clone(),
            parents,
        })
    }

    /// Depth of `wanted` above `value` (0 when equal), or None when `wanted` is not
    /// `value` or one of its ancestors.
    fn distance(&self, value: &str, wanted: &str) -> Option<usize> {
        let mut current = Some(value);
        let mut steps = 0;
        while let Some(v) = current {
            if v == wanted {
                return Some(steps);
            }
            current = self.parents.get(v).and_then(|p| p.as_deref());
            steps += 1;
        }
        None
    }

    fn depth(&self, value: &str) -> usize {
        let mut depth = 1;
        let mut current = self.parents.get(value).and_then(|p| p.as_deref());
        while let Some(parent) = current {
            depth += 1;
            current = self.parents.get(parent).and_then(|p| p.as_deref());
        }
        depth
    }
}

fn collect_values(tree: &Value, parent: Option<&str>, out: &mut HashMap<String, Option<String>>) {
    if let Value::Object(children) = tree {
        for (value, subtree) in children {
            out.insert(value.clone(), parent.map(str::to_string));
            collect_values(subtree, Some(value), out);
        }
    }
}

/// A parsed section
#[derive(Debug)]
struct Section {
    settings: Vec<String>,
    /// (dimension index, accepted values); empty for `master`
    constraints: Vec<(usize, Vec<String>)>,
    body: Value,
}

/// Section-bundle resolver
#[derive(Debug)]
pub struct SectionResolver {
    dimensions_value: Value,
    dimensions: Vec<Dimension>,
    sections: Vec<Section>,
}

impl SectionResolver {
    /// Build from `[{"dimensions": D}, section, ...]`
    pub fn from_bundle(bundle: Vec<Value>) -> Result<Self, ResolveError> {
        let mut items = bundle.into_iter();
        let head = items
            .next()
            .ok_or_else(|| ResolveError::InvalidBundle("bundle is empty".to_string()))?;
        let dimensions_value = match head {
            Value::Object(mut map) => map.remove("dimensions").ok_or_else(|| {
                ResolveError::InvalidBundle("first entry must carry `dimensions`".to_string())
            })?,
            _ => {
                return Err(ResolveError::InvalidBundle(
                    "first entry must be an object".to_string(),
                ))
            }
        };

        let dimensions = dimensions_value
            .as_array()
            .ok_or_else(|| ResolveError::InvalidDimensions("expected a list".to_string()))?
            .iter()
            .enumerate()
            .map(|(i, entry)| Dimension::parse(i, entry))
            .collect::<Result<Vec<_>, _>>()?;
        let index: HashMap<&str, usize> = dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();

        let mut sections = Vec::new();
        for (position, item) in items.enumerate() {
            let Value::Object(mut body) = item else {
                return Err(ResolveError::InvalidBundle(format!(
                    "section {} is not an object",
                    position
                )));
            };
            let settings: Vec<String> = match body.remove("settings") {
                Some(Value::Array(list)) => list.iter().map(|s| scalar_string(s).into_owned()).collect(),
                _ => {
                    return Err(ResolveError::InvalidBundle(format!(
                        "section {} has no settings list",
                        position
                    )))
                }
            };

            match parse_constraints(&settings, &index) {
                Some(constraints) => sections.push(Section {
                    settings,
                    constraints,
                    body: Value::Object(body),
                }),
                None => {
                    warn!(?settings, "Skipping section with unknown dimension");
                }
            }
        }

        Ok(Self {
            dimensions_value,
            dimensions,
            sections,
        })
    }

    /// Sections that apply to `context`, least specific first
    fn matches(&self, context: &Context) -> Vec<&Section> {
        let values: Vec<Option<String>> = self
            .dimensions
            .iter()
            .map(|d| context.get(&d.name).map(|v| scalar_string(v).into_owned()))
            .collect();

        let mut ranked: Vec<(Vec<usize>, usize, &Section)> = Vec::new();
        for (position, section) in self.sections.iter().enumerate() {
            if let Some(score) = self.score(section, &values) {
                ranked.push((score, position, section));
            }
        }
        ranked.sort_by(|a, b| match compare_scores(&a.0, &b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });
        ranked.into_iter().map(|(_, _, section)| section).collect()
    }

    /// Per-dimension specificity, or None when the section does not apply
    fn score(&self, section: &Section, values: &[Option<String>]) -> Option<Vec<usize>> {
        let mut score = vec![0; self.dimensions.len()];
        for (dim, accepted) in &section.constraints {
            let value = values[*dim].as_deref()?;
            let dimension = &self.dimensions[*dim];
            let best = accepted
                .iter()
                .filter_map(|wanted| dimension.distance(value, wanted).map(|_| wanted))
                .map(|wanted| dimension.depth(wanted))
                .max()?;
            score[*dim] = best;
        }
        Some(score)
    }
}

/// Later dimensions carry more weight
fn compare_scores(a: &[usize], b: &[usize]) -> Ordering {
    a.iter().rev().cmp(b.iter().rev())
}

fn parse_constraints(
    settings: &[String],
    index: &HashMap<&str, usize>,
) -> Option<Vec<(usize, Vec<String>)>> {
    let mut constraints = Vec::new();
    for setting in settings {
        if setting == MASTER {
            continue;
        }
        let (name, values) = setting.split_once(':')?;
        let dim = *index.get(name.trim())?;
        let values = values.split(',').map(|v| v.trim().to_string()).collect();
        constraints.push((dim, values));
    }
    Some(constraints)
}

/// Recursive object merge; anything else in `overlay` replaces `target`
pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(into), Value::Object(from)) => merge_maps(into, from),
        (slot, value) => *slot = value.clone(),
    }
}

fn merge_maps(into: &mut Map<String, Value>, from: &Map<String, Value>) {
    for (key, value) in from {
        match into.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}

impl DimensionalResolver for SectionResolver {
    fn read(&self, context: &Context, _options: &ReadOptions) -> Result<Value, ResolveError> {
        let mut merged = Value::Object(Map::new());
        for section in self.matches(context) {
            deep_merge(&mut merged, &section.body);
        }
        Ok(merged)
    }

    fn read_no_merge(
        &self,
        context: &Context,
        _options: &ReadOptions,
    ) -> Result<Vec<Value>, ResolveError> {
        Ok(self
            .matches(context)
            .into_iter()
            .rev()
            .map(|section| section.body.clone())
            .collect())
    }

    fn dimensions(&self) -> &Value {
        &self.dimensions_value
    }

    fn walk_settings(&self, visit: &mut dyn FnMut(&[String], &Value) -> bool) {
        for section in &self.sections {
            if !visit(&section.settings, &section.body) {
                break;
            }
        }
    }
}
