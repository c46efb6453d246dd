//! Attribute-based variant selection.
//!
//! A candidate survives filtering when none of its attribute values is
//! incompatible with the request. Survivors are narrowed one attribute at
//! a time, in the schema's attribute order:
//!
//! 1. candidates matching a requested value exactly beat those that only
//!    match through a compatibility rule;
//! 2. the schema's preferred values pick among what is left, for requested
//!    and unrequested attributes alike;
//! 3. candidates carrying the fewest attributes nobody asked for win.
//!
//! Candidates are sorted by name first, so the result never depends on the
//! order they were supplied in.

use trellis_core::attributes::{AttributeSet, AttributesSchema};
use trellis_core::component::Variant;

use crate::failure::ResolutionFailure;

/// How one candidate attribute relates to the requested value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Exact,
    Compatible,
    /// The candidate does not declare the attribute.
    Missing,
    Incompatible,
}

pub fn verdict(
    schema: &AttributesSchema,
    attribute: &str,
    requested: &str,
    candidate: &Variant,
) -> Verdict {
    match candidate.attributes.get(attribute) {
        None => Verdict::Missing,
        Some(produced) if produced == requested => Verdict::Exact,
        Some(produced) if schema.has_rule(attribute, requested, produced) => Verdict::Compatible,
        Some(_) => Verdict::Incompatible,
    }
}

fn describe(candidates: &[&Variant]) -> Vec<String> {
    candidates
        .iter()
        .map(|v| format!("{} {}", v.name, v.attributes))
        .collect()
}

/// Choose the single variant of `component` that best satisfies `requested`.
pub fn select_variant<'a>(
    component: &str,
    candidates: &'a [Variant],
    requested: &AttributeSet,
    schema: &AttributesSchema,
) -> Result<&'a Variant, ResolutionFailure> {
    let mut all: Vec<&Variant> = candidates.iter().collect();
    all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.attributes.cmp(&b.attributes)));

    let mut remaining: Vec<&Variant> = all
        .iter()
        .copied()
        .filter(|v| {
            requested
                .iter()
                .all(|(name, value)| verdict(schema, name, value, v) != Verdict::Incompatible)
        })
        .collect();
    if remaining.is_empty() {
        return Err(ResolutionFailure::NoCompatibleVariant {
            component: component.to_string(),
            requested: requested.clone(),
            candidates: describe(&all),
        });
    }

    for attribute in schema.attribute_order(requested.names()) {
        if remaining.len() == 1 {
            break;
        }
        let Some(value) = requested.get(&attribute) else {
            continue;
        };
        let exact: Vec<&Variant> = remaining
            .iter()
            .copied()
            .filter(|v| verdict(schema, &attribute, value, v) == Verdict::Exact)
            .collect();
        if !exact.is_empty() {
            remaining = exact;
        }
    }

    let names: Vec<&str> = requested
        .names()
        .chain(remaining.iter().flat_map(|v| v.attributes.names()))
        .collect();
    for attribute in schema.attribute_order(names) {
        if remaining.len() == 1 {
            break;
        }
        let preferred = schema.preference(&attribute).iter().find(|p| {
            remaining
                .iter()
                .any(|v| v.attributes.get(&attribute) == Some(p.as_str()))
        });
        if let Some(p) = preferred {
            remaining.retain(|v| v.attributes.get(&attribute) == Some(p.as_str()));
        }
    }

    if remaining.len() > 1 {
        let extra = |v: &Variant| v.attributes.names().filter(|n| !requested.contains(n)).count();
        let fewest = remaining.iter().map(|v| extra(*v)).min().unwrap_or(0);
        remaining.retain(|v| extra(*v) == fewest);
    }

    match remaining.as_slice() {
        [single] => Ok(*single),
        _ => Err(ResolutionFailure::AmbiguousVariant {
            component: component.to_string(),
            requested: requested.clone(),
            candidates: describe(&remaining),
        }),
    }
}
