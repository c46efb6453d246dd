//! Attribute sets and the schema used to match consumers to variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key/value attributes describing what a consumer needs or a variant offers
/// (e.g. `usage=api`, `linkage=shared`).
///
/// Backed by a `BTreeMap` so iteration, display and serialization are
/// always in attribute-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, String>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy of `self` with every attribute in `overrides` replacing ours.
    pub fn merged(&self, overrides: &AttributeSet) -> AttributeSet {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            merged.insert(name, value);
        }
        merged
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

/// Matching rules for a single attribute, from `[schema.attributes.<name>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRules {
    /// Requested value → producer values that are acceptable in its place.
    #[serde(default)]
    pub compatible: BTreeMap<String, Vec<String>>,

    /// Producer values in preference order, used when several compatible
    /// candidates remain.
    #[serde(default)]
    pub prefer: Vec<String>,
}

/// Compatibility and disambiguation rules for all attributes.
///
/// `precedence` names the attributes that are disambiguated first. Every
/// attribute not listed follows in alphabetical order, which makes the
/// disambiguation order a total order over attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesSchema {
    #[serde(default)]
    pub precedence: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeRules>,
}

impl AttributesSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that a consumer asking for `requested` accepts a producer
    /// offering `produced` for `attribute`.
    pub fn add_compatibility(
        &mut self,
        attribute: &str,
        requested: &str,
        produced: &str,
    ) -> &mut Self {
        let accepted = self
            .attributes
            .entry(attribute.to_string())
            .or_default()
            .compatible
            .entry(requested.to_string())
            .or_default();
        if !accepted.iter().any(|v| v == produced) {
            accepted.push(produced.to_string());
        }
        self
    }

    /// Set the preferred producer values for `attribute`, most preferred first.
    pub fn prefer<I, S>(&mut self, attribute: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .entry(attribute.to_string())
            .or_default()
            .prefer = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_precedence<I, S>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precedence = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a producer value satisfies a requested value: equal, or
    /// accepted by a declared compatibility rule.
    pub fn is_compatible(&self, attribute: &str, requested: &str, produced: &str) -> bool {
        requested == produced || self.has_rule(attribute, requested, produced)
    }

    /// Whether a compatibility rule (not plain equality) accepts `produced`.
    pub fn has_rule(&self, attribute: &str, requested: &str, produced: &str) -> bool {
        self.attributes
            .get(attribute)
            .and_then(|rules| rules.compatible.get(requested))
            .is_some_and(|accepted| accepted.iter().any(|v| v == produced))
    }

    /// Preferred producer values for `attribute`, most preferred first.
    pub fn preference(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(attribute)
            .map(|rules| rules.prefer.as_slice())
            .unwrap_or(&[])
    }

    /// Order in which the given attributes are disambiguated: declared
    /// precedence first, then the rest alphabetically.
    pub fn attribute_order<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut rest: Vec<&str> = names.into_iter().collect();
        rest.sort_unstable();
        rest.dedup();

        let mut order: Vec<String> = Vec::with_capacity(rest.len());
        for name in &self.precedence {
            if rest.contains(&name.as_str()) && !order.contains(name) {
                order.push(name.clone());
            }
        }
        for name in rest {
            if !order.iter().any(|o| o == name) {
                order.push(name.to_string());
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_sorted() {
        let attrs = AttributeSet::new()
            .with("usage", "api")
            .with("linkage", "shared");
        assert_eq!(attrs.to_string(), "{linkage=shared, usage=api}");
    }

    #[test]
    fn merged_overrides_values() {
        let base = AttributeSet::new().with("usage", "runtime").with("os", "linux");
        let merged = base.merged(&AttributeSet::new().with("usage", "api"));
        assert_eq!(merged.get("usage"), Some("api"));
        assert_eq!(merged.get("os"), Some("linux"));
    }

    #[test]
    fn compatibility_rules() {
        let mut schema = AttributesSchema::new();
        schema.add_compatibility("usage", "runtime", "link");
        assert!(schema.is_compatible("usage", "runtime", "runtime"));
        assert!(schema.is_compatible("usage", "runtime", "link"));
        assert!(!schema.is_compatible("usage", "link", "runtime"));
        assert!(schema.has_rule("usage", "runtime", "link"));
        assert!(!schema.has_rule("usage", "runtime", "runtime"));
    }

    #[test]
    fn attribute_order_puts_precedence_first() {
        let mut schema = AttributesSchema::new();
        schema.set_precedence(["usage", "missing"]);
        let order = schema.attribute_order(["os", "linkage", "usage", "os"]);
        assert_eq!(order, vec!["usage", "linkage", "os"]);
    }

    #[test]
    fn schema_from_toml() {
        let schema: AttributesSchema = toml::from_str(
            r#"
precedence = ["linkage"]

[attributes.linkage]
prefer = ["shared", "static"]

[attributes.usage.compatible]
runtime = ["link"]
"#,
        )
        .unwrap();
        assert_eq!(schema.preference("linkage"), ["shared", "static"]);
        assert!(schema.has_rule("usage", "runtime", "link"));
    }
}
