//! Label and field selector encoding
//!
//! Selectors are encoded as `key1=value1,key2=value2` in the order the
//! requirements were added, equality requirements first and then the `!=`
//! ones. The order is significant: the mock server compares
//! the query string literally, so `{a, b}` and `{b, a}` are different selectors
//! on the wire even though a real API server would treat them as equal.

use std::fmt;

/// Operator joining a key to its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Equals => "=",
            Op::NotEquals => "!=",
        }
    }
}

/// Single `key<op>value` requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub op: Op,
    pub value: String,
}

/// Ordered set of exact-match selector requirements
///
/// A requirement is identified by its key and operator: adding one that is
/// already present replaces its value in place, keeping the original
/// position, while `app=web` and `app!=legacy` coexist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorSet {
    requirements: Vec<Requirement>,
}

impl SelectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Require `key` to equal `value`
    pub fn equal(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key.into(), Op::Equals, value.into())
    }

    /// Require `key` to differ from `value`
    pub fn not_equal(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key.into(), Op::NotEquals, value.into())
    }

    fn with(mut self, key: String, op: Op, value: String) -> Self {
        match self
            .requirements
            .iter_mut()
            .find(|r| r.key == key && r.op == op)
        {
            Some(existing) => existing.value = value,
            None => self.requirements.push(Requirement { key, op, value }),
        }
        self
    }

    /// Canonical `k=v,k2=v2,k3!=v3` form
    pub fn encode(&self) -> String {
        let equal = self.requirements.iter().filter(|r| r.op == Op::Equals);
        let not_equal = self.requirements.iter().filter(|r| r.op == Op::NotEquals);
        equal
            .chain(not_equal)
            .map(|r| format!("{}{}{}", r.key, r.op.as_str(), r.value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Encoded form, percent-encoded for use as a query parameter value
    pub fn to_query_value(&self) -> String {
        urlencoding::encode(&self.encode()).into_owned()
    }
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K, V> FromIterator<(K, V)> for SelectorSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(SelectorSet::new(), |set, (k, v)| set.equal(k, v))
    }
}

/// Build the `?labelSelector=...` suffix a list request carries for these labels
///
/// Handy when registering expectations against a collection path.
///
/// ```
/// use kube_resource_client::selector::label_selector_query;
///
/// assert_eq!(
///     label_selector_query([("app", "web"), ("tier", "front")]),
///     "?labelSelector=app%3Dweb%2Ctier%3Dfront"
/// );
/// ```
pub fn label_selector_query<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> String
where
    K: Into<String>,
    V: Into<String>,
{
    let set: SelectorSet = labels.into_iter().collect();
    if set.is_empty() {
        String::new()
    } else {
        format!("?labelSelector={}", set.to_query_value())
    }
}
