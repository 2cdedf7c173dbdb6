//! Runtime configuration values available to act param templates
//!
//! The configuration document is flattened once at load time into dotted keys:
//!
//! ```yaml
//! codes:
//!   the_secret_one: hunter2
//! hosts: [a, b]
//! ```
//!
//! becomes `codes.the_secret_one = hunter2`, `hosts.0 = a`, `hosts.1 = b`.
//! Templates reference them as `{codes.the_secret_one}`.

use serde_yaml::Value;
use std::collections::BTreeMap;

use crate::error::ParamError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    values: BTreeMap<String, String>,
}

impl RuntimeConfig {
    pub fn from_yaml(value: &Value) -> Self {
        let mut values = BTreeMap::new();
        flatten(None, value, &mut values);
        Self { values }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitute every `{dotted.key}` in `template`.
    ///
    /// `{{` and `}}` produce literal braces. `param` names the act param in errors.
    pub fn render(&self, param: &str, template: &str) -> Result<String, ParamError> {
        let unterminated = || ParamError::Unterminated {
            param: param.to_string(),
        };

        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find(['{', '}']) {
            rendered.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix("{{") {
                rendered.push('{');
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                rendered.push('}');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('{') {
                let close = body.find('}').ok_or_else(unterminated)?;
                let key = body[..close].trim();
                if key.contains('{') {
                    return Err(unterminated());
                }
                let value = self.get(key).ok_or_else(|| ParamError::Unresolved {
                    param: param.to_string(),
                    placeholder: key.to_string(),
                })?;
                rendered.push_str(value);
                rest = &body[close + 1..];
            } else {
                return Err(unterminated());
            }
        }

        rendered.push_str(rest);
        Ok(rendered)
    }
}

fn flatten(prefix: Option<&str>, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |segment: &str| match prefix {
        Some(p) => format!("{}.{}", p, segment),
        None => segment.to_string(),
    };

    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                if let Some(segment) = scalar_to_string(key) {
                    flatten(Some(&join(&segment)), child, out);
                }
            }
        },
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(Some(&join(&index.to_string())), child, out);
            }
        },
        Value::Tagged(tagged) => flatten(prefix, &tagged.value, out),
        scalar => {
            if let (Some(key), Some(text)) = (prefix, scalar_to_string(scalar)) {
                out.insert(key.to_string(), text);
            }
        },
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
