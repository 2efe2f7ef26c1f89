//! Forwarding options to a backend that may accept only some of them.
//!
//! A wrapper such as the data loader accepts more options than every backend
//! supports. The backend publishes a [`ParamManifest`], the wrapper describes
//! what it was called with as [`CallerParams`], and [`match_params`] keeps the
//! options the backend understands.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Parameter names a callee understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedParams {
    Named(BTreeSet<String>),
    /// The callee takes arbitrary named parameters.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamManifest {
    callee: String,
    accepted: AcceptedParams,
}

impl ParamManifest {
    pub fn named<I, S>(callee: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            callee: callee.into(),
            accepted: AcceptedParams::Named(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn any(callee: impl Into<String>) -> Self {
        Self { callee: callee.into(), accepted: AcceptedParams::Any }
    }

    pub fn callee(&self) -> &str {
        &self.callee
    }

    pub fn accepts(&self, name: &str) -> bool {
        match &self.accepted {
            AcceptedParams::Named(names) => names.contains(name),
            AcceptedParams::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DeclaredParam {
    name: String,
    default: Option<Value>,
    bound: Option<Value>,
}

/// The parameters a caller declares, with their defaults, and the values it
/// was actually given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallerParams {
    declared: Vec<DeclaredParam>,
    extras: BTreeMap<String, Value>,
    positional_varargs: bool,
}

impl CallerParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter with a default value.
    pub fn declare(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.declared.push(DeclaredParam { name: name.into(), default: Some(default.into()), bound: None });
        self
    }

    /// Declares a parameter without a default.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.declared.push(DeclaredParam { name: name.into(), default: None, bound: None });
        self
    }

    /// Binds a value. Names that were never declared become extra parameters.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.declared.iter_mut().find(|p| p.name == name) {
            Some(param) => param.bound = Some(value),
            None => {
                self.extras.insert(name, value);
            }
        }
        self
    }

    /// Marks the caller as taking positional varargs, which cannot be matched
    /// by name.
    pub fn with_positional_varargs(mut self) -> Self {
        self.positional_varargs = true;
        self
    }
}

/// Parameters to forward, plus the non-default ones that had to be dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedParams {
    pub params: BTreeMap<String, Value>,
    pub unsupported: Vec<String>,
}

#[derive(Debug, Error)]
enum ParamError {
    #[error("positional varargs cannot be matched by name")]
    PositionalVarargs,

    #[error("parameter `{0}` has neither a value nor a default")]
    Unbound(String),
}

/// Selects the caller's parameters that `callee` accepts.
///
/// A dropped parameter is reported with a warning only if it was changed from
/// its default. Returns `None` if the caller's parameters cannot be resolved;
/// callers then fall back to a conservative option set.
pub fn match_params(caller: &CallerParams, callee: &ParamManifest) -> Option<MatchedParams> {
    match try_match(caller, callee) {
        Ok(matched) => Some(matched),
        Err(err) => {
            debug!("Could not match parameters for {}: {}", callee.callee(), err);
            None
        }
    }
}

fn try_match(caller: &CallerParams, callee: &ParamManifest) -> Result<MatchedParams, ParamError> {
    if caller.positional_varargs {
        return Err(ParamError::PositionalVarargs);
    }

    let mut candidates: Vec<(&str, &Value, Option<&Value>)> = Vec::new();
    for param in &caller.declared {
        let value = param
            .bound
            .as_ref()
            .or(param.default.as_ref())
            .ok_or_else(|| ParamError::Unbound(param.name.clone()))?;
        candidates.push((param.name.as_str(), value, param.default.as_ref()));
    }
    candidates.extend(caller.extras.iter().map(|(name, value)| (name.as_str(), value, None)));

    let mut matched = MatchedParams::default();
    for (name, value, default) in candidates {
        if callee.accepts(name) {
            matched.params.insert(name.to_string(), value.clone());
        } else if default.is_some_and(|default| default != value) {
            warn!("Parameter:{} is not supported for {}.", name, callee.callee());
            matched.unsupported.push(name.to_string());
        }
    }
    Ok(matched)
}
