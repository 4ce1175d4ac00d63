//! Keyword-style arguments passed through to model fitting and metric scoring.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{ModelError, SieveResult};

/// A concrete argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v).ok(),
            Self::Json(v) => v.as_u64().and_then(|n| usize::try_from(n).ok()),
            _ => None,
        }
    }
}

/// Named arguments, the Rust rendering of `**model_args` / `**metric_args`.
pub type ParamMap = HashMap<String, ParameterValue>;

/// Read an optional float argument, rejecting values of the wrong kind.
pub fn float_arg(args: &ParamMap, name: &str) -> SieveResult<Option<f64>> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            ModelError::InvalidArgument {
                name: name.to_string(),
                message: format!("expected a number, got {value}"),
            }
            .into()
        }),
    }
}

/// Read an optional non-negative integer argument.
pub fn usize_arg(args: &ParamMap, name: &str) -> SieveResult<Option<usize>> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => value.as_usize().map(Some).ok_or_else(|| {
            ModelError::InvalidArgument {
                name: name.to_string(),
                message: format!("expected a non-negative integer, got {value}"),
            }
            .into()
        }),
    }
}
