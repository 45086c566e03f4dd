// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the Frechet project (directional derivatives as nested closures).

use std::fmt;

use super::{Closure, ExecError};

/// Runtime value of the reference executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
    Closure(Closure),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Vector(_) => "vector",
            Value::Closure(_) => "closure",
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Apply a closure value to a single tangent.
    pub fn call(&self, arg: Value) -> Result<Value, ExecError> {
        match self {
            Value::Closure(closure) => closure.call(&[arg]),
            other => Err(ExecError::NotCallable(other.kind())),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self, ExecError> {
        match json {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Scalar)
                .ok_or_else(|| ExecError::InvalidJson(n.to_string())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .ok_or_else(|| ExecError::InvalidJson(item.to_string()))
                })
                .collect::<Result<Vec<f64>, ExecError>>()
                .map(Value::Vector),
            other => Err(ExecError::InvalidJson(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, ExecError> {
        match self {
            Value::Scalar(v) => Ok(serde_json::json!(v)),
            Value::Vector(items) => Ok(serde_json::json!(items)),
            Value::Closure(_) => Err(ExecError::NotSerializable),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Value::Vector(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v}"),
            Value::Vector(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Closure(closure) => write!(f, "<closure stage {}>", closure.stage()),
        }
    }
}
