//! Flow-node and process-instance identity types.
//!
//! Both are opaque strings assigned by the process engine; the wrappers keep
//! them from being mixed up with variable names and terms, which are also
//! plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a flow node within a process definition (e.g. `"ServiceTask_1"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowNodeId(pub String);

impl FlowNodeId {
    pub fn new(id: impl Into<String>) -> Self {
        FlowNodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlowNodeId {
    fn from(id: &str) -> Self {
        FlowNodeId(id.to_string())
    }
}

impl From<String> for FlowNodeId {
    fn from(id: String) -> Self {
        FlowNodeId(id)
    }
}

/// Identifier of a single recorded process execution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessInstanceId(pub String);

impl ProcessInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        ProcessInstanceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProcessInstanceId {
    fn from(id: &str) -> Self {
        ProcessInstanceId(id.to_string())
    }
}

impl From<String> for ProcessInstanceId {
    fn from(id: String) -> Self {
        ProcessInstanceId(id)
    }
}
