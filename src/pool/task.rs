// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::TaskError;

/// One unit of batch work: the argument record handed to a `PoolOperation`.
///
/// The three shapes mirror how call sites describe their work: an ordered
/// record unpacked positionally, a keyword record unpacked by field name, or
/// a single argument passed through as-is. A batch must be homogeneous; the
/// pool rejects a mixed batch before dispatching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task<T> {
    /// Ordered arguments, unpacked positionally.
    Positional(Vec<T>),
    /// Keyword arguments, unpacked by field name.
    Named(BTreeMap<String, T>),
    /// A single argument.
    Single(T),
}

impl<T> Task<T> {
    /// Variant name, used for homogeneity checks and error reporting.
    pub fn shape(&self) -> &'static str {
        match self {
            Task::Positional(_) => "positional",
            Task::Named(_) => "named",
            Task::Single(_) => "single",
        }
    }
}

/// An operation the pool can map over a batch.
///
/// Dispatch is an explicit match on the `Task` discriminant: the pool calls
/// the method matching the task's shape. Operations implement only the
/// shapes they accept; the defaults reject with `UnsupportedShape`.
#[async_trait]
pub trait PoolOperation: Send + Sync {
    type Arg: Send + Sync + 'static;
    type Output: Send + 'static;

    /// Operation name for diagnostics.
    fn name(&self) -> &'static str;

    async fn positional(&self, args: Vec<Self::Arg>) -> Result<Self::Output, TaskError> {
        let _ = args;
        Err(TaskError::UnsupportedShape {
            shape: "positional",
            operation: self.name(),
        })
    }

    async fn named(
        &self,
        args: BTreeMap<String, Self::Arg>,
    ) -> Result<Self::Output, TaskError> {
        let _ = args;
        Err(TaskError::UnsupportedShape {
            shape: "named",
            operation: self.name(),
        })
    }

    async fn single(&self, arg: Self::Arg) -> Result<Self::Output, TaskError> {
        let _ = arg;
        Err(TaskError::UnsupportedShape {
            shape: "single",
            operation: self.name(),
        })
    }
}
