// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The function catalog, consulted by the fragmenter only to decide whether
//! an aggregate is decomposable and, if so, what its intermediate type is.
//! Everything else about function resolution (overload selection, casts,
//! ...) lives upstream and is out of scope here.

use std::collections::HashMap;

use crate::common::error::{FragmenterError, Result};
use crate::common::types::DataType;

/// The catalog lookup key for an aggregate call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub name: String,
    pub args: Vec<DataType>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, args: Vec<DataType>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// What the catalog knows about one function.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    name: String,
    /// `Some` iff the aggregate has an associative combiner and can be split
    /// into a partial stage (emitting this type) plus a final stage.
    intermediate_type: Option<DataType>,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, intermediate_type: Option<DataType>) -> Self {
        Self {
            name: name.into(),
            intermediate_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intermediate_type(&self) -> Option<&DataType> {
        self.intermediate_type.as_ref()
    }

    pub fn is_decomposable(&self) -> bool {
        self.intermediate_type.is_some()
    }
}

/// Read-only metadata catalog. Implementations must be immutable or
/// internally synchronized: the fragmenter never mutates it.
pub trait FunctionCatalog {
    fn resolve_function(&self, signature: &FunctionSignature) -> Result<FunctionInfo>;
}

/// An in-memory catalog for tests and small embeddings, analogous to the
/// hand-rolled `CatalogReader` doubles used around the scheduler in tests.
#[derive(Debug, Default)]
pub struct MemoryFunctionCatalog {
    functions: HashMap<String, FunctionInfo>,
}

impl MemoryFunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, info: FunctionInfo) -> &mut Self {
        self.functions.insert(name.into(), info);
        self
    }
}

impl FunctionCatalog for MemoryFunctionCatalog {
    fn resolve_function(&self, signature: &FunctionSignature) -> Result<FunctionInfo> {
        self.functions
            .get(&signature.name)
            .cloned()
            .ok_or_else(|| FragmenterError::UnknownFunction(signature.name.clone()))
    }
}
