// Copyright 2025 eraflo
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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::program::{ProgramId, ProgramStage};
use std::fmt;

/// An error related to compiling a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The source failed to compile or failed reflection.
    CompilationError {
        /// The program label.
        label: String,
        /// Compiler output.
        details: String,
    },
    /// The program lacks an entry point for a stage a pass needs.
    MissingEntryPoint {
        /// The program label.
        label: String,
        /// The stage without an entry point.
        stage: ProgramStage,
    },
    /// The program handle is unknown to the device.
    NotFound {
        /// The unknown handle.
        id: ProgramId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Program compilation failed for '{label}': {details}")
            }
            ShaderError::MissingEntryPoint { label, stage } => {
                write!(f, "Program '{label}' has no {stage:?} entry point")
            }
            ShaderError::NotFound { id } => write!(f, "Program not found for ID: {id:?}"),
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A program-specific error occurred.
    Shader(ShaderError),
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// A write or read fell outside the resource.
    OutOfBounds {
        /// Byte offset of the access.
        offset: u64,
        /// Byte length of the access.
        len: u64,
        /// Size of the resource.
        size: u64,
    },
    /// An error originating from the graphics backend.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds { offset, len, size } => write!(
                f,
                "Resource access out of bounds: {len} bytes at offset {offset} in a {size}-byte resource"
            ),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            label: "hiz_cull".into(),
            details: "unexpected token".into(),
        };
        assert_eq!(
            err.to_string(),
            "Program compilation failed for 'hiz_cull': unexpected token"
        );
    }

    #[test]
    fn resource_error_wraps_shader_error() {
        let err: ResourceError = ShaderError::NotFound { id: ProgramId(9) }.into();
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Shader resource error"));
    }

    #[test]
    fn out_of_bounds_display() {
        let err = ResourceError::OutOfBounds {
            offset: 96,
            len: 80,
            size: 160,
        };
        assert_eq!(
            err.to_string(),
            "Resource access out of bounds: 80 bytes at offset 96 in a 160-byte resource"
        );
    }
}
