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

//! The public data types of the renderer API.

pub mod buffer;
pub mod command;
pub mod disposal;
pub mod instance;
pub mod program;
pub mod query;
pub mod settings;
pub mod state;
pub mod stats;
pub mod texture;
pub mod uniforms;

pub use self::buffer::*;
pub use self::command::*;
pub use self::disposal::*;
pub use self::instance::*;
pub use self::program::*;
pub use self::query::*;
pub use self::settings::*;
pub use self::state::*;
pub use self::stats::*;
pub use self::texture::*;
pub use self::uniforms::*;
