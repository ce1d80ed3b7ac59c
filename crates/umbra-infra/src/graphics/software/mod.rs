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

//! A CPU graphics device.
//!
//! [`SoftwareDevice`] implements the full device contract on the CPU. It is
//! used for headless runs on machines without an adapter and by the test
//! suites, which inspect its command and draw logs.

mod device;
mod encoder;
mod execute;
mod raster;
mod resources;

pub use device::{DrawRecord, SoftwareDevice, SubmittedCommand};
pub use encoder::SoftwareCommandEncoder;
