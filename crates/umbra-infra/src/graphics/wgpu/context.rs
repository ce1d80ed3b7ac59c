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

use anyhow::anyhow;
use anyhow::Result;
use wgpu::{Features, Instance};

/// Holds the core WGPU state objects required for rendering.
///
/// The context is headless: every target lives in an offscreen texture, so
/// no surface or window is involved.
#[derive(Debug)]
pub struct WgpuContext {
    /// The instance the adapter was picked from.
    pub instance: Instance,
    /// The selected adapter.
    pub adapter: wgpu::Adapter,
    /// The logical device.
    pub device: wgpu::Device,
    /// The device's command queue.
    pub queue: wgpu::Queue,

    /// Name reported by the adapter.
    pub adapter_name: String,
    /// Backend the adapter runs on.
    pub adapter_backend: wgpu::Backend,
    /// Kind of adapter (discrete, integrated, CPU...).
    pub adapter_device_type: wgpu::DeviceType,
    /// Features enabled on the device.
    pub active_device_features: wgpu::Features,
    /// Limits of the device.
    pub device_limits: wgpu::Limits,
}

impl WgpuContext {
    /// Picks an adapter and opens a device on it, blocking until both are ready.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or an error when no adapter
    ///   is available or the device request fails.
    pub fn new_headless() -> Result<Self> {
        pollster::block_on(Self::new_headless_async())
    }

    /// Async variant of [`new_headless`](Self::new_headless).
    pub async fn new_headless_async() -> Result<Self> {
        log::info!("Initializing headless WGPU context...");

        let instance = Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter: {}", e))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // Everything runs on core WebGPU; indirect draws always start at instance 0.
        let features_to_enable = Features::empty();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Logical Device"),
                required_features: features_to_enable,
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let active_device_features = device.features();
        let device_limits = device.limits();
        log::debug!("Active device features: {active_device_features:?}");
        log::debug!("Device limits: {device_limits:?}");

        Ok(WgpuContext {
            instance,
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
            active_device_features,
            device_limits,
        })
    }

    /// The logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
