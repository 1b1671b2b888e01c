// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::errors::{EngineError, Result};

/// Device and queue for one engine, selected from the adapters that can
/// present to the given surface.
pub struct GpuContext {
    pub(crate) adapter: wgpu::Adapter,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
}

impl GpuContext {
    /// Picks an adapter compatible with `surface` and requests its device.
    /// `adapter_index` selects among the compatible adapters in enumeration
    /// order; `None` takes the first capable one.
    ///
    /// No capable adapter or a refused device request is fatal.
    pub fn new(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'static>,
        adapter_index: Option<usize>,
    ) -> Result<GpuContext> {
        let adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .filter(|a| a.is_surface_supported(surface))
            .collect();
        for (i, adapter) in adapters.iter().enumerate() {
            let info = adapter.get_info();
            log::info!(
                "adapter {i}: {} ({:?}, {:?})",
                info.name,
                info.device_type,
                info.backend
            );
        }

        let adapter = match adapter_index {
            Some(i) => adapters.into_iter().nth(i).ok_or_else(|| {
                EngineError::FatalDeviceState(format!("requested adapter {i} does not exist"))
            })?,
            None => {
                // ask wgpu for its preference before falling back to the
                // first enumerated adapter
                let preferred =
                    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: Some(surface),
                        force_fallback_adapter: false,
                    }));
                preferred
                    .or_else(|| adapters.into_iter().next())
                    .ok_or_else(|| {
                        EngineError::FatalDeviceState("no capable graphics adapter".into())
                    })?
            }
        };

        let info = adapter.get_info();
        log::info!(
            "selected adapter {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("psyvis device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))?;

        Ok(GpuContext {
            adapter,
            device,
            queue,
        })
    }
}
