// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::errors::{EngineError, Result};
use crate::gpu::context::GpuContext;

/// The presentable surface and its configuration. Presentation is always
/// vsynced (Fifo), which is what gives the frame loop its timing guarantee.
pub struct SwapSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SwapSurface {
    pub fn new(
        gpu: &GpuContext,
        surface: wgpu::Surface<'static>,
        size: (u32, u32),
    ) -> Result<SwapSurface> {
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                EngineError::FatalDeviceState("surface reports no supported formats".into())
            })?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&gpu.device, &config);
        log::debug!("surface configured: {}x{} {format:?}", config.width, config.height);
        Ok(SwapSurface { surface, config })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigures for a new drawable size. No-op when unchanged.
    pub fn resize(&mut self, gpu: &GpuContext, size: (u32, u32)) {
        let (w, h) = (size.0.max(1), size.1.max(1));
        if (w, h) == (self.config.width, self.config.height) {
            return;
        }
        self.config.width = w;
        self.config.height = h;
        self.surface.configure(&gpu.device, &self.config);
        log::debug!("surface resized to {w}x{h}");
    }

    /// Reconfigures in place after an invalidation.
    pub fn recreate(&mut self, gpu: &GpuContext) {
        self.surface.configure(&gpu.device, &self.config);
    }

    /// Acquires the next frame target. Invalidation and timed-out waits
    /// come back as recoverable errors, already reconfigured so the retry
    /// can succeed; out-of-memory is fatal.
    pub fn acquire(&mut self, gpu: &GpuContext) -> Result<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(
                e @ (wgpu::SurfaceError::Lost
                | wgpu::SurfaceError::Outdated
                | wgpu::SurfaceError::Timeout),
            ) => {
                self.recreate(gpu);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
