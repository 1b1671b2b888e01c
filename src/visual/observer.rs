// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The observer: viewing geometry and per-eye view/projection matrices.
//!
//! All lengths are millimeters. The field of view follows from the physical
//! display size and the viewing distance, so items sized in degrees of
//! visual angle subtend exactly that angle on screen.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::errors::{EngineError, Result};
use crate::visual::item::Eye;

pub const DEFAULT_DISTANCE_MM: f32 = 500.0;
pub const DEFAULT_IPD_MM: f32 = 62.4;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Mono,
    /// Side-by-side stereo: the left half of the surface renders the left
    /// eye, the right half the right eye.
    Stereo,
}

#[derive(Debug, Clone, Copy)]
pub struct Observer {
    mode: ViewMode,
    /// Eye-to-display distance, mm.
    distance: f32,
    /// Inter-pupillary distance, mm.
    ipd: f32,
    /// Physical display size, mm.
    display: (f32, f32),
}

impl Observer {
    pub fn new(mode: ViewMode, distance: f32, display_mm: (f32, f32)) -> Result<Observer> {
        let mut observer = Observer {
            mode,
            distance: DEFAULT_DISTANCE_MM,
            ipd: DEFAULT_IPD_MM,
            display: (1.0, 1.0),
        };
        observer.set_distance(distance)?;
        observer.set_display(display_mm)?;
        Ok(observer)
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f32) -> Result<()> {
        if !(distance > 0.0 && distance.is_finite()) {
            return Err(EngineError::invalid(format!(
                "viewing distance must be positive, got {distance}"
            )));
        }
        self.distance = distance;
        Ok(())
    }

    pub fn ipd(&self) -> f32 {
        self.ipd
    }

    pub fn set_ipd(&mut self, ipd: f32) -> Result<()> {
        if !(ipd >= 0.0 && ipd.is_finite()) {
            return Err(EngineError::invalid(format!(
                "inter-pupillary distance must be nonnegative, got {ipd}"
            )));
        }
        self.ipd = ipd;
        Ok(())
    }

    pub fn set_display(&mut self, display_mm: (f32, f32)) -> Result<()> {
        if !(display_mm.0 > 0.0 && display_mm.1 > 0.0) {
            return Err(EngineError::invalid(format!(
                "display size must be positive, got {display_mm:?}"
            )));
        }
        self.display = display_mm;
        Ok(())
    }

    /// Horizontal field of view in radians. Stereo halves the width since
    /// each eye renders to half the surface.
    pub fn fov_x(&self) -> f32 {
        let width = match self.mode {
            ViewMode::Mono => self.display.0,
            ViewMode::Stereo => self.display.0 / 2.0,
        };
        2.0 * (width / 2.0 / self.distance).atan()
    }

    pub fn fov_y(&self) -> f32 {
        2.0 * (self.display.1 / 2.0 / self.distance).atan()
    }

    fn aspect(&self) -> f32 {
        let width = match self.mode {
            ViewMode::Mono => self.display.0,
            ViewMode::Stereo => self.display.0 / 2.0,
        };
        width / self.display.1
    }

    fn projection(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect(), self.fov_y(), Z_NEAR, Z_FAR)
    }

    /// View matrix for one eye: the camera sits at the eye position looking
    /// down -z. In stereo the eyes are offset by half the inter-pupillary
    /// distance each; in mono both passes use the cyclopean view.
    fn view(&self, eye: Eye) -> Matrix4<f32> {
        let offset = match (self.mode, eye) {
            (ViewMode::Mono, _) => 0.0,
            (ViewMode::Stereo, Eye::Left) => -self.ipd / 2.0,
            (ViewMode::Stereo, Eye::Right) => self.ipd / 2.0,
            (ViewMode::Stereo, _) => 0.0,
        };
        Matrix4::look_at_rh(
            &Point3::new(offset, 0.0, 0.0),
            &Point3::new(offset, 0.0, -1.0),
            &Vector3::y(),
        )
    }

    /// Combined view-projection for one eye pass.
    pub fn view_proj(&self, eye: Eye) -> Matrix4<f32> {
        self.projection() * self.view(eye)
    }
}
