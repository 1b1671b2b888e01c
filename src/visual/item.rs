// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A renderable item: one model, one texture and the mutable per-instance
//! modulation state the render loop reads every frame.
//!
//! The public API takes angles in degrees of visual angle and stores radians.
//! Setters only record state; nothing here touches the GPU.

use nalgebra::{Matrix4, Unit, Vector3};
use std::cell::RefCell;
use std::f32::consts::TAU;
use std::rc::Rc;

use crate::errors::{EngineError, Result};
use crate::visual::model::Model;
use crate::visual::observer::ViewMode;
use crate::visual::texture::Texture;

/// Shared handle experiment logic keeps while the engine renders the item.
pub type ItemHandle = Rc<RefCell<Item>>;

/// Which eye(s) an item is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
    Both,
    None,
}

/// Spatial windowing applied to the stimulus edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeType {
    Square,
    Circle,
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Envelope {
    kind: Option<EnvelopeType>,
    /// Semi-axes, stored as half visual angles in radians.
    x: f32,
    y: f32,
    /// Orientation in radians.
    angle: f32,
}

impl Envelope {
    const IDENTITY: Envelope = Envelope {
        kind: None,
        x: 0.0,
        y: 0.0,
        angle: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Defocus {
    /// Blur extents as half visual angles in radians.
    x: f32,
    y: f32,
    angle: f32,
    /// Temporal modulation, Hz. Zero means constant blur.
    frequency: f32,
}

impl Defocus {
    const IDENTITY: Defocus = Defocus {
        x: 0.0,
        y: 0.0,
        angle: 0.0,
        frequency: 0.0,
    };

    fn is_identity(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    All,
    Slot(u32),
    Hidden,
}

/// GPU-ready snapshot of one item for one eye pass, laid out to match the
/// uniform block in `item.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ItemUniform {
    pub mvp: [[f32; 4]; 4],
    /// pivot u, pivot v, cos, sin of the texture rotation
    pub tex_rot: [f32; 4],
    /// phase u (cycles), cycles across u, phase v, cycles across v
    pub spatial: [f32; 4],
    pub rgba0: [f32; 4],
    pub rgba1: [f32; 4],
    /// per-channel contrast, already evaluated at the frame time
    pub contrast: [f32; 4],
    /// kind (0 none, 1 square, 2 circle, 3 gaussian), semi-x, semi-y (mm),
    /// angle (radians)
    pub envelope: [f32; 4],
    /// blur sigma u, sigma v (texture units), angle, unused
    pub defocus: [f32; 4],
    /// half width (mm), half height (mm), is_text flag, unused
    pub extent: [f32; 4],
}

pub struct Item {
    model: Rc<Model>,
    texture: Rc<RefCell<Texture>>,
    eye: Eye,
    /// Eccentricity, radians of visual angle.
    position: (f32, f32),
    /// Distance from the observer along the line of sight, mm.
    depth: f32,
    /// Half visual angles, radians.
    size: (f32, f32),
    rotation: f32,
    rotation_axis: Unit<Vector3<f32>>,
    tex_rotation: f32,
    tex_pivot: (f32, f32),
    /// Spatial phase (radians) and frequency (cycles per degree) per axis:
    /// [phase_x, freq_x, phase_y, freq_y]. A negative frequency means one
    /// cycle spanning the item.
    frequency: [f32; 4],
    contrast: [f32; 4],
    contrast_frequency: [f32; 4],
    contrast_phase: [f32; 4],
    envelope: Envelope,
    defocus: Defocus,
    visibility: Visibility,
}

impl Item {
    /// Couples a model with a texture at the default depth, visible to both
    /// eyes, full contrast, one texture cycle spanning the item.
    pub fn new(model: Rc<Model>, texture: Rc<RefCell<Texture>>) -> ItemHandle {
        Rc::new(RefCell::new(Item {
            model,
            texture,
            eye: Eye::Both,
            position: (0.0, 0.0),
            depth: crate::visual::observer::DEFAULT_DISTANCE_MM,
            size: (1f32.to_radians() / 2.0, 1f32.to_radians() / 2.0),
            rotation: 0.0,
            rotation_axis: Vector3::z_axis(),
            tex_rotation: 0.0,
            tex_pivot: (0.5, 0.5),
            frequency: [0.0, -1.0, 0.0, -1.0],
            contrast: [1.0; 4],
            contrast_frequency: [0.0; 4],
            contrast_phase: [0.0; 4],
            envelope: Envelope::IDENTITY,
            defocus: Defocus::IDENTITY,
            visibility: Visibility::All,
        }))
    }

    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    pub fn texture(&self) -> &Rc<RefCell<Texture>> {
        &self.texture
    }

    /// Swaps the geometry. The old model stays alive for other items
    /// referencing it.
    pub fn set_model(&mut self, model: Rc<Model>) {
        self.model = model;
    }

    pub fn set_texture(&mut self, texture: Rc<RefCell<Texture>>) {
        self.texture = texture;
    }

    pub fn eye(&self) -> Eye {
        self.eye
    }

    pub fn set_eye(&mut self, eye: Eye) {
        self.eye = eye;
    }

    /// Eccentricity in degrees of visual angle.
    pub fn position(&mut self, x: f32, y: f32) {
        self.position = (x.to_radians(), y.to_radians());
    }

    /// Distance from the observer in millimeters.
    pub fn depth(&mut self, depth: f32) -> Result<()> {
        if !(depth > 0.0 && depth.is_finite()) {
            return Err(EngineError::invalid(format!(
                "item depth must be positive and finite, got {depth}"
            )));
        }
        self.depth = depth;
        Ok(())
    }

    /// Angular size in degrees, uniform on both axes.
    pub fn size(&mut self, diameter: f32) -> Result<()> {
        self.size2(diameter, diameter)
    }

    /// Angular size in degrees per axis.
    pub fn size2(&mut self, x: f32, y: f32) -> Result<()> {
        if !(x >= 0.0 && y >= 0.0 && x < 180.0 && y < 180.0) {
            return Err(EngineError::invalid(format!(
                "item size must be in [0, 180) degrees, got {x} x {y}"
            )));
        }
        self.size = ((x / 2.0).to_radians(), (y / 2.0).to_radians());
        Ok(())
    }

    /// Rotation about the line of sight, degrees.
    pub fn rotation(&mut self, angle: f32) {
        self.rotation_on_axis(angle, Vector3::z_axis());
    }

    pub fn rotation_on_axis(&mut self, angle: f32, axis: Unit<Vector3<f32>>) {
        self.rotation = angle.to_radians();
        self.rotation_axis = axis;
    }

    /// Texture rotation about the texture center, degrees.
    pub fn texture_rotation(&mut self, angle: f32) {
        self.texture_rotation_about(angle, (0.5, 0.5));
    }

    /// Texture rotation about an arbitrary pivot in texture coordinates.
    pub fn texture_rotation_about(&mut self, angle: f32, pivot: (f32, f32)) {
        self.tex_rotation = angle.to_radians();
        self.tex_pivot = pivot;
    }

    /// Spatial phase (degrees) and frequency (cycles per degree), both axes.
    pub fn frequency(&mut self, phase: f32, freq: f32) -> Result<()> {
        self.frequency2(phase, freq, phase, freq)
    }

    /// Per-axis spatial phase and frequency. A negative frequency keeps the
    /// default of one cycle spanning the item on that axis.
    pub fn frequency2(&mut self, x_phase: f32, x_freq: f32, y_phase: f32, y_freq: f32) -> Result<()> {
        if x_freq == 0.0 || y_freq == 0.0 {
            return Err(EngineError::invalid(
                "spatial frequency must be nonzero; negative spans the item",
            ));
        }
        self.frequency = [
            x_phase.to_radians(),
            x_freq,
            y_phase.to_radians(),
            y_freq,
        ];
        Ok(())
    }

    /// Contrast on all four channels, clamped to [0, 1].
    pub fn contrast(&mut self, c: f32) {
        self.contrast4(c, c, c, c);
    }

    /// Per-channel contrast, clamped to [0, 1].
    pub fn contrast4(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.contrast = [
            r.clamp(0.0, 1.0),
            g.clamp(0.0, 1.0),
            b.clamp(0.0, 1.0),
            a.clamp(0.0, 1.0),
        ];
    }

    /// Temporal contrast modulation on all channels: frequency in Hz, phase
    /// in degrees. The effective contrast is the set contrast scaled by a
    /// raised cosine, so it flickers between full and zero.
    pub fn temporal_contrast(&mut self, frequency: f32, phase: f32) -> Result<()> {
        self.temporal_contrast4([frequency; 4], [phase; 4])
    }

    /// Independent temporal modulation per channel.
    pub fn temporal_contrast4(&mut self, frequency: [f32; 4], phase: [f32; 4]) -> Result<()> {
        if frequency.iter().any(|f| *f < 0.0 || !f.is_finite()) {
            return Err(EngineError::invalid(format!(
                "temporal frequency must be finite and nonnegative, got {frequency:?}"
            )));
        }
        self.contrast_frequency = frequency;
        self.contrast_phase = phase.map(f32::to_radians);
        Ok(())
    }

    /// Spatial envelope with semi-axes in degrees and orientation in
    /// degrees.
    pub fn envelope(&mut self, kind: EnvelopeType, x: f32, y: f32, angle: f32) -> Result<()> {
        if !(x > 0.0 && y > 0.0) {
            return Err(EngineError::invalid(format!(
                "envelope semi-axes must be positive, got {x} x {y}"
            )));
        }
        self.envelope = Envelope {
            kind: Some(kind),
            x: (x / 2.0).to_radians(),
            y: (y / 2.0).to_radians(),
            angle: angle.to_radians(),
        };
        Ok(())
    }

    /// Resets the envelope to pass-through.
    pub fn remove_envelope(&mut self) {
        self.envelope = Envelope::IDENTITY;
    }

    /// Optical blur with extents in degrees, orientation in degrees.
    pub fn defocus(&mut self, x: f32, y: f32, angle: f32) -> Result<()> {
        if !(x >= 0.0 && y >= 0.0) {
            return Err(EngineError::invalid(format!(
                "defocus extents must be nonnegative, got {x} x {y}"
            )));
        }
        self.defocus.x = (x / 2.0).to_radians();
        self.defocus.y = (y / 2.0).to_radians();
        self.defocus.angle = angle.to_radians();
        Ok(())
    }

    /// Temporal defocus modulation in Hz; the blur extent oscillates
    /// between full and zero.
    pub fn defocus_frequency(&mut self, frequency: f32) -> Result<()> {
        if frequency < 0.0 || !frequency.is_finite() {
            return Err(EngineError::invalid(format!(
                "defocus frequency must be finite and nonnegative, got {frequency}"
            )));
        }
        self.defocus.frequency = frequency;
        Ok(())
    }

    /// Resets the defocus to no blur.
    pub fn remove_defocus(&mut self) {
        self.defocus = Defocus::IDENTITY;
    }

    /// Shows the item on every frame slot.
    pub fn show_all(&mut self) {
        self.visibility = Visibility::All;
    }

    /// Shows the item only on the named frame slot, for temporal
    /// interleaving of alternatives.
    pub fn show(&mut self, slot: u32) {
        self.visibility = Visibility::Slot(slot);
    }

    pub fn hide(&mut self) {
        self.visibility = Visibility::Hidden;
    }

    /// Whether this item is drawn during the given eye pass and frame slot.
    /// In mono mode every eye setting except `None` renders.
    pub fn renders_in(&self, pass_eye: Eye, slot: u32, mode: ViewMode) -> bool {
        let slot_ok = match self.visibility {
            Visibility::All => true,
            Visibility::Slot(s) => s == slot,
            Visibility::Hidden => false,
        };
        let eye_ok = match (mode, self.eye) {
            (_, Eye::None) => false,
            (ViewMode::Mono, _) => true,
            (ViewMode::Stereo, Eye::Both) => true,
            (ViewMode::Stereo, eye) => eye == pass_eye,
        };
        slot_ok && eye_ok
    }

    /// Model matrix: eccentricity and depth place the item, rotation spins
    /// it, half extents at its depth scale the unit frame.
    fn model_matrix(&self) -> Matrix4<f32> {
        let x = self.depth * self.position.0.tan();
        let y = self.depth * self.position.1.tan();
        let wx = self.depth * self.size.0.tan();
        let wy = self.depth * self.size.1.tan();
        Matrix4::new_translation(&Vector3::new(x, y, -self.depth))
            * Matrix4::from_axis_angle(&self.rotation_axis, self.rotation)
            * Matrix4::new_nonuniform_scaling(&Vector3::new(wx, wy, 1.0))
    }

    /// Evaluates the full GPU snapshot at elapsed time `t` (seconds) under
    /// the given view-projection matrix. All items of a frame share one `t`
    /// so their temporal phases stay consistent.
    pub(crate) fn material(&self, t: f64, view_proj: &Matrix4<f32>) -> ItemUniform {
        let texture = self.texture.borrow();
        let mvp = view_proj * self.model_matrix();

        let mut contrast = [0.0f32; 4];
        for ch in 0..4 {
            contrast[ch] = self.contrast[ch]
                * raised_cosine(self.contrast_frequency[ch], self.contrast_phase[ch], t);
        }

        // cycles across the item: frequency is per degree of visual angle,
        // the item spans 2 * half-angle degrees
        let spatial = {
            let span_x = 2.0 * self.size.0.to_degrees();
            let span_y = 2.0 * self.size.1.to_degrees();
            let cycles = |freq: f32, span: f32| if freq < 0.0 { 1.0 } else { freq * span };
            [
                self.frequency[0] / TAU,
                cycles(self.frequency[1], span_x),
                self.frequency[2] / TAU,
                cycles(self.frequency[3], span_y),
            ]
        };

        let envelope = [
            match self.envelope.kind {
                None => 0.0,
                Some(EnvelopeType::Square) => 1.0,
                Some(EnvelopeType::Circle) => 2.0,
                Some(EnvelopeType::Gaussian) => 3.0,
            },
            self.depth * self.envelope.x.tan(),
            self.depth * self.envelope.y.tan(),
            self.envelope.angle,
        ];

        let (wx, wy) = (self.depth * self.size.0.tan(), self.depth * self.size.1.tan());
        let defocus = if self.defocus.is_identity() {
            [0.0; 4]
        } else {
            let gain = raised_cosine(self.defocus.frequency, 0.0, t);
            // blur extent in texture units of this item
            let sigma_u = gain * self.defocus.x.tan() * self.depth / (2.0 * wx.max(f32::EPSILON));
            let sigma_v = gain * self.defocus.y.tan() * self.depth / (2.0 * wy.max(f32::EPSILON));
            [sigma_u, sigma_v, self.defocus.angle, 0.0]
        };

        let is_text = matches!(
            texture.kind(),
            crate::visual::texture::TextureKind::TextAtlas
        );

        ItemUniform {
            mvp: mvp.into(),
            tex_rot: [
                self.tex_pivot.0,
                self.tex_pivot.1,
                self.tex_rotation.cos(),
                self.tex_rotation.sin(),
            ],
            spatial,
            rgba0: texture.rgba0().to_array(),
            rgba1: texture.rgba1().to_array(),
            contrast,
            envelope,
            defocus,
            extent: [wx, wy, if is_text { 1.0 } else { 0.0 }, 0.0],
        }
    }
}

/// Raised-cosine gain in [0, 1]: 1 at phase 0, flickering at `frequency`
/// Hz. Zero frequency means a constant gain of 1.
fn raised_cosine(frequency: f32, phase: f32, t: f64) -> f32 {
    if frequency == 0.0 {
        1.0
    } else {
        0.5 + 0.5 * (TAU * frequency * t as f32 + phase).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::color::Color;
    use crate::visual::model::{Model, Shape};
    use crate::visual::texture::TextureKind;
    use approx::assert_abs_diff_eq;

    fn test_item() -> ItemHandle {
        let model = Rc::new(Model::new(Shape::Square).unwrap());
        let texture = Rc::new(RefCell::new(
            Texture::new(TextureKind::Sine, Color::BLACK, Color::WHITE).unwrap(),
        ));
        Item::new(model, texture)
    }

    #[test]
    fn eye_filtering_in_stereo_and_mono() {
        let item = test_item();
        let mut item = item.borrow_mut();

        item.set_eye(Eye::Left);
        assert!(item.renders_in(Eye::Left, 0, ViewMode::Stereo));
        assert!(!item.renders_in(Eye::Right, 0, ViewMode::Stereo));
        assert!(item.renders_in(Eye::Right, 0, ViewMode::Mono));

        item.set_eye(Eye::Both);
        assert!(item.renders_in(Eye::Left, 0, ViewMode::Stereo));
        assert!(item.renders_in(Eye::Right, 0, ViewMode::Stereo));

        item.set_eye(Eye::None);
        assert!(!item.renders_in(Eye::Left, 0, ViewMode::Mono));
        assert!(!item.renders_in(Eye::Left, 0, ViewMode::Stereo));
    }

    #[test]
    fn frame_slot_gates_visibility() {
        let item = test_item();
        let mut item = item.borrow_mut();
        item.show(2);
        assert!(!item.renders_in(Eye::Both, 1, ViewMode::Mono));
        assert!(item.renders_in(Eye::Both, 2, ViewMode::Mono));
        assert!(!item.renders_in(Eye::Both, 3, ViewMode::Mono));
        item.show_all();
        assert!(item.renders_in(Eye::Both, 3, ViewMode::Mono));
        item.hide();
        assert!(!item.renders_in(Eye::Both, 2, ViewMode::Mono));
    }

    #[test]
    fn contrast_is_clamped_per_channel() {
        let item = test_item();
        let mut item = item.borrow_mut();
        item.contrast4(1.5, -0.2, 0.5, 2.0);
        let u = item.material(0.0, &Matrix4::identity());
        assert_eq!(u.contrast, [1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn temporal_contrast_follows_a_raised_cosine() {
        let item = test_item();
        let mut item = item.borrow_mut();
        item.contrast(0.8);
        item.temporal_contrast(1.0, 0.0).unwrap();
        let view = Matrix4::identity();
        assert_abs_diff_eq!(item.material(0.0, &view).contrast[0], 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(item.material(0.5, &view).contrast[0], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(item.material(1.0, &view).contrast[0], 0.8, epsilon = 1e-5);
    }

    #[test]
    fn removing_modulations_resets_identity() {
        let item = test_item();
        let mut item = item.borrow_mut();
        item.envelope(EnvelopeType::Gaussian, 2.0, 2.0, 45.0).unwrap();
        item.defocus(1.0, 1.0, 0.0).unwrap();
        item.remove_envelope();
        item.remove_defocus();
        let u = item.material(0.0, &Matrix4::identity());
        assert_eq!(u.envelope[0], 0.0);
        assert_eq!(u.defocus, [0.0; 4]);
    }

    #[test]
    fn setter_validation_rejects_bad_inputs() {
        let item = test_item();
        let mut item = item.borrow_mut();
        assert!(item.size2(-1.0, 1.0).is_err());
        assert!(item.depth(0.0).is_err());
        assert!(item.frequency(0.0, 0.0).is_err());
        assert!(item.envelope(EnvelopeType::Circle, 0.0, 1.0, 0.0).is_err());
        assert!(item.temporal_contrast(-1.0, 0.0).is_err());
    }

    #[test]
    fn default_spatial_frequency_spans_the_item() {
        let item = test_item();
        let u = item.borrow().material(0.0, &Matrix4::identity());
        assert_eq!(u.spatial[1], 1.0);
        assert_eq!(u.spatial[3], 1.0);
    }
}
