// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Procedural construction of Sloan optotype meshes.
//!
//! Letters are built from straight bars and ring sectors on the classic
//! 5-by-5 stroke grid: the letter spans the unit frame [-1, 1] and every
//! stroke is one fifth of the letter height wide. Construction is fully
//! deterministic, so the same letter always yields the same mesh.

use crate::visual::model::Vertex;

/// The ten Sloan letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Optotype {
    C,
    D,
    H,
    K,
    N,
    O,
    R,
    S,
    V,
    Z,
}

impl Optotype {
    pub const ALL: [Optotype; 10] = [
        Optotype::C,
        Optotype::D,
        Optotype::H,
        Optotype::K,
        Optotype::N,
        Optotype::O,
        Optotype::R,
        Optotype::S,
        Optotype::V,
        Optotype::Z,
    ];
}

/// Stroke width on the 5x5 grid: a fifth of the 2.0-unit letter height.
const STROKE: f32 = 0.4;
const HALF: f32 = STROKE / 2.0;
/// Arc tessellation density for ring strokes.
const ARC_SEGMENTS: u32 = 64;

struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// A straight stroke from (x0, y0) to (x1, y1) with the given half
    /// width, as a single quad. Corners of diagonal strokes are clipped to
    /// the unit frame, giving the flat stroke ends Sloan letters have.
    fn bar(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, half_width: f32) {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let len = (dx * dx + dy * dy).sqrt();
        // perpendicular offset
        let px = -dy / len * half_width;
        let py = dx / len * half_width;
        let base = self.vertices.len() as u32;
        let mut push = |x: f32, y: f32| {
            self.vertices
                .push(Vertex::from_position(x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0), 0.0));
        };
        push(x0 + px, y0 + py);
        push(x0 - px, y0 - py);
        push(x1 - px, y1 - py);
        push(x1 + px, y1 + py);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    /// A curved stroke between `angle0` and `angle1` (degrees, counter-
    /// clockwise from the positive x axis) bounded by the inner and outer
    /// radii around (cx, cy).
    fn ring_sector(&mut self, cx: f32, cy: f32, r_in: f32, r_out: f32, angle0: f32, angle1: f32) {
        let a0 = angle0.to_radians();
        let a1 = angle1.to_radians();
        let base = self.vertices.len() as u32;
        for i in 0..=ARC_SEGMENTS {
            let t = i as f32 / ARC_SEGMENTS as f32;
            let a = a0 + t * (a1 - a0);
            let (sin, cos) = a.sin_cos();
            self.vertices
                .push(Vertex::from_position(cx + r_in * cos, cy + r_in * sin, 0.0));
            self.vertices
                .push(Vertex::from_position(cx + r_out * cos, cy + r_out * sin, 0.0));
        }
        for i in 0..ARC_SEGMENTS {
            let inner = base + 2 * i;
            let outer = inner + 1;
            self.indices
                .extend_from_slice(&[inner, outer, outer + 2, outer + 2, inner + 2, inner]);
        }
    }

    fn finish(self) -> (Vec<Vertex>, Vec<u32>) {
        (self.vertices, self.indices)
    }
}

/// Builds the raw (single-sided) mesh for a Sloan letter.
pub(crate) fn mesh(letter: Optotype) -> (Vec<Vertex>, Vec<u32>) {
    let mut b = MeshBuilder::new();
    let r_out = 1.0;
    let r_in = 1.0 - STROKE;
    match letter {
        Optotype::C => {
            // like O, with a gap opening to the right
            b.ring_sector(0.0, 0.0, r_in, r_out, 30.0, 330.0);
        }
        Optotype::D => {
            b.bar(-1.0 + HALF, -1.0, -1.0 + HALF, 1.0, HALF);
            b.bar(-1.0, 1.0 - HALF, 0.0, 1.0 - HALF, HALF);
            b.bar(-1.0, -1.0 + HALF, 0.0, -1.0 + HALF, HALF);
            b.ring_sector(0.0, 0.0, r_in, r_out, -90.0, 90.0);
        }
        Optotype::H => {
            b.bar(-1.0 + HALF, -1.0, -1.0 + HALF, 1.0, HALF);
            b.bar(1.0 - HALF, -1.0, 1.0 - HALF, 1.0, HALF);
            b.bar(-1.0, 0.0, 1.0, 0.0, HALF);
        }
        Optotype::K => {
            b.bar(-1.0 + HALF, -1.0, -1.0 + HALF, 1.0, HALF);
            b.bar(-1.0 + STROKE, 0.0, 1.0, 1.0, HALF);
            b.bar(-1.0 + STROKE, 0.0, 1.0, -1.0, HALF);
        }
        Optotype::N => {
            b.bar(-1.0 + HALF, -1.0, -1.0 + HALF, 1.0, HALF);
            b.bar(1.0 - HALF, -1.0, 1.0 - HALF, 1.0, HALF);
            b.bar(-1.0 + HALF, 1.0, 1.0 - HALF, -1.0, HALF);
        }
        Optotype::O => {
            b.ring_sector(0.0, 0.0, r_in, r_out, 0.0, 360.0);
        }
        Optotype::R => {
            b.bar(-1.0 + HALF, -1.0, -1.0 + HALF, 1.0, HALF);
            b.bar(-1.0, 1.0 - HALF, 0.5, 1.0 - HALF, HALF);
            b.bar(-1.0, 0.0, 0.5, 0.0, HALF);
            // bowl of the R: right half-ring between the top and middle bars
            b.ring_sector(0.5, 0.5, 0.5 - STROKE, 0.5, -90.0, 90.0);
            // diagonal leg
            b.bar(0.0, 0.0, 1.0, -1.0, HALF);
        }
        Optotype::S => {
            b.bar(-1.0, 1.0 - HALF, 1.0, 1.0 - HALF, HALF);
            b.bar(-1.0 + HALF, 0.0, -1.0 + HALF, 1.0, HALF);
            b.bar(-1.0, 0.0, 1.0, 0.0, HALF);
            b.bar(1.0 - HALF, -1.0, 1.0 - HALF, 0.0, HALF);
            b.bar(-1.0, -1.0 + HALF, 1.0, -1.0 + HALF, HALF);
        }
        Optotype::V => {
            b.bar(-1.0 + HALF, 1.0, 0.0, -1.0 + HALF, HALF);
            b.bar(0.0, -1.0 + HALF, 1.0 - HALF, 1.0, HALF);
        }
        Optotype::Z => {
            b.bar(-1.0, 1.0 - HALF, 1.0, 1.0 - HALF, HALF);
            b.bar(1.0 - HALF, 1.0 - STROKE, -1.0 + HALF, -1.0 + STROKE, HALF);
            b.bar(-1.0, -1.0 + HALF, 1.0, -1.0 + HALF, HALF);
        }
    }
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_letter_produces_triangles() {
        for letter in Optotype::ALL {
            let (vertices, indices) = mesh(letter);
            assert!(!vertices.is_empty(), "{letter:?} has no vertices");
            assert_eq!(indices.len() % 3, 0, "{letter:?} has stray indices");
            for &i in &indices {
                assert!((i as usize) < vertices.len());
            }
        }
    }

    #[test]
    fn letters_fit_the_unit_frame() {
        for letter in Optotype::ALL {
            let (vertices, _) = mesh(letter);
            for v in &vertices {
                assert!(
                    v.position[0].abs() <= 1.0 + 1e-4 && v.position[1].abs() <= 1.0 + 1e-4,
                    "{letter:?} vertex {:?} escapes the unit frame",
                    v.position
                );
            }
        }
    }
}
