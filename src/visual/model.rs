// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::errors::{EngineError, Result};
use crate::visual::optotype::{self, Optotype};

/// Number of perimeter vertices used for circles and annuli. Must be even so
/// the hollow wrap-around indices stay pairwise aligned.
const CIRCLE_SIDES: u32 = 500;

/// A mesh vertex: 3D position plus 2D texture coordinate. Immutable once
/// generated.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// A vertex with texture coordinates derived from its position in the
    /// unit local frame: x in [-1, 1] maps to u in [0, 1], y flipped.
    pub fn from_position(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            uv: [x / 2.0 + 0.5, -y / 2.0 + 0.5],
        }
    }

    pub fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Shape kinds the model generator understands. Hollow variants produce a
/// genuine ring topology (inner and outer boundary, no interior fill).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Triangle,
    Square,
    Cross,
    Maltese,
    Circle,
    Polygon { sides: u32 },
    HollowTriangle { ratio: f32 },
    HollowSquare { ratio: f32 },
    HollowPolygon { sides: u32, ratio: f32 },
    Annulus { ratio: f32 },
    Optotype(Optotype),
    /// Laid-out glyph quads, built by [`crate::visual::text`].
    Text,
    /// Externally supplied mesh, accepted verbatim.
    External,
}

/// Immutable triangulated geometry, centered at the origin in a unit-sized
/// local frame so that item scaling alone controls on-screen size.
/// Re-parametrization means constructing a new `Model`.
#[derive(Debug, Clone)]
pub struct Model {
    shape: Shape,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Model {
    /// Generates the mesh for a shape kind.
    pub fn new(shape: Shape) -> Result<Model> {
        let (vertices, indices) = match shape {
            Shape::Triangle => triangle(),
            Shape::Square => square(),
            Shape::Cross => cross(),
            Shape::Maltese => maltese(),
            Shape::Circle => polygon(CIRCLE_SIDES),
            Shape::Polygon { sides } => {
                check_sides(sides)?;
                polygon(sides)
            }
            Shape::HollowTriangle { ratio } => {
                check_ratio(ratio)?;
                hollow_triangle(ratio)
            }
            Shape::HollowSquare { ratio } => {
                check_ratio(ratio)?;
                hollow_square(ratio)
            }
            Shape::HollowPolygon { sides, ratio } => {
                check_sides(sides)?;
                check_ratio(ratio)?;
                hollow_polygon(sides, ratio)
            }
            Shape::Annulus { ratio } => {
                check_ratio(ratio)?;
                hollow_polygon(CIRCLE_SIDES, ratio)
            }
            Shape::Optotype(letter) => optotype::mesh(letter),
            Shape::Text | Shape::External => {
                return Err(EngineError::invalid(
                    "Text and External models are built from their own constructors",
                ))
            }
        };
        Ok(Model {
            shape,
            vertices,
            indices: expand_indices(indices),
        })
    }

    /// Accepts an externally supplied mesh. Indices are validated for range
    /// only; winding and topology are the caller's responsibility.
    pub fn from_mesh(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Model> {
        let n = vertices.len() as u32;
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(EngineError::invalid(format!(
                "mesh index {bad} out of range for {n} vertices"
            )));
        }
        Ok(Model {
            shape: Shape::External,
            vertices,
            indices,
        })
    }

    /// Internal constructor for laid-out text meshes.
    pub(crate) fn from_text_quads(vertices: Vec<Vertex>, indices: Vec<u32>) -> Model {
        Model {
            shape: Shape::Text,
            vertices,
            indices,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn check_sides(sides: u32) -> Result<()> {
    if sides < 3 {
        return Err(EngineError::invalid(format!(
            "polygon needs at least 3 sides, got {sides}"
        )));
    }
    Ok(())
}

fn check_ratio(ratio: f32) -> Result<()> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(EngineError::invalid(format!(
            "hollow ratio must be in (0, 1), got {ratio}"
        )));
    }
    Ok(())
}

/// Duplicates the index list in reverse so the back side of the flat model
/// is also rendered.
fn expand_indices(indices: Vec<u32>) -> Vec<u32> {
    let mut out = indices;
    let front = out.clone();
    out.extend(front.iter().rev());
    out
}

type Geometry = (Vec<Vertex>, Vec<u32>);

fn triangle() -> Geometry {
    let vertices = vec![
        Vertex::from_position(-1.0, -1.0, 0.0),
        Vertex::from_position(1.0, -1.0, 0.0),
        Vertex::from_position(0.0, 1.0, 0.0),
    ];
    (vertices, vec![0, 1, 2])
}

fn square() -> Geometry {
    let vertices = vec![
        Vertex::from_position(-1.0, -1.0, 0.0),
        Vertex::from_position(1.0, -1.0, 0.0),
        Vertex::from_position(1.0, 1.0, 0.0),
        Vertex::from_position(-1.0, 1.0, 0.0),
    ];
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

fn cross() -> Geometry {
    // two overlapping bars, arm half-width 0.1
    let vertices = vec![
        Vertex::from_position(-1.0, 0.1, 0.0),
        Vertex::from_position(1.0, 0.1, 0.0),
        Vertex::from_position(-1.0, -0.1, 0.0),
        Vertex::from_position(1.0, -0.1, 0.0),
        Vertex::from_position(-0.1, 1.0, 0.0),
        Vertex::from_position(0.1, 1.0, 0.0),
        Vertex::from_position(-0.1, -1.0, 0.0),
        Vertex::from_position(0.1, -1.0, 0.0),
    ];
    let indices = vec![0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7];
    (vertices, indices)
}

fn maltese() -> Geometry {
    // four wedges meeting near the center
    let vertices = vec![
        Vertex::from_position(-1.0, 0.2, 0.0),
        Vertex::from_position(0.02, 0.0, 0.0),
        Vertex::from_position(-1.0, -0.2, 0.0),
        Vertex::from_position(1.0, 0.2, 0.0),
        Vertex::from_position(1.0, -0.2, 0.0),
        Vertex::from_position(-0.02, 0.0, 0.0),
        Vertex::from_position(-0.2, 1.0, 0.0),
        Vertex::from_position(0.2, 1.0, 0.0),
        Vertex::from_position(0.0, -0.02, 0.0),
        Vertex::from_position(-0.2, -1.0, 0.0),
        Vertex::from_position(0.0, 0.02, 0.0),
        Vertex::from_position(0.2, -1.0, 0.0),
    ];
    let indices = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    (vertices, indices)
}

/// Regular n-gon as a fan around a center vertex.
fn polygon(sides: u32) -> Geometry {
    let mut vertices = Vec::with_capacity(sides as usize + 1);
    let mut indices = Vec::with_capacity(3 * sides as usize);
    vertices.push(Vertex::from_position(0.0, 0.0, 0.0));
    for i in 0..sides {
        let theta = 2.0 * std::f32::consts::PI * i as f32 / sides as f32;
        vertices.push(Vertex::from_position(theta.cos(), theta.sin(), 0.0));
        indices.extend_from_slice(&[0, i + 1, (i + 1) % sides + 1]);
    }
    (vertices, indices)
}

fn hollow_triangle(ratio: f32) -> Geometry {
    let vertices = vec![
        Vertex::from_position(-ratio, -ratio, 0.0),
        Vertex::from_position(ratio, -ratio, 0.0),
        Vertex::from_position(0.0, ratio, 0.0),
        Vertex::from_position(-1.0, -1.0, 0.0),
        Vertex::from_position(1.0, -1.0, 0.0),
        Vertex::from_position(0.0, 1.0, 0.0),
    ];
    let indices = vec![
        0, 3, 4, 0, 4, 1, //
        1, 4, 5, 1, 5, 2, //
        2, 5, 3, 2, 3, 0,
    ];
    (vertices, indices)
}

fn hollow_square(ratio: f32) -> Geometry {
    let vertices = vec![
        Vertex::from_position(-ratio, -ratio, 0.0),
        Vertex::from_position(ratio, -ratio, 0.0),
        Vertex::from_position(ratio, ratio, 0.0),
        Vertex::from_position(-ratio, ratio, 0.0),
        Vertex::from_position(-1.0, -1.0, 0.0),
        Vertex::from_position(1.0, -1.0, 0.0),
        Vertex::from_position(1.0, 1.0, 0.0),
        Vertex::from_position(-1.0, 1.0, 0.0),
    ];
    let indices = vec![
        0, 4, 5, 0, 5, 1, //
        1, 5, 6, 1, 6, 2, //
        2, 6, 7, 2, 7, 3, //
        3, 7, 4, 3, 4, 0,
    ];
    (vertices, indices)
}

/// Ring between an inner (scaled by `ratio`) and outer n-gon boundary.
fn hollow_polygon(sides: u32, ratio: f32) -> Geometry {
    let mut vertices = Vec::with_capacity(2 * sides as usize);
    let mut indices = Vec::with_capacity(6 * sides as usize);
    for i in 0..sides {
        let theta = 2.0 * std::f32::consts::PI * i as f32 / sides as f32;
        vertices.push(Vertex::from_position(
            ratio * theta.cos(),
            ratio * theta.sin(),
            0.0,
        ));
        vertices.push(Vertex::from_position(theta.cos(), theta.sin(), 0.0));
    }
    for i in 0..sides {
        let inner = 2 * i;
        let outer = 2 * i + 1;
        let next_inner = 2 * ((i + 1) % sides);
        let next_outer = next_inner + 1;
        indices.extend_from_slice(&[inner, outer, next_outer]);
        indices.extend_from_slice(&[next_outer, next_inner, inner]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_bounds(model: &Model) {
        let n = model.vertices().len() as u32;
        assert!(n > 0);
        assert!(model.indices().len() % 3 == 0);
        for &i in model.indices() {
            assert!(i < n, "index {i} out of bounds for {n} vertices");
        }
    }

    #[test]
    fn all_basic_shapes_have_valid_indices() {
        let shapes = [
            Shape::Triangle,
            Shape::Square,
            Shape::Cross,
            Shape::Maltese,
            Shape::Circle,
            Shape::Polygon { sides: 3 },
            Shape::Polygon { sides: 7 },
            Shape::Polygon { sides: 64 },
            Shape::HollowTriangle { ratio: 0.5 },
            Shape::HollowSquare { ratio: 0.25 },
            Shape::HollowPolygon { sides: 3, ratio: 0.5 },
            Shape::HollowPolygon { sides: 12, ratio: 0.9 },
            Shape::Annulus { ratio: 0.5 },
        ];
        for shape in shapes {
            let model = Model::new(shape).unwrap();
            assert_indices_in_bounds(&model);
        }
    }

    #[test]
    fn all_optotypes_have_valid_indices() {
        for letter in Optotype::ALL {
            let model = Model::new(Shape::Optotype(letter)).unwrap();
            assert_indices_in_bounds(&model);
            assert!(!model.is_empty());
        }
    }

    #[test]
    fn optotype_generation_is_stable() {
        let a = Model::new(Shape::Optotype(Optotype::K)).unwrap();
        let b = Model::new(Shape::Optotype(Optotype::K)).unwrap();
        assert_eq!(a.vertices(), b.vertices());
        assert_eq!(a.indices(), b.indices());
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        assert!(matches!(
            Model::new(Shape::Polygon { sides: 2 }),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!(matches!(
            Model::new(Shape::Annulus { ratio: 1.5 }),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!(matches!(
            Model::new(Shape::HollowSquare { ratio: 0.0 }),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn geometry_stays_in_unit_frame() {
        for shape in [Shape::Circle, Shape::Square, Shape::Cross, Shape::Maltese] {
            let model = Model::new(shape).unwrap();
            for v in model.vertices() {
                assert!(v.position[0].abs() <= 1.0 + 1e-6);
                assert!(v.position[1].abs() <= 1.0 + 1e-6);
            }
        }
    }

    #[test]
    fn external_mesh_validates_index_range() {
        let vertices = vec![
            Vertex::from_position(0.0, 0.0, 0.0),
            Vertex::from_position(1.0, 0.0, 0.0),
            Vertex::from_position(0.0, 1.0, 0.0),
        ];
        assert!(Model::from_mesh(vertices.clone(), vec![0, 1, 2]).is_ok());
        assert!(matches!(
            Model::from_mesh(vertices, vec![0, 1, 3]),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn two_sided_expansion_doubles_triangles() {
        let model = Model::new(Shape::Triangle).unwrap();
        assert_eq!(model.indices(), &[0, 1, 2, 2, 1, 0]);
    }
}
