// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Text layout: rasterizes a string into a glyph atlas texture plus a mesh
//! of per-glyph quads.
//!
//! Unlike the parametrized textures, a text item bakes its color at build
//! time. Changing the text or its color means laying it out again.

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::errors::{EngineError, Result};
use crate::visual::color::Color;
use crate::visual::model::{Model, Vertex};
use crate::visual::texture::Texture;

/// Pixel size glyphs are rasterized at. Item scaling does the rest, so this
/// only bounds the sharpest size text stays crisp at.
const RASTER_PX: f32 = 64.0;
/// Atlas dimensions, enough for a screenful of distinct glyphs at
/// `RASTER_PX`.
const ATLAS_WIDTH: u32 = 1024;
const ATLAS_HEIGHT: u32 = 512;
/// Pixels between glyphs in the atlas.
const GLYPH_PADDING: u32 = 1;

/// Font families text items can ask for, resolved against the fonts
/// installed on the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontType {
    Sans,
    SansBold,
    Serif,
    Monospace,
}

impl FontType {
    fn query(self) -> fontdb::Query<'static> {
        const SANS: &[fontdb::Family<'static>] = &[fontdb::Family::SansSerif];
        const SERIF: &[fontdb::Family<'static>] = &[fontdb::Family::Serif];
        const MONO: &[fontdb::Family<'static>] = &[fontdb::Family::Monospace];
        let (families, weight) = match self {
            FontType::Sans => (SANS, fontdb::Weight::NORMAL),
            FontType::SansBold => (SANS, fontdb::Weight::BOLD),
            FontType::Serif => (SERIF, fontdb::Weight::NORMAL),
            FontType::Monospace => (MONO, fontdb::Weight::NORMAL),
        };
        fontdb::Query {
            families,
            weight,
            ..fontdb::Query::default()
        }
    }
}

/// Locates system fonts and parses them on demand. One library is shared by
/// all text items of an engine.
pub struct FontLibrary {
    database: fontdb::Database,
}

impl FontLibrary {
    pub fn new() -> FontLibrary {
        let mut database = fontdb::Database::new();
        database.load_system_fonts();
        log::debug!("font database holds {} faces", database.len());
        FontLibrary { database }
    }

    fn resolve(&self, font: FontType) -> Result<fontdue::Font> {
        let id = self
            .database
            .query(&font.query())
            .ok_or_else(|| EngineError::resource(format!("no system font matches {font:?}")))?;
        self.database
            .with_face_data(id, |data, index| {
                fontdue::Font::from_bytes(
                    data,
                    fontdue::FontSettings {
                        collection_index: index,
                        scale: RASTER_PX,
                        ..fontdue::FontSettings::default()
                    },
                )
            })
            .ok_or_else(|| EngineError::resource(format!("face data for {font:?} unavailable")))?
            .map_err(|e| EngineError::resource(format!("cannot parse {font:?}: {e}")))
    }
}

impl Default for FontLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Lays out `text` in the requested font and returns the glyph-quad mesh and
/// the atlas it references. The mesh is normalized so the line height spans
/// 2.0 units and the string is centered at the origin; item size scales it
/// on screen.
///
/// An empty string yields an empty mesh, not an error.
pub fn layout(library: &FontLibrary, text: &str, font: FontType, rgba: Color) -> Result<(Model, Texture)> {
    if text.is_empty() {
        let atlas = Texture::text_atlas(vec![0.0; 4], 1, 1, rgba);
        return Ok((Model::from_text_quads(Vec::new(), Vec::new()), atlas));
    }

    let face = library.resolve(font)?;

    let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings::default());
    layout.append(&[&face], &TextStyle::new(text, RASTER_PX, 0));

    let mut packer = ShelfPacker::new(ATLAS_WIDTH, ATLAS_HEIGHT);
    let mut atlas = vec![0.0f32; (4 * ATLAS_WIDTH * ATLAS_HEIGHT) as usize];
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // glyph extents in layout pixels, for normalization
    let mut min_x = f32::MAX;
    let mut max_x = f32::MIN;
    let mut min_y = f32::MAX;
    let mut max_y = f32::MIN;

    struct Placed {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        uv_min: [f32; 2],
        uv_max: [f32; 2],
    }
    let mut placed = Vec::new();

    for glyph in layout.glyphs() {
        if !glyph.char_data.rasterize() || glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (metrics, coverage) = face.rasterize_config(glyph.key);
        let (gx, gy) = packer.place(metrics.width as u32, metrics.height as u32).ok_or_else(
            || {
                EngineError::resource(format!(
                    "glyph atlas of {ATLAS_WIDTH}x{ATLAS_HEIGHT} overflows for this string"
                ))
            },
        )?;
        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let c = coverage[row * metrics.width + col] as f32 / 255.0;
                let i =
                    4 * ((gy as usize + row) * ATLAS_WIDTH as usize + gx as usize + col);
                atlas[i] = rgba.r;
                atlas[i + 1] = rgba.g;
                atlas[i + 2] = rgba.b;
                atlas[i + 3] = rgba.a * c;
            }
        }
        let w = glyph.width as f32;
        let h = glyph.height as f32;
        min_x = min_x.min(glyph.x);
        max_x = max_x.max(glyph.x + w);
        min_y = min_y.min(glyph.y);
        max_y = max_y.max(glyph.y + h);
        placed.push(Placed {
            x: glyph.x,
            y: glyph.y,
            w,
            h,
            uv_min: [
                gx as f32 / ATLAS_WIDTH as f32,
                gy as f32 / ATLAS_HEIGHT as f32,
            ],
            uv_max: [
                (gx + metrics.width as u32) as f32 / ATLAS_WIDTH as f32,
                (gy + metrics.height as u32) as f32 / ATLAS_HEIGHT as f32,
            ],
        });
    }

    if placed.is_empty() {
        // whitespace-only strings rasterize nothing
        let atlas = Texture::text_atlas(vec![0.0; 4], 1, 1, rgba);
        return Ok((Model::from_text_quads(Vec::new(), Vec::new()), atlas));
    }

    // map layout pixels into the local unit frame: y span becomes 2.0,
    // centered at the origin, x keeps the aspect ratio
    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;
    let scale = ((max_y - min_y) / 2.0).max(f32::EPSILON);

    for p in &placed {
        let x0 = (p.x - cx) / scale;
        let x1 = (p.x + p.w - cx) / scale;
        // layout y grows downward, local y grows upward
        let y0 = -(p.y - cy) / scale;
        let y1 = -(p.y + p.h - cy) / scale;
        let base = vertices.len() as u32;
        vertices.push(Vertex::new([x0, y0, 0.0], p.uv_min));
        vertices.push(Vertex::new([x1, y0, 0.0], [p.uv_max[0], p.uv_min[1]]));
        vertices.push(Vertex::new([x1, y1, 0.0], p.uv_max));
        vertices.push(Vertex::new([x0, y1, 0.0], [p.uv_min[0], p.uv_max[1]]));
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    let texture = Texture::text_atlas(atlas, ATLAS_WIDTH, ATLAS_HEIGHT, rgba);
    Ok((Model::from_text_quads(vertices, indices), texture))
}

/// Shelf packer for the glyph atlas: fills left to right, opens a new row
/// when a glyph does not fit.
struct ShelfPacker {
    width: u32,
    height: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
}

impl ShelfPacker {
    fn new(width: u32, height: u32) -> ShelfPacker {
        ShelfPacker {
            width,
            height,
            cursor_x: GLYPH_PADDING,
            cursor_y: GLYPH_PADDING,
            row_height: 0,
        }
    }

    fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if self.cursor_x + w + GLYPH_PADDING > self.width {
            self.cursor_y += self.row_height + GLYPH_PADDING;
            self.cursor_x = GLYPH_PADDING;
            self.row_height = 0;
        }
        if self.cursor_y + h + GLYPH_PADDING > self.height || w + 2 * GLYPH_PADDING > self.width {
            return None;
        }
        let at = (self.cursor_x, self.cursor_y);
        self.cursor_x += w + GLYPH_PADDING;
        self.row_height = self.row_height.max(h);
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_yields_empty_mesh() {
        let library = FontLibrary::new();
        let (model, atlas) = layout(&library, "", FontType::Sans, Color::WHITE).unwrap();
        assert!(model.is_empty());
        assert_eq!(atlas.width(), 1);
    }

    #[test]
    fn shelf_packer_opens_new_rows() {
        let mut packer = ShelfPacker::new(100, 100);
        let (x0, y0) = packer.place(40, 10).unwrap();
        let (x1, y1) = packer.place(40, 20).unwrap();
        assert_eq!(y0, y1);
        assert!(x1 > x0);
        // does not fit the remaining 100 - 2*40 span, drops to a new shelf
        let (x2, y2) = packer.place(40, 10).unwrap();
        assert_eq!(x2, x0);
        assert!(y2 > y0);
    }

    #[test]
    fn shelf_packer_rejects_overflow() {
        let mut packer = ShelfPacker::new(64, 32);
        assert!(packer.place(100, 10).is_none());
        assert!(packer.place(10, 40).is_none());
    }

    #[test]
    fn layout_builds_quads_when_a_font_exists() {
        let library = FontLibrary::new();
        // machines without any installed font report a resource error instead
        match layout(&library, "ZD", FontType::Sans, Color::WHITE) {
            Ok((model, atlas)) => {
                assert_eq!(model.indices().len() % 6, 0);
                assert!(!model.is_empty());
                assert_eq!(atlas.width(), ATLAS_WIDTH);
            }
            Err(EngineError::ResourceLoad(_)) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
}
