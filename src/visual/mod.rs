// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stimulus data: colors, geometry, textures, text and the items that
//! combine them.

pub mod color;
pub mod item;
pub mod items;
pub mod model;
pub mod observer;
pub mod optotype;
pub mod text;
pub mod texture;

pub use color::Color;
pub use item::{Eye, EnvelopeType, Item, ItemHandle};
pub use items::Items;
pub use model::{Model, Shape, Vertex};
pub use observer::{Observer, ViewMode};
pub use optotype::Optotype;
pub use text::{FontLibrary, FontType};
pub use texture::{Texture, TextureKind};
