// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! psyvis drives visual-stimulus presentation for vision-science
//! experiments: parametrized shapes and procedurally synthesized textures
//! (gratings, checkerboards, noise, optotypes, text), rendered with
//! vsynced timing, optionally in side-by-side stereo.
//!
//! A host supplies an [`logic::ExperimentLogic`] implementation and a
//! window; the [`engine::Engine`] owns the GPU stack and runs the loop:
//!
//! ```no_run
//! use psyvis::prelude::*;
//!
//! struct Blank;
//! impl ExperimentLogic for Blank {
//!     fn init(&mut self, _: &mut Engine) -> Result<()> { Ok(()) }
//!     fn update(&mut self, _: &mut Engine) -> Result<()> { Ok(()) }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut window = DesktopWindow::new("blank")?;
//!     let mut input = window.input_provider();
//!     let mut engine = Engine::new(EngineOptions::default())?;
//!     engine.run(&mut window, &mut input, &mut Blank)
//! }
//! ```

pub mod engine;
pub mod errors;
pub mod gpu;
pub mod input;
pub mod logic;
pub mod timing;
pub mod visual;
pub mod window;

pub mod prelude {
    pub use crate::engine::{Engine, EngineOptions, EngineState};
    pub use crate::errors::{EngineError, Result};
    pub use crate::input::{Command, InputProvider};
    pub use crate::logic::ExperimentLogic;
    pub use crate::visual::{
        Color, EnvelopeType, Eye, FontType, Item, ItemHandle, Items, Model, Optotype, Shape,
        Texture, TextureKind, ViewMode,
    };
    pub use crate::window::{DesktopWindow, WindowProvider};
}
