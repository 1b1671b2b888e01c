// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::engine::Engine;
use crate::errors::Result;
use crate::input::Command;

/// Experiment logic supplied by the host application.
///
/// All hooks run synchronously on the render thread, so items mutated in
/// `update` are observed fully updated by the draw pass of the same tick and
/// no locking is needed.
pub trait ExperimentLogic {
    /// Called once after the engine has started, before the first tick.
    /// Create models, textures and items here.
    fn init(&mut self, engine: &mut Engine) -> Result<()>;

    /// Called once per tick before rendering.
    fn update(&mut self, engine: &mut Engine) -> Result<()>;

    /// Called once per queued input command, after `update` of the tick the
    /// command was drained on. `time` is seconds elapsed since `start`.
    fn input(&mut self, _engine: &mut Engine, _command: Command, _time: f64) -> Result<()> {
        Ok(())
    }
}
