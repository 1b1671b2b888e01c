// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Device selection, swap-surface lifecycle and the frame renderer.

pub mod context;
pub mod renderer;
pub mod swap;

pub use context::GpuContext;
pub use renderer::Renderer;
pub use swap::SwapSurface;
