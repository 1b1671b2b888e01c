// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Demo: a drifting sine grating in a gaussian envelope next to a
//! counterphase-flickering checkerboard. Digits 1 and 2 toggle them, `p`
//! pauses, Escape quits.

use std::cell::RefCell;
use std::rc::Rc;

use psyvis::prelude::*;

struct Gratings {
    grating: Option<ItemHandle>,
    checkerboard: Option<ItemHandle>,
}

impl ExperimentLogic for Gratings {
    fn init(&mut self, engine: &mut Engine) -> Result<()> {
        let square = Rc::new(Model::new(Shape::Square)?);

        let sine = Rc::new(RefCell::new(Texture::new(
            TextureKind::Sine,
            Color::BLACK,
            Color::WHITE,
        )?));
        let grating = Item::new(square.clone(), sine);
        {
            let mut g = grating.borrow_mut();
            g.position(-3.0, 0.0);
            g.size(4.0)?;
            g.frequency(0.0, 2.0)?;
            g.envelope(EnvelopeType::Gaussian, 1.5, 1.5, 0.0)?;
        }
        engine.items_mut().add(grating.clone());

        let checker = Rc::new(RefCell::new(Texture::new(
            TextureKind::Checkerboard { cells: 8 },
            Color::BLACK,
            Color::WHITE,
        )?));
        let checkerboard = Item::new(square, checker);
        {
            let mut c = checkerboard.borrow_mut();
            c.position(3.0, 0.0);
            c.size(4.0)?;
            c.temporal_contrast(4.0, 0.0)?;
        }
        engine.items_mut().add(checkerboard.clone());

        self.grating = Some(grating);
        self.checkerboard = Some(checkerboard);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine) -> Result<()> {
        // drift the grating at 1 cycle per second
        if let Some(grating) = &self.grating {
            let phase = (engine.elapsed_seconds() * 360.0 % 360.0) as f32;
            grating.borrow_mut().frequency(phase, 2.0)?;
        }
        Ok(())
    }

    fn input(&mut self, _engine: &mut Engine, command: Command, time: f64) -> Result<()> {
        let toggled = match command.item_number() {
            Some(1) => &self.grating,
            Some(2) => &self.checkerboard,
            _ => return Ok(()),
        };
        if let Some(item) = toggled {
            let mut item = item.borrow_mut();
            match item.eye() {
                Eye::None => item.set_eye(Eye::Both),
                _ => item.set_eye(Eye::None),
            }
            log::info!("toggled {command:?} at {time:.3}s");
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let mut window = DesktopWindow::new("psyvis gratings")?;
    let mut input = window.input_provider();
    let mut engine = Engine::new(EngineOptions::default())?;
    engine.run(
        &mut window,
        &mut input,
        &mut Gratings {
            grating: None,
            checkerboard: None,
        },
    )
}
