// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The window boundary. The engine core only knows [`WindowProvider`] and
//! [`crate::input::InputProvider`]; [`DesktopWindow`] is the winit-backed
//! default implementation of both sides.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::EventLoopExtPumpEvents;
use winit::window::{Window, WindowBuilder};

use crate::errors::{EngineError, Result};
use crate::input::{Command, InputProvider};

/// What a poll of the window turned up.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowEvents {
    pub resized: Option<(u32, u32)>,
    pub close_requested: bool,
}

/// Surface and monitor metadata the engine needs from its host window.
pub trait WindowProvider {
    /// Creates the presentable surface on the given instance.
    fn create_surface(&self, instance: &wgpu::Instance) -> Result<wgpu::Surface<'static>>;

    /// Current drawable size in physical pixels.
    fn pixel_size(&self) -> (u32, u32);

    /// Physical size of the drawable area in millimeters, for field-of-view
    /// math.
    fn physical_size_mm(&self) -> (f32, f32);

    fn scale_factor(&self) -> f64;

    /// Monitor refresh rate, if the platform reports one.
    fn refresh_rate_hz(&self) -> Option<f32>;

    /// Pumps platform events, translating input along the way.
    fn poll(&mut self) -> WindowEvents;
}

type CommandQueue = Rc<RefCell<VecDeque<Command>>>;

/// Reader side of a desktop window's translated key events.
pub struct DesktopInput {
    queue: CommandQueue,
}

impl InputProvider for DesktopInput {
    fn poll_command(&mut self) -> Option<Command> {
        self.queue.borrow_mut().pop_front()
    }
}

/// A winit window plus its event pump.
pub struct DesktopWindow {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    queue: CommandQueue,
}

impl DesktopWindow {
    pub fn new(title: &str) -> Result<DesktopWindow> {
        let event_loop = EventLoop::new()
            .map_err(|e| EngineError::FatalDeviceState(format!("no event loop: {e}")))?;
        let window = WindowBuilder::new()
            .with_title(title)
            .build(&event_loop)
            .map_err(|e| EngineError::FatalDeviceState(format!("cannot open a window: {e}")))?;
        log::info!(
            "opened window \"{title}\" at {:?}, scale factor {}",
            window.inner_size(),
            window.scale_factor()
        );
        Ok(DesktopWindow {
            event_loop,
            window: Arc::new(window),
            queue: Rc::new(RefCell::new(VecDeque::new())),
        })
    }

    /// The input side of this window, handed to the engine separately from
    /// the window side.
    pub fn input_provider(&self) -> DesktopInput {
        DesktopInput {
            queue: self.queue.clone(),
        }
    }
}

impl WindowProvider for DesktopWindow {
    fn create_surface(&self, instance: &wgpu::Instance) -> Result<wgpu::Surface<'static>> {
        Ok(instance.create_surface(self.window.clone())?)
    }

    fn pixel_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width.max(1), size.height.max(1))
    }

    fn physical_size_mm(&self) -> (f32, f32) {
        // winit exposes no physical monitor dimensions, so estimate from a
        // 96 dpi logical raster; hosts with calibrated displays override
        // this through the engine options
        let size = self.window.inner_size();
        let scale = self.window.scale_factor() as f32;
        let to_mm = |px: u32| px as f32 / scale / 96.0 * 25.4;
        (to_mm(size.width), to_mm(size.height))
    }

    fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    fn refresh_rate_hz(&self) -> Option<f32> {
        self.window
            .current_monitor()
            .and_then(|m| m.refresh_rate_millihertz())
            .map(|mhz| mhz as f32 / 1000.0)
    }

    fn poll(&mut self) -> WindowEvents {
        let mut events = WindowEvents::default();
        let queue = &self.queue;
        self.event_loop
            .pump_events(Some(Duration::ZERO), |event, _| {
                if let Event::WindowEvent { event, .. } = event {
                    match event {
                        WindowEvent::Resized(size) => {
                            events.resized = Some((size.width.max(1), size.height.max(1)));
                        }
                        WindowEvent::CloseRequested => {
                            events.close_requested = true;
                        }
                        WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    logical_key,
                                    state: ElementState::Pressed,
                                    repeat: false,
                                    ..
                                },
                            ..
                        } => {
                            if let Some(command) = translate_key(&logical_key) {
                                queue.borrow_mut().push_back(command);
                            }
                        }
                        _ => {}
                    }
                }
            });
        events
    }
}

/// Keyboard mapping: Escape closes, space and `y` affirm, `p` pauses,
/// digits select items.
fn translate_key(key: &Key) -> Option<Command> {
    match key {
        Key::Named(NamedKey::Escape) => Some(Command::Close),
        Key::Named(NamedKey::Space) => Some(Command::Yes),
        Key::Character(c) => match c.as_str() {
            "p" | "P" => Some(Command::Pause),
            "y" | "Y" => Some(Command::Yes),
            d => d
                .chars()
                .next()
                .and_then(|ch| ch.to_digit(10))
                .and_then(|n| Command::item(n as u8)),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    #[test]
    fn keys_translate_to_commands() {
        assert_eq!(
            translate_key(&Key::Named(NamedKey::Escape)),
            Some(Command::Close)
        );
        assert_eq!(
            translate_key(&Key::Character(SmolStr::new("p"))),
            Some(Command::Pause)
        );
        assert_eq!(
            translate_key(&Key::Character(SmolStr::new("3"))),
            Some(Command::Item3)
        );
        assert_eq!(translate_key(&Key::Character(SmolStr::new("0"))), None);
        assert_eq!(translate_key(&Key::Named(NamedKey::Tab)), None);
    }
}
