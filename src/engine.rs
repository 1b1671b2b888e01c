// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The engine: owns the GPU stack, the item collection and the clock, and
//! drives the tick loop that experiment logic plugs into.

use crate::errors::{EngineError, Result};
use crate::gpu::{GpuContext, Renderer, SwapSurface};
use crate::input::{Command, InputProvider};
use crate::logic::ExperimentLogic;
use crate::timing::FrameTimer;
use crate::visual::observer::{DEFAULT_DISTANCE_MM, DEFAULT_IPD_MM};
use crate::visual::text::{self, FontLibrary, FontType};
use crate::visual::{Color, Items, Model, Observer, Texture, ViewMode};
use crate::window::WindowProvider;

/// How often a recoverable surface failure is retried within one tick
/// before it is escalated.
const ACQUIRE_RETRIES: u32 = 3;

/// Static engine configuration. Constructed by the host, consumed once.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub view_mode: ViewMode,
    /// Eye-to-display distance, mm.
    pub distance_mm: f32,
    /// Inter-pupillary distance, mm. Only meaningful in stereo.
    pub ipd_mm: f32,
    /// Calibrated physical display size, mm. `None` uses the window
    /// provider's estimate.
    pub display_mm: Option<(f32, f32)>,
    /// Number of frame slots items can be time-multiplexed over.
    pub slot_count: u32,
    pub background: Color,
    /// Explicit adapter choice; `None` picks the first capable one.
    pub adapter_index: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            view_mode: ViewMode::Mono,
            distance_mm: DEFAULT_DISTANCE_MM,
            ipd_mm: DEFAULT_IPD_MM,
            display_mm: None,
            slot_count: 1,
            background: Color::gray(0.5),
            adapter_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Running,
    Paused,
    Finished,
}

impl EngineState {
    fn name(self) -> &'static str {
        match self {
            EngineState::Uninitialized => "Uninitialized",
            EngineState::Running => "Running",
            EngineState::Paused => "Paused",
            EngineState::Finished => "Finished",
        }
    }
}

struct GpuStack {
    context: GpuContext,
    swap: SwapSurface,
    renderer: Renderer,
}

pub struct Engine {
    options: EngineOptions,
    state: EngineState,
    timer: FrameTimer,
    items: Items,
    observer: Observer,
    fonts: Option<FontLibrary>,
    gpu: Option<GpuStack>,
    frame_index: u64,
    finish_requested: bool,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Result<Engine> {
        if options.slot_count == 0 {
            return Err(EngineError::invalid("slot count must be at least 1"));
        }
        let mut observer = Observer::new(
            options.view_mode,
            options.distance_mm,
            options.display_mm.unwrap_or((1.0, 1.0)),
        )?;
        observer.set_ipd(options.ipd_mm)?;
        Ok(Engine {
            options,
            state: EngineState::Uninitialized,
            timer: FrameTimer::new(),
            items: Items::new(),
            observer,
            fonts: None,
            gpu: None,
            frame_index: 0,
            finish_requested: false,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Items {
        &mut self.items
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut Observer {
        &mut self.observer
    }

    /// Seconds since `start`, frozen while paused.
    pub fn elapsed_seconds(&self) -> f64 {
        self.timer.elapsed_seconds()
    }

    /// Frame slot of the upcoming tick.
    pub fn frame_slot(&self) -> u32 {
        (self.frame_index % self.options.slot_count as u64) as u32
    }

    /// Lays out a string into a text model and its glyph atlas. The font
    /// library is built on first use.
    pub fn text(&mut self, string: &str, font: FontType, rgba: Color) -> Result<(Model, Texture)> {
        let fonts = self.fonts.get_or_insert_with(FontLibrary::new);
        text::layout(fonts, string, font, rgba)
    }

    /// Requests a graceful stop; observed at the top of the next tick.
    pub fn finish(&mut self) {
        self.finish_requested = true;
    }

    /// Runs init, then ticks until `finish` or a window close, then cleans
    /// up. The one entry point a host needs. A hook or device error still
    /// leaves the engine `Finished` with its GPU resources released before
    /// the error propagates.
    pub fn run<W: WindowProvider>(
        &mut self,
        window: &mut W,
        input: &mut dyn InputProvider,
        logic: &mut dyn ExperimentLogic,
    ) -> Result<()> {
        self.start(window)?;
        if let Err(e) = logic.init(self) {
            let e = self.fail(e);
            self.cleanup()?;
            return Err(e);
        }
        while self.state != EngineState::Finished {
            if let Err(e) = self.tick(window, input, logic) {
                // tick already transitioned to Finished and drained
                self.cleanup()?;
                return Err(e);
            }
        }
        self.cleanup()
    }

    /// Builds the GPU stack against the window and transitions
    /// `Uninitialized -> Running`.
    pub fn start<W: WindowProvider>(&mut self, window: &mut W) -> Result<()> {
        self.expect_state(EngineState::Uninitialized, "start")?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = window.create_surface(&instance)?;
        let context = GpuContext::new(&instance, &surface, self.options.adapter_index)?;
        let swap = SwapSurface::new(&context, surface, window.pixel_size())?;
        let renderer = Renderer::new(&context, swap.format());

        if self.options.display_mm.is_none() {
            self.observer.set_display(window.physical_size_mm())?;
        }
        if let Some(rate) = window.refresh_rate_hz() {
            log::info!("display refresh rate {rate} Hz");
        }

        self.gpu = Some(GpuStack {
            context,
            swap,
            renderer,
        });
        self.timer.start();
        self.state = EngineState::Running;
        Ok(())
    }

    /// One iteration of the loop: poll the window, hand input to the logic,
    /// update, render, present, advance.
    pub fn tick<W: WindowProvider>(
        &mut self,
        window: &mut W,
        input: &mut dyn InputProvider,
        logic: &mut dyn ExperimentLogic,
    ) -> Result<()> {
        if self.state != EngineState::Running && self.state != EngineState::Paused {
            return Err(EngineError::WrongState {
                required: "Running or Paused",
                actual: self.state.name(),
            });
        }

        self.handle_window_events(window)?;

        let mut commands = Vec::new();
        while let Some(command) = input.poll_command() {
            commands.push(command);
        }
        let t = self.timer.elapsed_seconds();
        for command in commands {
            match command {
                Command::Close => self.finish_requested = true,
                Command::Pause => self.toggle_pause(),
                Command::None => {}
                other => logic.input(self, other, t).map_err(|e| self.fail(e))?,
            }
        }

        if self.finish_requested {
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.renderer.drain(&gpu.context);
            }
            self.state = EngineState::Finished;
            return Ok(());
        }

        if self.state == EngineState::Running {
            logic.update(self).map_err(|e| self.fail(e))?;
        }

        let outcome = self.render_current_frame();
        self.conclude_frame(outcome)
    }

    /// Polls the window, forwarding a close request and resizing the swap
    /// surface. Item state is untouched, so mutations queued by the logic
    /// survive a resize.
    fn handle_window_events<W: WindowProvider>(&mut self, window: &mut W) -> Result<()> {
        let events = window.poll();
        if events.close_requested {
            self.finish_requested = true;
        }
        if let Some(size) = events.resized {
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.swap.resize(&gpu.context, size);
            }
            if self.options.display_mm.is_none() {
                self.observer.set_display(window.physical_size_mm())?;
            }
        }
        Ok(())
    }

    /// Advances the frame counter only for frames that actually presented:
    /// a recoverably dropped frame keeps its slot so the next tick retries
    /// it, a fatal error finishes the loop.
    fn conclude_frame(&mut self, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => {
                self.frame_index += 1;
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                log::warn!("frame dropped, retrying slot {}: {e}", self.frame_slot());
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drains outstanding GPU work and finishes the loop, so resources stay
    /// releasable and `cleanup` stays legal after an error.
    fn fail(&mut self, e: EngineError) -> EngineError {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.renderer.drain(&gpu.context);
        }
        self.state = EngineState::Finished;
        e
    }

    fn render_current_frame(&mut self) -> Result<()> {
        let slot = self.frame_slot();
        let t = self.timer.elapsed_seconds();
        let gpu = self
            .gpu
            .as_mut()
            .ok_or_else(|| EngineError::FatalDeviceState("no GPU stack".into()))?;

        let mut attempts = 0;
        let frame = loop {
            match gpu.swap.acquire(&gpu.context) {
                Ok(frame) => break frame,
                Err(e) if e.is_recoverable() && attempts < ACQUIRE_RETRIES => {
                    attempts += 1;
                    log::debug!("surface acquire retry {attempts}: {e}");
                }
                Err(e) => return Err(e),
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gpu.renderer.render_frame(
            &gpu.context,
            &view,
            gpu.swap.size(),
            &self.items,
            &self.observer,
            t,
            slot,
            self.options.background,
        )?;
        frame.present();
        Ok(())
    }

    fn toggle_pause(&mut self) {
        match self.state {
            EngineState::Running => {
                self.timer.pause();
                self.state = EngineState::Paused;
                log::info!("paused at {:.3}s", self.timer.elapsed_seconds());
            }
            EngineState::Paused => {
                self.timer.resume();
                self.state = EngineState::Running;
            }
            _ => {}
        }
    }

    /// Releases all GPU resources. Only legal after `Finished`; calling it
    /// again is a no-op.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.state != EngineState::Finished {
            return Err(EngineError::WrongState {
                required: "Finished",
                actual: self.state.name(),
            });
        }
        if let Some(mut gpu) = self.gpu.take() {
            gpu.renderer.drain(&gpu.context);
            debug_assert!(!gpu.renderer.has_work_in_flight());
        }
        self.items.clear();
        Ok(())
    }

    fn expect_state(&self, required: EngineState, _op: &'static str) -> Result<()> {
        if self.state != required {
            return Err(EngineError::WrongState {
                required: required.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: EngineState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::{Eye, Item, Model, Shape};
    use crate::window::WindowEvents;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeWindow {
        events: WindowEvents,
        size_mm: (f32, f32),
    }

    impl FakeWindow {
        fn quiet() -> FakeWindow {
            FakeWindow {
                events: WindowEvents::default(),
                size_mm: (400.0, 300.0),
            }
        }
    }

    impl WindowProvider for FakeWindow {
        fn create_surface(&self, _: &wgpu::Instance) -> Result<wgpu::Surface<'static>> {
            Err(EngineError::FatalDeviceState("headless test window".into()))
        }

        fn pixel_size(&self) -> (u32, u32) {
            (800, 600)
        }

        fn physical_size_mm(&self) -> (f32, f32) {
            self.size_mm
        }

        fn scale_factor(&self) -> f64 {
            1.0
        }

        fn refresh_rate_hz(&self) -> Option<f32> {
            None
        }

        fn poll(&mut self) -> WindowEvents {
            std::mem::take(&mut self.events)
        }
    }

    struct FakeInput(Vec<Command>);

    impl InputProvider for FakeInput {
        fn poll_command(&mut self) -> Option<Command> {
            self.0.pop()
        }
    }

    struct NoopLogic;

    impl ExperimentLogic for NoopLogic {
        fn init(&mut self, _: &mut Engine) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, _: &mut Engine) -> Result<()> {
            Ok(())
        }
    }

    struct FailingLogic;

    impl ExperimentLogic for FailingLogic {
        fn init(&mut self, _: &mut Engine) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, _: &mut Engine) -> Result<()> {
            Err(EngineError::invalid("update refused"))
        }
    }

    fn test_item() -> crate::visual::ItemHandle {
        Item::new(
            Rc::new(Model::new(Shape::Square).unwrap()),
            Rc::new(RefCell::new(Texture::flat(Color::WHITE))),
        )
    }

    #[test]
    fn new_engine_is_uninitialized() {
        let engine = Engine::new(EngineOptions::default()).unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.frame_slot(), 0);
    }

    #[test]
    fn zero_slot_count_is_rejected() {
        let options = EngineOptions {
            slot_count: 0,
            ..EngineOptions::default()
        };
        assert!(matches!(
            Engine::new(options),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn cleanup_requires_finished() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        assert!(matches!(
            engine.cleanup(),
            Err(EngineError::WrongState { .. })
        ));
        engine.force_state(EngineState::Running);
        assert!(engine.cleanup().is_err());
        engine.force_state(EngineState::Finished);
        assert!(engine.cleanup().is_ok());
        // second cleanup finds nothing to release and succeeds
        assert!(engine.cleanup().is_ok());
    }

    #[test]
    fn frame_slot_wraps_over_slot_count() {
        let options = EngineOptions {
            slot_count: 3,
            ..EngineOptions::default()
        };
        let mut engine = Engine::new(options).unwrap();
        for expected in [0, 1, 2, 0, 1] {
            assert_eq!(engine.frame_slot(), expected);
            engine.frame_index += 1;
        }
    }

    #[test]
    fn pause_toggles_and_freezes_the_clock() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        engine.force_state(EngineState::Running);
        engine.timer.start();
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Paused);
        let frozen = engine.elapsed_seconds();
        assert_eq!(engine.elapsed_seconds(), frozen);
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.elapsed_seconds() >= frozen);
    }

    #[test]
    fn dropped_frame_keeps_its_slot() {
        let options = EngineOptions {
            slot_count: 3,
            ..EngineOptions::default()
        };
        let mut engine = Engine::new(options).unwrap();
        engine.force_state(EngineState::Running);

        engine.conclude_frame(Ok(())).unwrap();
        engine.conclude_frame(Ok(())).unwrap();
        assert_eq!(engine.frame_slot(), 2);

        // a recoverably dropped frame does not consume the slot
        let dropped = engine.conclude_frame(Err(EngineError::RecoverableDeviceState(
            "swapchain outdated".into(),
        )));
        assert!(dropped.is_ok());
        assert_eq!(engine.frame_slot(), 2);
        assert_eq!(engine.state(), EngineState::Running);

        engine.conclude_frame(Ok(())).unwrap();
        assert_eq!(engine.frame_slot(), 0);
    }

    #[test]
    fn fatal_frame_error_finishes_the_loop() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        engine.force_state(EngineState::Running);
        let outcome =
            engine.conclude_frame(Err(EngineError::FatalDeviceState("device lost".into())));
        assert!(matches!(outcome, Err(EngineError::FatalDeviceState(_))));
        assert_eq!(engine.state(), EngineState::Finished);
        assert!(engine.cleanup().is_ok());
    }

    #[test]
    fn resize_leaves_item_state_untouched() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        engine.force_state(EngineState::Running);

        let item = test_item();
        item.borrow_mut().show(2);
        item.borrow_mut().contrast(0.25);
        engine.items_mut().add(item.clone());

        let mut window = FakeWindow::quiet();
        window.events.resized = Some((1024, 768));
        engine.handle_window_events(&mut window).unwrap();

        // the swap surface reconfigures but queued stimulus state survives
        assert_eq!(engine.items().len(), 1);
        assert!(item.borrow().renders_in(Eye::Both, 2, ViewMode::Mono));
        assert!(!item.borrow().renders_in(Eye::Both, 0, ViewMode::Mono));
        assert_eq!(engine.state(), EngineState::Running);

        // the uncalibrated observer follows the reported physical size
        let expected = 2.0 * (window.size_mm.0 / 2.0 / DEFAULT_DISTANCE_MM).atan();
        assert_abs_diff_eq!(engine.observer().fov_x(), expected, epsilon = 1e-6);
    }

    #[test]
    fn close_request_finishes_then_cleanup_succeeds() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        engine.force_state(EngineState::Running);
        engine.timer.start();

        let mut window = FakeWindow::quiet();
        window.events.close_requested = true;
        let mut input = FakeInput(Vec::new());
        let mut logic = NoopLogic;
        engine.tick(&mut window, &mut input, &mut logic).unwrap();

        assert_eq!(engine.state(), EngineState::Finished);
        assert!(engine.cleanup().is_ok());
        assert!(engine.cleanup().is_ok());
        assert!(engine.items().is_empty());
    }

    #[test]
    fn update_error_leaves_the_engine_cleanable() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        engine.force_state(EngineState::Running);
        engine.timer.start();

        let mut window = FakeWindow::quiet();
        let mut input = FakeInput(Vec::new());
        let mut logic = FailingLogic;
        let outcome = engine.tick(&mut window, &mut input, &mut logic);

        assert!(matches!(outcome, Err(EngineError::InvalidParameter(_))));
        assert_eq!(engine.state(), EngineState::Finished);
        assert!(engine.cleanup().is_ok());
    }
}
