//! Window event loop driving the renderer
//!
//! Owns the window, the renderer and the latest snapshot received from the
//! ingest thread. Snapshots are drained in `about_to_wait`, so the loop
//! never waits on ingest.

use crossbeam_channel::Receiver;
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::domain::ViewerError;
use crate::render::{Camera, Renderer};
use crate::timeline::TimelineSnapshot;

/// Poll interval for new snapshots while idle
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const ORBIT_STEP: f32 = 0.1;
const ZOOM_STEP: f32 = 0.9;

pub struct App {
    snapshots: Receiver<TimelineSnapshot>,
    camera: Camera,
    deadline: Option<Instant>,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    error: Option<ViewerError>,
}

impl App {
    #[must_use]
    pub fn new(snapshots: Receiver<TimelineSnapshot>, retention: Duration, duration: Option<Duration>) -> Self {
        Self {
            snapshots,
            camera: Camera::new(retention),
            deadline: duration.map(|d| Instant::now() + d),
            window: None,
            renderer: None,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window = Arc::new(event_loop.create_window(Window::default_attributes().with_title("strobe"))?);
        self.renderer = Some(Renderer::new(Arc::clone(&window))?);
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: ViewerError) {
        self.error = Some(error);
        event_loop.exit();
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: &Key) {
        match key {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Named(NamedKey::ArrowLeft) => self.camera.orbit(-ORBIT_STEP),
            Key::Named(NamedKey::ArrowRight) => self.camera.orbit(ORBIT_STEP),
            Key::Named(NamedKey::ArrowUp) => self.camera.zoom_time(ZOOM_STEP),
            Key::Named(NamedKey::ArrowDown) => self.camera.zoom_time(1.0 / ZOOM_STEP),
            _ => return,
        }
        self.request_redraw();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else { return };
        match renderer.render(&self.camera) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(window) = &self.window {
                    renderer.resize(window.inner_size());
                }
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, ViewerError::Surface("out of memory".to_string()));
            }
            Err(e) => warn!("Frame skipped: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event: KeyEvent { state: ElementState::Pressed, logical_key, .. }, ..
            } => self.handle_key(event_loop, &logical_key),
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    #[allow(clippy::cast_possible_truncation)]
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 40.0) as f32,
                };
                self.camera.zoom_time(ZOOM_STEP.powf(lines));
                self.request_redraw();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
                self.request_redraw();
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!("Duration limit reached");
            event_loop.exit();
            return;
        }

        // bounded(1): at most one snapshot is waiting
        if let Ok(snapshot) = self.snapshots.try_recv() {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.update(&snapshot);
            }
            self.request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + FRAME_INTERVAL));
    }
}

/// Open the window and render snapshots until it is closed
///
/// # Errors
/// Returns the first window or GPU error that stopped the loop.
pub fn run(
    snapshots: Receiver<TimelineSnapshot>,
    retention: Duration,
    duration: Option<Duration>,
) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(snapshots, retention, duration);
    event_loop.run_app(&mut app)?;
    app.error.take().map_or(Ok(()), Err)
}
