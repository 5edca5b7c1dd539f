//! Window shell and event routing.
//!
//! Keys:
//! - `1` / `2` / `3`: fluid, pressure, velocity views
//! - `m`: toggle audio reactivity
//! - `p`: save the fluid view as a PNG in the working directory
//! - arrow up / down: lengthen or shorten trails
//!
//! The cursor always paints; no button needs to be held. Touch points
//! paint independently by id.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::audio::{AudioSource, Silence};
use crate::config::RenderMode;
use crate::error::SimulationError;
use crate::simulation::FluidSim;

/// Pointer id reserved for the mouse cursor; touches use their own ids.
const MOUSE_POINTER_ID: u64 = u64::MAX;

struct App {
    window: Option<Arc<Window>>,
    sim: Option<FluidSim>,
    source: Option<Box<dyn AudioSource>>,
    error: Option<SimulationError>,
}

impl App {
    fn new(source: Box<dyn AudioSource>) -> Self {
        Self {
            window: None,
            sim: None,
            source: Some(source),
            error: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.sim.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("inkflow");
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.error = Some(SimulationError::Window(e));
                event_loop.exit();
                return;
            }
        };

        let source = self
            .source
            .take()
            .unwrap_or_else(|| Box::new(Silence));
        match pollster::block_on(FluidSim::new(window.clone(), source)) {
            Ok(sim) => {
                self.sim = Some(sim);
                self.window = Some(window);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(sim) = self.sim.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => sim.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                sim.pointer_moved(
                    MOUSE_POINTER_ID,
                    Vec2::new(position.x as f32, position.y as f32),
                );
            }
            WindowEvent::CursorLeft { .. } => sim.pointer_released(MOUSE_POINTER_ID),
            WindowEvent::Touch(Touch {
                id,
                location,
                phase,
                ..
            }) => match phase {
                TouchPhase::Started | TouchPhase::Moved => {
                    sim.pointer_moved(id, Vec2::new(location.x as f32, location.y as f32));
                }
                TouchPhase::Ended | TouchPhase::Cancelled => sim.pointer_released(id),
            },
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key.as_ref() {
                    Key::Character("1") => sim.set_render_mode(RenderMode::Fluid),
                    Key::Character("2") => sim.set_render_mode(RenderMode::Pressure),
                    Key::Character("3") => sim.set_render_mode(RenderMode::Velocity),
                    Key::Character("m") => sim.toggle_mic(),
                    Key::Character("p") => {
                        let path = capture_path();
                        match sim.capture_png(&path) {
                            Ok(()) => eprintln!("Saved {}", path.display()),
                            Err(e) => eprintln!("Capture failed: {}", e),
                        }
                    }
                    Key::Named(NamedKey::ArrowUp) => {
                        sim.set_trail_length(sim.trail_length() + 1.0);
                    }
                    Key::Named(NamedKey::ArrowDown) => {
                        sim.set_trail_length(sim.trail_length() - 1.0);
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => match sim.frame() {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    let (width, height) = sim.viewport();
                    sim.resize(width, height);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    eprintln!("Out of GPU memory, exiting");
                    event_loop.exit();
                }
                Err(e) => eprintln!("Surface error: {:?}", e),
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn capture_path() -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("inkflow-{}.png", stamp))
}

/// Run with no audio input.
pub fn run() -> Result<(), SimulationError> {
    run_with_source(Box::new(Silence))
}

/// Run with a caller-provided audio source.
pub fn run_with_source(source: Box<dyn AudioSource>) -> Result<(), SimulationError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(source);
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
