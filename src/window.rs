//! Window management using winit

use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window as WinitWindow, WindowBuilder},
};

/// Wrapper around winit window with resize and close tracking
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
}

impl Window {
    /// Create a new window with the given title and dimensions
    pub fn new(event_loop: &EventLoop<()>, title: &str, width: u32, height: u32) -> Result<Self, OsError> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .build(event_loop)?;
        let size = window.inner_size();

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
            resized: false,
            close_requested: false,
        })
    }

    /// Shared handle for surface creation
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Current inner size in physical pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns true once per resize
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Stop the event loop after the current callback
    pub fn close(&mut self) {
        self.close_requested = true;
    }

    fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }
}

/// Open a window and call `frame` whenever the event queue drains
pub fn run<F>(title: &str, width: u32, height: u32, mut frame: F) -> Result<(), EventLoopError>
where
    F: FnMut(&mut Window) + 'static,
{
    let event_loop = EventLoop::new()?;
    let mut window = Window::new(&event_loop, title, width, height).map_err(EventLoopError::Os)?;
    log::info!("Opened window {title:?} ({width}x{height})");

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => window.handle_event(&event),
            Event::AboutToWait => {
                frame(&mut window);
                window.window.request_redraw();
            }
            _ => {}
        }

        if window.should_close() {
            elwt.exit();
        }
    })
}
