use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId, WindowLevel},
};

use crate::{
    compositor::{Compositor, FrameOutcome},
    config::OverlayConfig,
    error::{InfobarError, InfobarResult},
    present::gpu::GpuPresenter,
    render::{InfobarPainter, ScreenSize},
    transport::{EventSlot, UdpListener},
};

/// Run the overlay until its window is closed.
///
/// Fonts are resolved and the UDP listener bound before the window opens. A
/// UDP bind failure leaves the file transport as the only input.
pub fn run_overlay(config: OverlayConfig) -> InfobarResult<()> {
    let painter = InfobarPainter::from_config(&config)?;
    let slot = EventSlot::new();
    let _udp = match UdpListener::spawn(config.udp_addr, slot.clone()) {
        Ok(listener) => Some(listener),
        Err(e) => {
            tracing::warn!(error = %e, "udp transport unavailable, watching the event file only");
            None
        }
    };

    let event_loop = EventLoop::new()
        .map_err(|e| InfobarError::display(format!("create event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = OverlayApp::new(config, slot, painter);
    event_loop
        .run_app(&mut app)
        .map_err(|e| InfobarError::display(format!("event loop: {e}")))?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct OverlayApp {
    config: OverlayConfig,
    slot: EventSlot,
    painter: Option<InfobarPainter>,
    window: Option<Arc<Window>>,
    compositor: Option<Compositor<InfobarPainter, GpuPresenter>>,
    frame_interval: Duration,
    next_frame: Instant,
    last_outcome: Option<FrameOutcome>,
    fatal: Option<InfobarError>,
}

impl OverlayApp {
    fn new(config: OverlayConfig, slot: EventSlot, painter: InfobarPainter) -> Self {
        let frame_interval = config.frame_interval();
        Self {
            config,
            slot,
            painter: Some(painter),
            window: None,
            compositor: None,
            frame_interval,
            next_frame: Instant::now(),
            last_outcome: None,
            fatal: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> InfobarResult<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| InfobarError::display("no monitor available"))?;
        let size = monitor.size();
        let origin = monitor.position();

        let attrs = Window::default_attributes()
            .with_title("infobar")
            .with_decorations(false)
            .with_transparent(true)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_active(false)
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(size.width, size.height))
            .with_position(PhysicalPosition::new(origin.x, origin.y));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| InfobarError::display(format!("create window: {e}")))?,
        );
        if let Err(e) = window.set_cursor_hittest(false) {
            tracing::debug!(error = %e, "cursor hit-test passthrough unsupported");
        }

        let inner = window.inner_size();
        let screen = ScreenSize::new(inner.width, inner.height);
        let presenter = GpuPresenter::new(window.clone(), screen)?;
        let painter = self
            .painter
            .take()
            .ok_or_else(|| InfobarError::display("overlay already initialised"))?;

        self.compositor = Some(Compositor::new(
            self.config.clone(),
            self.slot.clone(),
            painter,
            presenter,
            screen,
        ));
        self.window = Some(window);
        self.next_frame = Instant::now();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: InfobarError) {
        tracing::error!(error = %error, "overlay stopping");
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        match compositor.tick(Instant::now(), Utc::now()) {
            Ok(outcome) => {
                let became = std::mem::discriminant(&outcome);
                if self
                    .last_outcome
                    .is_none_or(|prev| std::mem::discriminant(&prev) != became)
                {
                    tracing::debug!(?outcome, "frame state changed");
                }
                self.last_outcome = Some(outcome);
            }
            Err(e) if e.is_display() => self.fail(event_loop, e),
            Err(e) => tracing::warn!(error = %e, "frame failed"),
        }
    }
}

impl ApplicationHandler for OverlayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.compositor.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("overlay window closed");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(compositor) = self.compositor.as_mut() {
                    compositor.resize(ScreenSize::new(size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let now = Instant::now();
        if now >= self.next_frame {
            window.request_redraw();
            self.next_frame += self.frame_interval;
            if self.next_frame < now {
                self.next_frame = now + self.frame_interval;
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}
