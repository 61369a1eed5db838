pub mod keymap;
pub mod navigation;
pub mod session;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::config::Configuration;
use crate::events::{Action, ExitReason, Response};
use crate::gpu::frame::{FrameSource, FrameSubmitter};
use crate::gpu::wgpu_backend::{self, Presenter, WgpuBackend};
use crate::processing::scale_plan::Size;
use crate::tasks::clock;
use crate::tasks::files::SystemTrash;

pub use session::{Session, SessionOptions};

const WINDOW_TITLE: &str = "Slide Viewer";
/// Poll cadence for GPU completion while a submission is in flight.
const IN_FLIGHT_POLL: Duration = Duration::from_millis(2);

/// Wake up shortly while a frame is in flight so its completion callback is
/// delivered promptly; otherwise sleep until the next event.
fn control_flow_for(in_flight: bool, now: Instant) -> ControlFlow {
    if in_flight {
        ControlFlow::WaitUntil(now + IN_FLIGHT_POLL)
    } else {
        ControlFlow::Wait
    }
}

#[derive(Debug)]
pub enum ViewerEvent {
    Tick(Instant),
    FrameCompleted,
    Cancelled,
}

struct ViewerApp {
    cfg: Configuration,
    slides: Option<Vec<PathBuf>>,
    cancel: CancellationToken,
    proxy: EventLoopProxy<ViewerEvent>,
    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,
    session: Option<Session<WgpuBackend>>,
    submitter: FrameSubmitter,
    title: String,
    exit: Option<ExitReason>,
    failure: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        slides: Vec<PathBuf>,
        cancel: CancellationToken,
        proxy: EventLoopProxy<ViewerEvent>,
    ) -> Self {
        Self {
            cfg,
            slides: Some(slides),
            cancel,
            proxy,
            window: None,
            presenter: None,
            session: None,
            submitter: FrameSubmitter::default(),
            title: WINDOW_TITLE.to_string(),
            exit: None,
            failure: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title(WINDOW_TITLE);
        if self.cfg.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                self.failure = Some(anyhow::Error::new(err).context("failed to create viewer window"));
                None
            }
        }
    }

    fn start(&mut self, window: Arc<Window>) -> Result<()> {
        let (backend, presenter) =
            wgpu_backend::init_gpu(window.clone(), self.cfg.resample_kernel, self.cfg.super_sampling)?;
        let size = window.inner_size();
        let viewport = Size::new(size.width, size.height);
        let slides = self.slides.take().unwrap_or_default();
        let options = SessionOptions::from(&self.cfg);
        let session = Session::new(
            backend,
            slides,
            options,
            Box::new(SystemTrash),
            viewport,
            Instant::now(),
        );
        self.presenter = Some(presenter);
        match session {
            Some(session) => {
                if let Some(reason) = session.is_finished() {
                    self.exit = Some(reason);
                }
                info!(slides = session.navigator().len(), "viewer session started");
                self.session = Some(session);
            }
            None => self.exit = Some(ExitReason::LibraryExhausted),
        }
        Ok(())
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let size = Size::new(new_size.width, new_size.height);
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.resize(size);
        }
        if let Some(session) = self.session.as_mut() {
            if session.resize(size) == Response::Redraw {
                self.request_redraw();
            }
        }
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, action: Action) {
        if action == Action::ToggleFullscreen {
            if let Some(window) = self.window.as_ref() {
                let next = match window.fullscreen() {
                    Some(_) => None,
                    None => Some(Fullscreen::Borderless(None)),
                };
                debug!(fullscreen = next.is_some(), "toggling fullscreen");
                window.set_fullscreen(next);
            }
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let response = session.handle(action, Instant::now());
        self.apply(event_loop, response);
    }

    fn apply(&mut self, event_loop: &ActiveEventLoop, response: Response) {
        match response {
            Response::Unchanged => {}
            Response::Redraw => self.request_redraw(),
            Response::Exit(reason) => {
                info!(?reason, "viewer session ending");
                self.exit = Some(reason);
                event_loop.exit();
            }
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(presenter), Some(session)) = (
            self.window.as_ref(),
            self.presenter.as_ref(),
            self.session.as_mut(),
        ) else {
            return;
        };
        if !self.submitter.begin() {
            debug!("redraw coalesced while a frame is in flight");
            return;
        }

        let size = window.inner_size();
        let Some(seq) = session.produce_frame(Size::new(size.width, size.height)) else {
            self.submitter.cancel();
            return;
        };

        let frame = match presenter.acquire() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.submitter.cancel();
                presenter.reconfigure();
                window.request_redraw();
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                self.submitter.cancel();
                self.failure = Some(anyhow::anyhow!("surface out of memory"));
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                self.submitter.cancel();
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.submitter.cancel();
                presenter.reconfigure();
                window.request_redraw();
                return;
            }
        };

        let frame_id = seq.frame;
        let proxy = self.proxy.clone();
        presenter.execute(seq, &frame, move || {
            let _ = proxy.send_event(ViewerEvent::FrameCompleted);
        });
        self.submitter.submitted();
        window.pre_present_notify();
        frame.present();
        debug!(frame = frame_id, "frame submitted");

        let title = session
            .display_text()
            .unwrap_or_else(|| WINDOW_TITLE.to_string());
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.presenter.is_none() {
            if let Err(err) = self.start(window) {
                error!(error = ?err, "failed to initialize GPU state");
                self.failure = Some(err);
                event_loop.exit();
                return;
            }
            if let Some(reason) = self.exit {
                info!(?reason, "nothing to show");
                event_loop.exit();
                return;
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                self.exit = Some(ExitReason::Quit);
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let Some(action) = keymap::action_for(&event.logical_key) {
                    self.dispatch(event_loop, action);
                }
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let in_flight = self.submitter.in_flight();
        if in_flight {
            if let Some(presenter) = self.presenter.as_ref() {
                presenter.poll();
            }
        }
        event_loop.set_control_flow(control_flow_for(in_flight, Instant::now()));
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Tick(now) => {
                if let Some(presenter) = self.presenter.as_ref() {
                    presenter.poll();
                }
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let response = session.on_tick(now);
                self.apply(event_loop, response);
            }
            ViewerEvent::FrameCompleted => {
                if self.submitter.complete() {
                    self.request_redraw();
                }
            }
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                self.exit = Some(ExitReason::Quit);
                event_loop.exit();
            }
        }
    }
}

/// Runs the slideshow window on the current thread until the user quits,
/// every slide is gone, or `cancel` fires.
pub fn run_windowed(
    slides: Vec<PathBuf>,
    cfg: Configuration,
    cancel: CancellationToken,
) -> Result<ExitReason> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = event_loop.create_proxy();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };
    let tick_task = {
        let proxy = event_loop.create_proxy();
        tokio::spawn(clock::forward_ticks(
            cfg.tick_interval,
            cancel.child_token(),
            move |now| proxy.send_event(ViewerEvent::Tick(now)).is_ok(),
        ))
    };

    let mut app = ViewerApp::new(cfg, slides, cancel, event_loop.create_proxy());
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();
    tick_task.abort();

    run_result.context("viewer event loop failed")?;
    if let Some(err) = app.failure.take() {
        return Err(err);
    }
    Ok(app.exit.unwrap_or(ExitReason::Quit))
}
