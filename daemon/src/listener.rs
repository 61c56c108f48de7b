//! The touch loop: gestures in, app launches and dashboard frames out.

use std::time::Duration;

use futures::{Stream, StreamExt};
use log::{error, info, warn};
use tokio::sync::watch;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use kiosk::App;
use kiosk::gesture::Gesture;
use kiosk::navigation::{Effect, NavState, Navigator};
use kiosk::supervisor::SharedSupervisor;
use kiosk::touch_device::TouchDeviceError;

use crate::display::{FramebufferSink, Renderer, Screen};
use crate::error::KioskError;

/// How often to check whether the running app died on its own.
const REAP_INTERVAL: Duration = Duration::from_secs(5);

pub struct TouchLoop<F> {
    navigator: Navigator,
    supervisor: SharedSupervisor,
    renderer: Renderer<F>,
    changes: watch::Receiver<Option<App>>,
}

impl<F: FramebufferSink> TouchLoop<F> {
    pub async fn new(initial: App, supervisor: SharedSupervisor, renderer: Renderer<F>) -> Self {
        let changes = supervisor.lock().await.subscribe();
        Self {
            navigator: Navigator::new(initial),
            supervisor,
            renderer,
            changes,
        }
    }

    /// Bring up the first app, then handle gestures until shutdown or until
    /// the touch device fails.
    pub async fn run<S>(
        mut self,
        gestures: S,
        shutdown_token: CancellationToken,
    ) -> Result<(), KioskError>
    where
        S: Stream<Item = Result<Gesture, TouchDeviceError>>,
    {
        let initial = self.navigator.state().app();
        self.launch(initial).await;

        let gestures = gestures.fuse();
        futures::pin_mut!(gestures);
        let mut reap = interval_at(Instant::now() + REAP_INTERVAL, REAP_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!("touch loop shutting down");
                    return Ok(());
                }
                changed = self.changes.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    let active = *self.changes.borrow_and_update();
                    self.on_active_changed(active).await;
                }
                gesture = gestures.next() => match gesture {
                    Some(Ok(gesture)) => self.on_gesture(gesture).await,
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        warn!("touch device closed");
                        return Ok(());
                    }
                },
                _ = reap.tick() => self.supervisor.lock().await.refresh().await,
            }
        }
    }

    async fn on_gesture(&mut self, gesture: Gesture) {
        let transition = self.navigator.handle(gesture);
        match transition.effect {
            Some(Effect::LaunchApp(app)) => self.launch(app).await,
            Some(Effect::Render(view)) => {
                if self.owns_framebuffer().await {
                    self.renderer.show(&Screen::Dashboard(view)).await;
                }
            }
            None => {}
        }
    }

    /// False while a process-backed app (including an external dashboard)
    /// is drawing to the panel.
    async fn owns_framebuffer(&self) -> bool {
        let supervisor = self.supervisor.lock().await;
        supervisor.active().is_none_or(|a| a.in_process())
    }

    async fn launch(&mut self, app: App) {
        let (result, draw_dashboard) = {
            let mut supervisor = self.supervisor.lock().await;
            let result = supervisor.launch(app).await;
            let in_process = supervisor.active().is_some_and(|a| a.in_process());
            (result, in_process)
        };
        // this loop caused the change, nothing to follow
        self.changes.borrow_and_update();

        match result {
            Ok(()) if draw_dashboard => self.draw_dashboard().await,
            Ok(()) => {}
            Err(e) => {
                error!("failed to launch {app}: {e}");
                self.renderer.show(&Screen::LaunchFailed(e.to_string())).await;
            }
        }
    }

    /// Someone else (the HTTP remote, or the app exiting) changed what runs.
    async fn on_active_changed(&mut self, active: Option<App>) {
        self.navigator.follow(active);
        // a remote switch publishes None before the new app; look at where it
        // settled rather than drawing over the incoming app
        let (settled, in_process) = {
            let supervisor = self.supervisor.lock().await;
            let in_process = supervisor.active().is_some_and(|a| a.in_process());
            (supervisor.active_app(), in_process)
        };
        if settled != active {
            return;
        }
        match active {
            None => self.renderer.show(&Screen::Idle).await,
            Some(App::Dashboard) if in_process => self.draw_dashboard().await,
            Some(_) => {}
        }
    }

    async fn draw_dashboard(&mut self) {
        if let NavState::Dashboard(view) = self.navigator.state() {
            self.renderer.show(&Screen::Dashboard(view)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::display::testing::RecordingSink;
    use kiosk::gesture::{Direction, Point};
    use kiosk::navigation::DashboardView;
    use kiosk::supervisor::{AppCommands, ProcessLauncher, Supervisor, SupervisorConfig};

    fn supervisor(commands: AppCommands) -> SharedSupervisor {
        let config = SupervisorConfig {
            confirm_window_ms: 100,
            orphan_processes: Vec::new(),
            pid_file: None,
            ..SupervisorConfig::default()
        };
        Supervisor::new(config, commands, ProcessLauncher).into_shared()
    }

    fn sleeper() -> Vec<String> {
        vec!["sleep".to_string(), "30".to_string()]
    }

    #[tokio::test]
    async fn test_gestures_drive_dashboard_and_launches() {
        let supervisor = supervisor(AppCommands {
            dashboard: Vec::new(),
            photos: sleeper(),
            video: vec!["/nonexistent/kiosk-video".to_string()],
        });
        let sink = RecordingSink::default();
        let renderer = Renderer::new(sink.clone(), DashboardConfig::default());
        let touch_loop = TouchLoop::new(App::Dashboard, supervisor.clone(), renderer).await;

        let gestures = futures::stream::iter([
            // bottom-left quadrant opens the logs menu
            Ok(Gesture::Tap(Point { x: 100, y: 250 })),
            Ok(Gesture::Swipe(Direction::Left)),
            Ok(Gesture::Swipe(Direction::Left)),
        ]);
        touch_loop.run(gestures, CancellationToken::new()).await.unwrap();

        // top menu, logs menu, then the failed video launch
        assert_eq!(sink.count(), 3);
        let mut supervisor = supervisor.lock().await;
        assert_eq!(supervisor.active_app(), None);
        supervisor.terminate_current().await;
    }

    #[tokio::test]
    async fn test_device_error_ends_loop() {
        let supervisor = supervisor(AppCommands {
            dashboard: Vec::new(),
            photos: sleeper(),
            video: sleeper(),
        });
        let sink = RecordingSink::default();
        let renderer = Renderer::new(sink.clone(), DashboardConfig::default());
        let touch_loop = TouchLoop::new(App::Photos, supervisor.clone(), renderer).await;

        let gestures = futures::stream::iter([Err(TouchDeviceError::Read(std::io::Error::from(
            std::io::ErrorKind::UnexpectedEof,
        )))]);
        let result = touch_loop.run(gestures, CancellationToken::new()).await;
        assert!(matches!(result, Err(KioskError::TouchDevice(_))));

        // photos draws for itself
        assert_eq!(sink.count(), 0);
        let mut supervisor = supervisor.lock().await;
        assert_eq!(supervisor.active_app(), Some(App::Photos));
        supervisor.terminate_current().await;
    }

    #[tokio::test]
    async fn test_remote_changes_followed() {
        let supervisor = supervisor(AppCommands {
            dashboard: Vec::new(),
            photos: sleeper(),
            video: sleeper(),
        });
        let sink = RecordingSink::default();
        let renderer = Renderer::new(sink.clone(), DashboardConfig::default());
        let mut touch_loop = TouchLoop::new(App::Photos, supervisor.clone(), renderer).await;
        touch_loop.launch(App::Photos).await;

        // remote starts the dashboard
        supervisor.lock().await.launch(App::Dashboard).await.unwrap();
        let active = *touch_loop.changes.borrow_and_update();
        touch_loop.on_active_changed(active).await;
        assert_eq!(
            touch_loop.navigator.state(),
            NavState::Dashboard(DashboardView::TopMenu)
        );
        assert_eq!(sink.count(), 1);

        // remote stops it
        supervisor.lock().await.terminate_current().await;
        let active = *touch_loop.changes.borrow_and_update();
        touch_loop.on_active_changed(active).await;
        assert_eq!(sink.count(), 2);
        // the carousel stays where it was
        assert_eq!(touch_loop.navigator.state().app(), App::Dashboard);
    }

    #[tokio::test]
    async fn test_external_dashboard_not_drawn_over() {
        let supervisor = supervisor(AppCommands {
            dashboard: sleeper(),
            photos: sleeper(),
            video: sleeper(),
        });
        let sink = RecordingSink::default();
        let renderer = Renderer::new(sink.clone(), DashboardConfig::default());
        let touch_loop = TouchLoop::new(App::Dashboard, supervisor.clone(), renderer).await;

        let gestures = futures::stream::iter([Ok(Gesture::Tap(Point { x: 100, y: 250 }))]);
        touch_loop.run(gestures, CancellationToken::new()).await.unwrap();

        let mut supervisor = supervisor.lock().await;
        assert_eq!(supervisor.active_app(), Some(App::Dashboard));
        assert!(!supervisor.active().unwrap().in_process());
        assert_eq!(sink.count(), 0);
        supervisor.terminate_current().await;
    }
}
