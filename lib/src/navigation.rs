//! Screen navigation driven by gestures.
//!
//! The top level is a three-screen carousel (dashboard, photos, video) moved
//! through with horizontal swipes. The dashboard has its own menu tree, driven
//! by taps on screen quadrants and a back button.
//!
//! [`step`] is pure; anything with side effects (starting apps, drawing) is
//! returned as an [`Effect`] for the caller to carry out.

use crate::gesture::{Direction, Gesture, Point};
use crate::{App, SCREEN_HEIGHT, SCREEN_WIDTH};

const PADDING: u32 = 20;
const BACK_BUTTON_WIDTH: u32 = 100;
const BACK_BUTTON_HEIGHT: u32 = 40;

/// Back button hot-zone, anchored to the top-right corner. Bounds are
/// exclusive on every side.
pub const BACK_BUTTON: Rect = Rect {
    left: SCREEN_WIDTH - BACK_BUTTON_WIDTH - PADDING,
    top: PADDING - 5,
    width: BACK_BUTTON_WIDTH,
    height: BACK_BUTTON_HEIGHT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn contains(&self, p: Point) -> bool {
        p.x > self.left
            && p.x < self.left + self.width
            && p.y > self.top
            && p.y < self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub fn of(p: Point) -> Self {
        let right = p.x >= SCREEN_WIDTH / 2;
        let bottom = p.y >= SCREEN_HEIGHT / 2;
        match (right, bottom) {
            (false, false) => Quadrant::TopLeft,
            (true, false) => Quadrant::TopRight,
            (false, true) => Quadrant::BottomLeft,
            (true, true) => Quadrant::BottomRight,
        }
    }
}

/// Full-screen dashboard information pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Services,
    Storage,
    Performance,
    NginxLogs,
    SquidLogs,
    ImmichLogs,
}

impl Page {
    pub fn title(self) -> &'static str {
        match self {
            Page::Services => "System services",
            Page::Storage => "Storage",
            Page::Performance => "Performance",
            Page::NginxLogs => "Logs: nginx",
            Page::SquidLogs => "Logs: squid",
            Page::ImmichLogs => "Logs: immich",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardView {
    TopMenu,
    LogsMenu,
    Detail(Page),
}

impl DashboardView {
    pub fn has_back_button(self) -> bool {
        !matches!(self, DashboardView::TopMenu)
    }

    fn tap(self, p: Point) -> Option<DashboardView> {
        if self.has_back_button() && BACK_BUTTON.contains(p) {
            return Some(DashboardView::TopMenu);
        }
        match self {
            DashboardView::TopMenu => Some(match Quadrant::of(p) {
                Quadrant::TopLeft => DashboardView::Detail(Page::Storage),
                Quadrant::TopRight => DashboardView::Detail(Page::Services),
                Quadrant::BottomLeft => DashboardView::LogsMenu,
                Quadrant::BottomRight => DashboardView::Detail(Page::Performance),
            }),
            DashboardView::LogsMenu => match Quadrant::of(p) {
                Quadrant::TopLeft => Some(DashboardView::Detail(Page::SquidLogs)),
                Quadrant::TopRight => Some(DashboardView::Detail(Page::NginxLogs)),
                Quadrant::BottomLeft => Some(DashboardView::Detail(Page::ImmichLogs)),
                Quadrant::BottomRight => None,
            },
            DashboardView::Detail(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Dashboard(DashboardView),
    Photos,
    Video,
}

impl NavState {
    /// The app that owns the display in this state.
    pub fn app(self) -> App {
        match self {
            NavState::Dashboard(_) => App::Dashboard,
            NavState::Photos => App::Photos,
            NavState::Video => App::Video,
        }
    }

    /// The state shown right after `app` is brought up.
    pub fn entry(app: App) -> Self {
        match app {
            App::Dashboard => NavState::Dashboard(DashboardView::TopMenu),
            App::Photos => NavState::Photos,
            App::Video => NavState::Video,
        }
    }

    fn carousel_index(self) -> usize {
        match self {
            NavState::Dashboard(_) => 0,
            NavState::Photos => 1,
            NavState::Video => 2,
        }
    }
}

const CAROUSEL: [App; 3] = [App::Dashboard, App::Photos, App::Video];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    LaunchApp(App),
    Render(DashboardView),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: NavState,
    pub effect: Option<Effect>,
}

impl Transition {
    fn stay(state: NavState) -> Self {
        Self {
            state,
            effect: None,
        }
    }
}

pub fn step(state: NavState, gesture: Gesture) -> Transition {
    match gesture {
        Gesture::Swipe(direction) => {
            let index = state.carousel_index();
            let target = match direction {
                Direction::Left if index + 1 < CAROUSEL.len() => index + 1,
                Direction::Right if index > 0 => index - 1,
                // ends of the carousel don't wrap, and don't relaunch
                _ => return Transition::stay(state),
            };
            let app = CAROUSEL[target];
            Transition {
                state: NavState::entry(app),
                effect: Some(Effect::LaunchApp(app)),
            }
        }
        // photos and video draw for themselves
        Gesture::Tap(p) => match state {
            NavState::Dashboard(view) => match view.tap(p) {
                Some(next) => Transition {
                    state: NavState::Dashboard(next),
                    effect: Some(Effect::Render(next)),
                },
                None => Transition::stay(state),
            },
            NavState::Photos | NavState::Video => Transition::stay(state),
        },
    }
}

/// Owns the current [`NavState`].
pub struct Navigator {
    state: NavState,
}

impl Navigator {
    pub fn new(initial: App) -> Self {
        Self {
            state: NavState::entry(initial),
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn handle(&mut self, gesture: Gesture) -> Transition {
        let transition = step(self.state, gesture);
        self.state = transition.state;
        transition
    }

    /// Move to whatever app the supervisor says is running, e.g. after the
    /// remote started one. Returns the dashboard view to draw if the
    /// dashboard just became the active screen.
    pub fn follow(&mut self, active: Option<App>) -> Option<Effect> {
        let app = active?;
        if app == self.state.app() {
            return None;
        }
        self.state = NavState::entry(app);
        match self.state {
            NavState::Dashboard(view) => Some(Effect::Render(view)),
            _ => None,
        }
    }
}
