//! What the canvas needs from the window that hosts it.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub trait Surface {
    /// Ask the host to deliver a paint event soon
    fn request_refresh(&mut self);
    /// Deliver timer ticks every `interval` until stopped
    fn start_timer(&mut self, interval: Duration);
    fn stop_timer(&mut self);
    /// Whether the window is mapped and visible
    fn is_shown_on_screen(&self) -> bool;
}

/// Calls observed by a [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceLog {
    pub refresh_requests: usize,
    pub timer_running: bool,
    pub timer_interval: Option<Duration>,
    pub timer_starts: usize,
    pub shown: bool,
}

/// Headless surface that records requests; clones share one log
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    log: Rc<RefCell<SurfaceLog>>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(SurfaceLog {
                shown: true,
                ..SurfaceLog::default()
            })),
        }
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.borrow().clone()
    }

    pub fn set_shown(&self, shown: bool) {
        self.log.borrow_mut().shown = shown;
    }

    pub fn take_refresh_requests(&self) -> usize {
        std::mem::take(&mut self.log.borrow_mut().refresh_requests)
    }
}

impl Surface for RecordingSurface {
    fn request_refresh(&mut self) {
        self.log.borrow_mut().refresh_requests += 1;
    }

    fn start_timer(&mut self, interval: Duration) {
        let mut log = self.log.borrow_mut();
        if !log.timer_running {
            log.timer_starts += 1;
        }
        log.timer_running = true;
        log.timer_interval = Some(interval);
    }

    fn stop_timer(&mut self) {
        self.log.borrow_mut().timer_running = false;
    }

    fn is_shown_on_screen(&self) -> bool {
        self.log.borrow().shown
    }
}
