use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub type FrameCallback = Box<dyn FnOnce()>;

/// Platform hook for "run this before the next frame is painted".
///
/// A browser backend maps this onto `requestAnimationFrame`; tests and
/// headless hosts use [`FrameQueue`] and pump frames by hand.
pub trait FrameScheduler {
    fn request_frame(&self, callback: FrameCallback);
}

/// Manually driven frame source.
#[derive(Default)]
pub struct FrameQueue {
    queue: RefCell<VecDeque<FrameCallback>>,
    frames: Cell<u64>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the callbacks that were queued before this call. Callbacks
    /// requested while the frame runs wait for the next one.
    pub fn run_frame(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        let n = batch.len();
        for cb in batch {
            cb();
        }
        self.frames.set(self.frames.get() + 1);
        n
    }

    /// Runs frames until nothing is pending, at most `max_frames` times.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut ran = 0;
        while self.pending() > 0 && ran < max_frames {
            self.run_frame();
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn frames_run(&self) -> u64 {
        self.frames.get()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&self, callback: FrameCallback) {
        self.queue.borrow_mut().push_back(callback);
    }
}
