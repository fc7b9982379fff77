//! Per-category frame profiling
//!
//! Time is attributed to one [`TimeCategory`] at a time: starting a category
//! closes the previous one. Each call to [`TimeCategoryLogger::next_measurement`]
//! closes a frame; averages cover the most recent frames.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

/// Number of frames kept for averaging
pub const PROFILE_WINDOW: usize = 25;

const CATEGORY_COUNT: usize = 10;

/// Where frame time is spent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeCategory {
    Physics,
    Logic,
    Animations,
    Network,
    Scenegraph,
    Rasterizer,
    Services,
    Overhead,
    Outside,
    GpuLatency,
}

impl TimeCategory {
    pub const ALL: [TimeCategory; CATEGORY_COUNT] = [
        TimeCategory::Physics,
        TimeCategory::Logic,
        TimeCategory::Animations,
        TimeCategory::Network,
        TimeCategory::Scenegraph,
        TimeCategory::Rasterizer,
        TimeCategory::Services,
        TimeCategory::Overhead,
        TimeCategory::Outside,
        TimeCategory::GpuLatency,
    ];

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            TimeCategory::Physics => "Physics",
            TimeCategory::Logic => "Logic",
            TimeCategory::Animations => "Animations",
            TimeCategory::Network => "Network",
            TimeCategory::Scenegraph => "Scenegraph",
            TimeCategory::Rasterizer => "Rasterizer",
            TimeCategory::Services => "Services",
            TimeCategory::Overhead => "Overhead",
            TimeCategory::Outside => "Outside",
            TimeCategory::GpuLatency => "GPU Latency",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulates wall time per category
#[derive(Debug)]
pub struct TimeCategoryLogger {
    current: Option<(TimeCategory, Instant)>,
    frame: [f64; CATEGORY_COUNT],
    history: VecDeque<[f64; CATEGORY_COUNT]>,
    window: usize,
}

impl Default for TimeCategoryLogger {
    fn default() -> Self {
        Self::new(PROFILE_WINDOW)
    }
}

impl TimeCategoryLogger {
    pub fn new(window: usize) -> Self {
        Self {
            current: None,
            frame: [0.0; CATEGORY_COUNT],
            history: VecDeque::with_capacity(window),
            window: window.max(1),
        }
    }

    /// Close the running category and start timing `category`
    pub fn start_log(&mut self, category: TimeCategory) {
        let now = Instant::now();
        self.close(now);
        self.current = Some((category, now));
    }

    /// Add time to a category directly
    pub fn record(&mut self, category: TimeCategory, seconds: f64) {
        self.frame[category.index()] += seconds;
    }

    /// Close the current frame and keep timing the running category
    pub fn next_measurement(&mut self) {
        let now = Instant::now();
        if let Some((category, _)) = self.close(now) {
            self.current = Some((category, now));
        }
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(self.frame);
        self.frame = [0.0; CATEGORY_COUNT];
    }

    /// Average seconds per frame for one category
    pub fn average(&self, category: TimeCategory) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.history.iter().map(|f| f[category.index()]).sum();
        sum / self.history.len() as f64
    }

    /// Average seconds per frame across all categories
    pub fn total_average(&self) -> f64 {
        TimeCategory::ALL.iter().map(|c| self.average(*c)).sum()
    }

    /// `label -> (milliseconds, percent of total)` for every category
    pub fn profile(&self) -> BTreeMap<String, (f64, f64)> {
        let total = self.total_average().max(1e-6);
        TimeCategory::ALL
            .iter()
            .map(|c| {
                let time = self.average(*c);
                (c.label().to_string(), (time * 1000.0, time / total * 100.0))
            })
            .collect()
    }

    fn close(&mut self, now: Instant) -> Option<(TimeCategory, Instant)> {
        let current = self.current.take();
        if let Some((category, start)) = current {
            self.frame[category.index()] += now.duration_since(start).as_secs_f64();
        }
        current
    }
}
