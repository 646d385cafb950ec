use std::time::Duration;

pub const WINDOW: usize = 20;

/// Mean of the last [`WINDOW`] samples, in milliseconds.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    samples: [f32; WINDOW],
    len: usize,
    next: usize,
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self {
            samples: [0.0; WINDOW],
            len: 0,
            next: 0,
        }
    }
}

impl RollingAverage {
    pub fn push(&mut self, value: f32) {
        self.samples[self.next] = value;
        self.next = (self.next + 1) % WINDOW;
        self.len = (self.len + 1).min(WINDOW);
    }

    pub fn push_duration(&mut self, elapsed: Duration) {
        self.push(elapsed.as_secs_f32() * 1000.0);
    }

    pub fn average(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        self.samples[..self.len].iter().sum::<f32>() / self.len as f32
    }
}
