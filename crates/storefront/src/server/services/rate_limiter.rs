//! Sliding-window request admission per client
//!
//! Keeps the admitted-request timestamps for each client inside the
//! trailing window. Timestamps older than the window are pruned on access,
//! so idle clients cost nothing once their window drains. Rejected attempts
//! are not recorded - only admitted requests count against the budget.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-wide sliding-window rate limiter keyed by an opaque client
/// identifier (typically the remote address)
pub struct RateLimiter {
  max_requests: usize,
  window: Duration,
  hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self { max_requests, window, hits: Mutex::new(HashMap::new()) }
  }

  /// Admit or reject a request from the given client. Admission records the
  /// request; rejection leaves the window untouched.
  pub fn allow(&self, client_id: &str) -> bool {
    let now = Instant::now();
    let mut hits = self.hits.lock().expect("rate limiter lock poisoned");
    let window = hits.entry(client_id.to_string()).or_default();

    // Prune everything that has slid out of the trailing window
    let cutoff = now - self.window;
    while window.front().is_some_and(|&t| t < cutoff) {
      window.pop_front();
    }

    if window.len() >= self.max_requests {
      return false;
    }

    window.push_back(now);
    true
  }
}
