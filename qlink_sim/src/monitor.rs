//! Live progress bars for a running simulation.
//!
//! Agents publish progress into the sink's [`ProgressBoard`]; the monitor
//! polls it from its own thread and draws one bar per agent.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use qlink_core::{AgentId, ProgressBoard, ProgressEntry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}";

/// Background thread drawing the board until [`ProgressMonitor::finish`].
pub struct ProgressMonitor {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Vec<ProgressEntry>>>,
}

impl ProgressMonitor {
    /// Starts drawing to stderr.
    pub fn spawn(board: ProgressBoard, title: &str) -> Self {
        Self::spawn_with_target(board, title, ProgressDrawTarget::stderr())
    }

    /// Starts drawing to an explicit target (hidden in tests).
    pub fn spawn_with_target(board: ProgressBoard, title: &str, target: ProgressDrawTarget) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let title = title.to_string();

        let thread = thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || draw(board, &title, target, &flag));

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Progress display disabled: {}", e);
                None
            }
        };
        Self { stop, thread }
    }

    /// Stops polling, completes every bar and returns the last snapshot.
    pub fn finish(mut self) -> Vec<ProgressEntry> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Vec<ProgressEntry> {
        self.stop.store(true, Ordering::Release);
        self.thread
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn draw(board: ProgressBoard, title: &str, target: ProgressDrawTarget, stop: &AtomicBool) -> Vec<ProgressEntry> {
    let multi = MultiProgress::with_draw_target(target);
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let mut bars: HashMap<AgentId, ProgressBar> = HashMap::new();

    loop {
        // Read the flag before polling so the last refresh sees final counts
        let stopping = stop.load(Ordering::Acquire);
        let snapshot = board.snapshot();
        for entry in &snapshot {
            let bar = bars.entry(entry.agent.clone()).or_insert_with(|| {
                let bar = multi.add(ProgressBar::new(entry.total as u64));
                bar.set_style(style.clone());
                bar.set_message(format!("{title} {}", entry.agent));
                bar
            });
            bar.set_length(entry.total as u64);
            bar.set_position(entry.current as u64);
        }

        if stopping {
            for bar in bars.values() {
                bar.finish();
            }
            return snapshot;
        }
        thread::sleep(POLL_INTERVAL);
    }
}
