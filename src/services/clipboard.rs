// src/services/clipboard.rs
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Mutex;

use crate::services::analyzer::Analyzer;
use crate::services::ticker::extract_tickers;

pub const POLL_INTERVAL_MS: u64 = 500;
pub const DISPATCH_DEBOUNCE_MS: u64 = 2000;
/// Pause between queue drains: 1 s plus stagger so back-to-back analyses
/// don't hammer the news source.
pub const QUEUE_DRAIN_DELAY_MS: u64 = 1500;

/// Where clipboard samples come from. Production shells out to the
/// platform's clipboard utility; tests feed a scripted sequence.
#[async_trait]
pub trait ClipboardSource: Send + Sync {
    async fn read_sample(&self) -> Option<String>;
}

/// Reads the clipboard by spawning the platform's paste utility. Nothing is
/// ever written back; the clipboard is strictly read-only here.
pub struct CommandClipboard {
    program: &'static str,
    args: &'static [&'static str],
}

impl CommandClipboard {
    /// The copy/paste clipboard for the current platform, if it has a
    /// known utility.
    pub fn detect() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(CommandClipboard {
                program: "pbpaste",
                args: &[],
            })
        } else if cfg!(target_os = "windows") {
            Some(CommandClipboard {
                program: "powershell",
                args: &["-NoProfile", "-Command", "Get-Clipboard"],
            })
        } else if cfg!(target_os = "linux") {
            Some(CommandClipboard {
                program: "xclip",
                args: &["-o", "-selection", "clipboard"],
            })
        } else {
            None
        }
    }

    /// The X11 primary selection: text highlighted but not yet copied.
    /// Only meaningful where xclip exists; other platforms skip the probe.
    pub fn primary_selection() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(CommandClipboard {
                program: "xclip",
                args: &["-o", "-selection", "primary"],
            })
        } else {
            None
        }
    }
}

#[async_trait]
impl ClipboardSource for CommandClipboard {
    async fn read_sample(&self) -> Option<String> {
        let output = Command::new(self.program)
            .args(self.args)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Detection state machine, independent of how samples arrive. A sample
/// turns into a dispatch only when it changed, it contains a ticker, that
/// ticker differs from the last one processed, and the debounce window
/// since the last dispatch has passed.
pub struct ClipboardWatcher {
    last_sample: Option<String>,
    last_processed: Option<String>,
    last_dispatch: Option<Instant>,
}

impl ClipboardWatcher {
    pub fn new() -> Self {
        ClipboardWatcher {
            last_sample: None,
            last_processed: None,
            last_dispatch: None,
        }
    }

    pub fn observe(&mut self, sample: &str, now: Instant) -> Option<String> {
        let trimmed = sample.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.last_sample.as_deref() == Some(trimmed) {
            return None;
        }
        self.last_sample = Some(trimmed.to_string());

        let ticker = extract_tickers(trimmed).into_iter().next()?;

        // Same value sitting on the clipboard (or re-copied) must not fan
        // out into repeated analyses.
        if self.last_processed.as_deref() == Some(ticker.as_str()) {
            return None;
        }
        if let Some(last) = self.last_dispatch {
            if now.duration_since(last) < Duration::from_millis(DISPATCH_DEBOUNCE_MS) {
                return None;
            }
        }

        self.last_dispatch = Some(now);
        self.last_processed = Some(ticker.clone());
        Some(ticker)
    }
}

impl Default for ClipboardWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the watcher tasks against the real clipboard: one single-flight
/// queue consumer, a clipboard poll, and (where supported) a primary
/// selection probe sharing the same detection state.
pub fn spawn_watcher(analyzer: Arc<Analyzer>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Single consumer: at most one analysis in flight system-wide on this
    // path; pending tickers queue FIFO in the channel.
    tokio::spawn(async move {
        while let Some(ticker) = rx.recv().await {
            info!("Analyzing clipboard ticker {}", ticker);
            match analyzer.analyze(&ticker).await {
                Ok(result) => info!(
                    "Clipboard analysis for {} done ({} articles)",
                    result.ticker,
                    result.articles.len()
                ),
                Err(e) => warn!("Clipboard analysis for {} rejected: {}", ticker, e),
            }
            tokio::time::sleep(Duration::from_millis(QUEUE_DRAIN_DELAY_MS)).await;
        }
    });

    let state = Arc::new(Mutex::new(ClipboardWatcher::new()));

    match CommandClipboard::detect() {
        Some(source) => {
            spawn_poll_loop(source, state.clone(), tx.clone());
            info!("Clipboard watcher started");
        }
        None => {
            warn!("No clipboard utility for this platform; watcher disabled");
            return;
        }
    }

    if let Some(selection) = CommandClipboard::primary_selection() {
        spawn_poll_loop(selection, state, tx);
        info!("Primary selection probe started");
    }
}

fn spawn_poll_loop(
    source: impl ClipboardSource + 'static,
    state: Arc<Mutex<ClipboardWatcher>>,
    tx: UnboundedSender<String>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
        loop {
            interval.tick().await;
            let Some(sample) = source.read_sample().await else {
                continue;
            };
            let dispatched = state.lock().await.observe(&sample, Instant::now());
            if let Some(ticker) = dispatched {
                info!("Ticker detected on clipboard: {}", ticker);
                if tx.send(ticker).is_err() {
                    break;
                }
            }
        }
    });
}
