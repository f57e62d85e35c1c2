use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Controls how step output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Spinners with a rolling window of tool output, cleared on completion.
    Normal,
    /// Like Normal but tool output stays on screen after each step.
    Verbose,
    /// Spinners only.
    Quiet,
    /// No ANSI, plain println output (piped/non-TTY).
    Plain,
}

impl OutputMode {
    pub fn resolve(verbose: bool, quiet: bool, is_tty: bool) -> Self {
        match (is_tty, verbose, quiet) {
            (false, _, _) => OutputMode::Plain,
            (true, true, _) => OutputMode::Verbose,
            (true, false, true) => OutputMode::Quiet,
            (true, false, false) => OutputMode::Normal,
        }
    }
}

const MAX_LOG_LINES: usize = 8;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{prefix}] {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn done_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{prefix}] \u{2713} {msg:.green}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn warn_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{prefix}] ! {msg:.yellow}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Numbered pipeline steps with spinners and checkmarks.
pub struct StepProgress {
    multi: MultiProgress,
    total: usize,
    current: usize,
    mode: OutputMode,
}

#[derive(Default)]
struct StepState {
    lines: VecDeque<String>,
    done_label: Option<String>,
    warning: Option<String>,
}

/// Handle given to a running step for streaming tool output.
///
/// Output lines are appended to the spinner's message as extra lines so
/// indicatif keeps an accurate count of the lines it owns.
pub struct Step {
    bar: ProgressBar,
    state: Arc<Mutex<StepState>>,
    label: String,
    mode: OutputMode,
}

impl StepProgress {
    pub fn new(total: usize, mode: OutputMode) -> Self {
        let multi = match mode {
            OutputMode::Plain => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            _ => MultiProgress::new(),
        };
        Self {
            multi,
            total,
            current: 0,
            mode,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    fn next_prefix(&mut self) -> String {
        self.current += 1;
        format!("{}/{}", self.current, self.total)
    }

    /// Run `f` as the next numbered step.
    ///
    /// The spinner is finalized here rather than in `Step`'s drop, so a
    /// closure that never touches its handle still gets its checkmark.
    pub async fn run<F, Fut, T>(&mut self, label: &str, f: F) -> T
    where
        F: FnOnce(Step) -> Fut,
        Fut: Future<Output = T>,
    {
        let prefix = self.next_prefix();
        if self.mode == OutputMode::Plain {
            println!("[{prefix}] {label}");
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_prefix(prefix.clone());
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        let state = Arc::new(Mutex::new(StepState::default()));
        let step = Step {
            bar: bar.clone(),
            state: state.clone(),
            label: label.to_string(),
            mode: self.mode,
        };

        let result = f(step).await;

        let (done_label, warning, lines) = match state.lock() {
            Ok(mut st) => (
                st.done_label.take().unwrap_or_else(|| label.to_string()),
                st.warning.take(),
                std::mem::take(&mut st.lines),
            ),
            Err(_) => (label.to_string(), None, VecDeque::new()),
        };

        if self.mode == OutputMode::Verbose {
            for line in &lines {
                self.multi.println(format!("        {line}")).ok();
            }
        }

        match &warning {
            Some(w) => {
                let msg = format!("{done_label} ({w})");
                if self.mode == OutputMode::Plain {
                    println!("[{prefix}] ! {msg}");
                }
                bar.set_style(warn_style());
                bar.finish_with_message(msg);
            }
            None => {
                if self.mode == OutputMode::Plain {
                    println!("[{prefix}] \u{2713} {done_label}");
                }
                bar.set_style(done_style());
                bar.finish_with_message(done_label);
            }
        }

        result
    }

    /// Print an indented detail line (`→ text`).
    pub fn info(&self, text: &str) {
        self.println(&format!("      \u{2192} {text}"));
    }

    pub fn println(&self, text: &str) {
        if self.mode == OutputMode::Plain {
            println!("{text}");
        } else {
            self.multi.println(text).ok();
        }
    }
}

impl Step {
    /// Show one line of tool output under the spinner.
    pub fn log(&self, line: &str) {
        match self.mode {
            OutputMode::Quiet => return,
            OutputMode::Plain => {
                println!("        {line}");
                return;
            }
            OutputMode::Normal | OutputMode::Verbose => {}
        }

        let Ok(mut st) = self.state.lock() else {
            return;
        };
        for sub in line.split('\n') {
            if st.lines.len() >= MAX_LOG_LINES {
                st.lines.pop_front();
            }
            st.lines.push_back(sub.to_string());
        }

        let mut msg = self.label.clone();
        for l in &st.lines {
            msg.push_str("\n        ");
            msg.push_str(l);
        }
        self.bar.set_message(msg);
    }

    /// Override the label shown next to the checkmark.
    pub fn set_done_label(&self, label: impl Into<String>) {
        if let Ok(mut st) = self.state.lock() {
            st.done_label = Some(label.into());
        }
    }

    /// Finish this step with a warning marker instead of a checkmark.
    pub fn warn(&self, reason: impl Into<String>) {
        if let Ok(mut st) = self.state.lock() {
            st.warning = Some(reason.into());
        }
    }
}
