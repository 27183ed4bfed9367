use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    fn spinner(template: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    /// A setup stage (loading the classifier, opening the camera). Reports its duration
    /// when dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = Self::spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live line showing the guide position and the latest recognized gesture.
    pub fn status(&self, total_steps: usize) -> StatusLine {
        let spinner = self
            .use_pretty()
            .then(|| Self::spinner("{spinner} [{elapsed}] {msg}"));
        let status = StatusLine {
            spinner,
            total_steps,
            step: 0,
            gesture: None,
        };
        status.render();
        status
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct StatusLine {
    spinner: Option<ProgressBar>,
    total_steps: usize,
    step: usize,
    gesture: Option<(String, f32)>,
}

impl StatusLine {
    /// Continuous feedback. Only redraws the pretty line; plain output stays quiet.
    pub fn gesture(&mut self, label: &str, confidence: f32) {
        self.gesture = Some((label.to_string(), confidence));
        if self.spinner.is_some() {
            self.render();
        }
    }

    /// Guide position changed.
    pub fn step(&mut self, step: usize) {
        self.step = step;
        match &self.spinner {
            Some(_) => self.render(),
            None => eprintln!("==> step {}/{}", step + 1, self.total_steps),
        }
    }

    /// One-off message printed above the live line.
    pub fn note(&self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.println(message),
            None => eprintln!("{message}"),
        }
    }

    fn message(&self) -> String {
        let step = format!("step {}/{}", self.step + 1, self.total_steps);
        match &self.gesture {
            Some((label, confidence)) => format!("{step}  {label} ({confidence:.2})"),
            None => format!("{step}  waiting for a hand"),
        }
    }

    fn render(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(self.message());
        }
    }
}

impl Drop for StatusLine {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(format!("✔ {}", self.message()));
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ui_never_draws_spinners() {
        let ui = Ui::from_args(Some("plain"), true, false);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(Some("pretty"), false, false);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(None, true, true);
        assert!(!ui.use_pretty());
    }

    #[test]
    fn status_message_tracks_step_and_gesture() {
        let ui = Ui::from_args(Some("plain"), false, false);
        let mut status = ui.status(4);
        assert_eq!(status.message(), "step 1/4  waiting for a hand");
        status.gesture("Thumb_Up", 0.913);
        status.step(1);
        assert_eq!(status.message(), "step 2/4  Thumb_Up (0.91)");
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
