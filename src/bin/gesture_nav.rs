//! gesture_nav - walk through a step-by-step guide with hand gestures.
//!
//! This host:
//! 1. Loads configuration (file named by GESTURE_NAV_CONFIG plus GESTURE_NAV_* overrides)
//! 2. Loads the configured gesture classifier
//! 3. Opens the camera (`stub://` synthetic cameras or V4L2 device nodes)
//! 4. Runs the recognition session on a driver thread
//! 5. Maps gesture actions to guide navigation until Ctrl-C or --seconds elapse

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use gesture_nav::{
    classifier_registry, open_device, ui, FnSink, GestureNavConfig, RecognitionSession,
    SessionDriver, SessionOptions, SessionTargets, SharedOverlay, StepCursor, SystemClock,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Navigate a step-by-step guide with hand gestures")]
struct Args {
    /// JSON or TOML configuration file (overrides GESTURE_NAV_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    seconds: Option<u64>,

    /// Number of guide steps.
    #[arg(long)]
    steps: Option<usize>,

    /// Write the last landmark overlay to this PNG on exit.
    #[arg(long, value_name = "PATH")]
    overlay_out: Option<PathBuf>,

    /// Print the classifiers available in this build and exit.
    #[arg(long)]
    list_classifiers: bool,

    /// UI mode for stderr progress (auto|plain|pretty).
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = {
        let _stage = ui.stage("Load configuration");
        match &args.config {
            Some(path) => GestureNavConfig::load_from(Some(path.as_path()))?,
            None => GestureNavConfig::load()?,
        }
    };
    if let Some(steps) = args.steps {
        cfg.guide_steps = steps;
    }
    if args.overlay_out.is_some() {
        cfg.overlay_path = args.overlay_out.clone();
    }

    let registry = classifier_registry(&cfg.classifier)?;
    if args.list_classifiers {
        for name in registry.list() {
            println!("{}", name);
        }
        return Ok(());
    }

    let clock = SystemClock::shared();
    let capture = open_device(&cfg.device, clock.clone())?;
    let overlay = SharedOverlay::new();

    let status = Arc::new(Mutex::new(ui.status(cfg.guide_steps)));
    let cursor = Arc::new(Mutex::new(StepCursor::new(cfg.guide_steps)?));
    let bindings = cfg.bindings.clone();
    let sink = {
        let status_updates = status.clone();
        let status_actions = status.clone();
        let cursor = cursor.clone();
        FnSink::new(move |detection| {
            let Some(command) = bindings.command_for(&detection.label) else {
                log::debug!("no navigation bound to {}", detection.label);
                return;
            };
            let Ok(mut cursor) = cursor.lock() else {
                return;
            };
            if cursor.apply(command) {
                log::info!(
                    "{:?} -> step {}/{}",
                    command,
                    cursor.current() + 1,
                    cursor.total()
                );
                if let Ok(mut status) = status_actions.lock() {
                    status.step(cursor.current());
                }
            } else {
                log::info!("{:?} ignored at guide boundary", command);
            }
        })
        .with_update(move |detection| {
            if let Ok(mut status) = status_updates.lock() {
                status.gesture(&detection.label, detection.confidence);
            }
        })
    };

    let options = SessionOptions {
        classifier: Some(cfg.classifier.name.clone()),
        environment: cfg.environment.clone(),
        overrides: cfg.profile.clone(),
        ready_timeout: cfg.ready_timeout,
    };
    let mut session = RecognitionSession::new(registry, options, clock)?;
    {
        let _stage = ui.stage("Load gesture classifier");
        let initialized = session.initialize(SessionTargets {
            capture,
            overlay: Some(Box::new(overlay.clone())),
            sink: Box::new(sink),
        });
        if !initialized {
            return Err(session_failure(&session));
        }
    }
    log::info!(
        "device profile: {:?}, cooldown {} ms, threshold {:.2}",
        session.profile().class,
        session.profile().cooldown_ms,
        session.profile().confidence_threshold
    );

    let driver = SessionDriver::spawn(session);
    let started = {
        let _stage = ui.stage(&format!("Start camera {}", cfg.device));
        driver.start()?
    };
    if !started {
        let session = driver.shutdown()?;
        return Err(session_failure(&session));
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    match args.seconds {
        Some(seconds) => {
            log::info!("gesture_nav running for {} s (Ctrl-C to stop early)", seconds);
            let _ = rx.recv_timeout(Duration::from_secs(seconds));
        }
        None => {
            log::info!("gesture_nav running, waiting for shutdown signal (Ctrl-C)...");
            let _ = rx.recv();
        }
    }

    log::info!("stopping gesture session...");
    let session = driver.shutdown()?;
    let stats = session.stats();
    log::info!(
        "frames processed={}, stale={}, not ready={}, inference errors={}, mode errors={}, actions={}, camera resets={}",
        stats.frames_processed,
        stats.frames_stale,
        stats.frames_not_ready,
        stats.inference_errors,
        stats.mode_errors,
        stats.actions,
        stats.device_resets
    );
    if let Ok(status) = status.lock() {
        if let Ok(cursor) = cursor.lock() {
            status.note(&format!(
                "finished on step {}/{}",
                cursor.current() + 1,
                cursor.total()
            ));
        }
    }

    if let Some(path) = &cfg.overlay_path {
        overlay.save_png(path)?;
        log::info!("overlay written to {}", path.display());
    }
    Ok(())
}

fn session_failure(session: &RecognitionSession) -> anyhow::Error {
    match session.last_error() {
        Some(err) => anyhow!("{} ({})", err, err.user_hint()),
        None => anyhow!("gesture session failed ({:?})", session.state()),
    }
}
