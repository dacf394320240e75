use confgen::engine::progress::{Progress, ProgressCallback};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 100;

/// One line per molecule on stderr.
///
/// Molecules running in parallel each own a bar, keyed by molecule name; a bar turns into a
/// step counter for phases that announce their length and into a spinner otherwise.
#[derive(Clone)]
pub struct CliProgressHandler {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<Arc<str>, ProgressBar>>>,
}

impl CliProgressHandler {
    /// Draws into `multi`, which log output shares to stay clear of the bars.
    pub fn new(multi: &MultiProgress) -> Self {
        Self {
            multi: multi.clone(),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let handler = self.clone();
        Box::new(move |event| handler.handle(event))
    }

    fn handle(&self, event: Progress) {
        let Ok(mut bars) = self.bars.lock() else {
            warn!("Progress state was poisoned; dropping event");
            return;
        };
        match event {
            Progress::MoleculeStarted { molecule } => {
                let bar = self.multi.add(
                    ProgressBar::new_spinner()
                        .with_style(spinner_style())
                        .with_prefix(molecule.to_string())
                        .with_message("queued"),
                );
                bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                bars.insert(molecule, bar);
            }
            Progress::PhaseStarted {
                molecule,
                phase,
                steps,
            } => {
                let Some(bar) = bars.get(&molecule) else { return };
                match steps {
                    Some(total) => {
                        bar.disable_steady_tick();
                        bar.set_style(bar_style());
                        bar.set_length(total);
                        bar.set_position(0);
                    }
                    None => {
                        bar.set_style(spinner_style());
                        bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    }
                }
                bar.set_message(phase.to_string());
            }
            Progress::StepCompleted { molecule } => {
                if let Some(bar) = bars.get(&molecule) {
                    bar.inc(1);
                }
            }
            Progress::Notice { molecule, message } => {
                let _ = self.multi.println(format!("  {molecule}: {message}"));
            }
            Progress::MoleculeFinished { molecule, unique } => {
                if let Some(bar) = bars.remove(&molecule) {
                    bar.set_style(done_style());
                    bar.finish_with_message(format!("✓ {unique} conformers"));
                }
            }
            Progress::MoleculeFailed { molecule, reason } => {
                if let Some(bar) = bars.remove(&molecule) {
                    bar.set_style(done_style());
                    bar.abandon_with_message(format!("✗ {reason}"));
                }
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("  {prefix:.bold} {msg:<26} [{bar:30.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("  {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
