//! Reload mode: rebuild and restart the server whenever its sources change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use walkdir::{DirEntry, WalkDir};

use super::cancellable::{CancellablePoller, CancellableResult, CancellationToken};
use super::{LaunchError, run_to_completion, spawn};
use crate::plan::LocalPlan;
use crate::{print_err, print_info, print_warn};

pub const WATCH_INTERVAL: Duration = Duration::from_millis(500);

const IGNORED_DIRS: [&str; 4] = ["target", ".objcentric", ".git", "node_modules"];

/// Modification times of every file under the watched paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    files: BTreeMap<PathBuf, SystemTime>,
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

impl SourceSnapshot {
    /// Paths that do not exist are skipped.
    pub fn capture(paths: &[PathBuf]) -> Self {
        let files = paths
            .iter()
            .flat_map(|root| {
                WalkDir::new(root)
                    .into_iter()
                    .filter_entry(|entry| !is_ignored(entry))
                    .filter_map(Result::ok)
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((entry.into_path(), modified))
            })
            .collect();
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One path that differs from `other`, if any.
    pub fn first_change<'a>(&'a self, other: &'a SourceSnapshot) -> Option<&'a Path> {
        self.files
            .iter()
            .find(|(path, modified)| other.files.get(*path) != Some(modified))
            .map(|(path, _)| path.as_path())
            .or_else(|| {
                other
                    .files
                    .keys()
                    .find(|path| !self.files.contains_key(*path))
                    .map(PathBuf::as_path)
            })
    }
}

pub struct Supervisor<'a> {
    plan: &'a LocalPlan,
    interval: Duration,
}

impl<'a> Supervisor<'a> {
    pub fn new(plan: &'a LocalPlan) -> Self {
        Self {
            plan,
            interval: WATCH_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Block until `baseline` no longer matches the sources on disk.
    fn wait_for_change(
        &self,
        baseline: &SourceSnapshot,
        stop: &CancellationToken,
    ) -> Option<SourceSnapshot> {
        let poller = CancellablePoller::with_interval(stop.clone(), self.interval);
        match poller.poll_until(|| {
            let current = SourceSnapshot::capture(&self.plan.watch);
            match current.first_change(baseline) {
                Some(path) => {
                    print_info!("Change detected in {}", path.display());
                    Some(current)
                }
                None => None,
            }
        }) {
            CancellableResult::Completed(snapshot) => Some(snapshot),
            CancellableResult::Cancelled => None,
        }
    }

    /// Build, serve, and start over on every source change.
    ///
    /// Returns when the server exits on its own or `cancel_token` is cancelled. A failed
    /// rebuild keeps the supervisor waiting for the next change.
    pub fn run(&self, cancel_token: &CancellationToken) -> Result<(), LaunchError> {
        let mut snapshot = SourceSnapshot::capture(&self.plan.watch);
        print_info!("Watching {} source files for changes", snapshot.len());
        run_to_completion(&self.plan.build, cancel_token)?;

        loop {
            let generation = CancellationToken::new();
            let server = spawn(&self.plan.serve)?;

            let next = thread::scope(|scope| {
                let watcher = scope.spawn(|| {
                    let changed = self.wait_for_change(&snapshot, &generation);
                    generation.cancel();
                    changed
                });
                // Forwards an outer cancellation to this generation.
                let relay = scope.spawn(|| {
                    let outer = CancellablePoller::new(generation.clone())
                        .poll_until(|| cancel_token.is_cancelled().then_some(()));
                    if !outer.is_cancelled() {
                        generation.cancel();
                    }
                });

                let outcome = server.wait(&generation);
                generation.cancel();
                let changed = watcher.join().ok().flatten();
                let _ = relay.join();
                (outcome, changed)
            });

            match next {
                (Err(LaunchError::Cancelled), Some(changed)) if !cancel_token.is_cancelled() => {
                    snapshot = changed;
                }
                (Err(LaunchError::Cancelled), _) => return Err(LaunchError::Cancelled),
                (outcome, _) => {
                    print_warn!("Server exited, stopping the reload loop");
                    return outcome;
                }
            }

            print_info!("Rebuilding the server");
            while let Err(err) = run_to_completion(&self.plan.build, cancel_token) {
                if matches!(err, LaunchError::Cancelled) {
                    return Err(err);
                }
                print_err!("{err}");
                print_warn!("Waiting for further changes before rebuilding");
                snapshot = self
                    .wait_for_change(&snapshot, cancel_token)
                    .ok_or(LaunchError::Cancelled)?;
            }
        }
    }
}
