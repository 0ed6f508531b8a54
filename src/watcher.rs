/// Mutation watcher that keeps timestamp markers live while the host re-renders
///
/// A watcher moves between three phases:
///
/// - `Stopped`: nothing installed
/// - `Observing`: observer connected, no pass scheduled
/// - `PendingPass`: a content mutation arrived; a pass runs once the subtree has
///   been quiet for the debounce window
///
/// Passes run under the document write lock, so they never overlap each other
/// or a host mutation.
use crate::augment::{Augmenter, PassReport};
use crate::config::Config;
use crate::dom::{DomTree, MutationObserver, MutationSource, NodeId, ObserveOptions, ObserverId};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// A document shared between the host renderer and the watcher
pub type SharedTree<D> = Arc<RwLock<D>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherPhase {
    Stopped,
    Observing,
    PendingPass,
}

struct ActiveWatch<D> {
    tree: SharedTree<D>,
    root: NodeId,
    observer: ObserverId,
    task: JoinHandle<()>,
}

/// Owns at most one observer and one debounce task at a time
pub struct MutationWatcher<D> {
    augmenter: Arc<Augmenter>,
    debounce: Duration,
    style_id: String,
    stylesheet: String,
    phase: Arc<watch::Sender<WatcherPhase>>,
    passes: Arc<AtomicU64>,
    active: Option<ActiveWatch<D>>,
}

impl<D> MutationWatcher<D>
where
    D: DomTree + MutationSource + Send + Sync + 'static,
{
    pub fn new(config: &Config, augmenter: Arc<Augmenter>) -> Self {
        let (phase, _) = watch::channel(WatcherPhase::Stopped);
        Self {
            augmenter,
            debounce: config.watcher.debounce(),
            style_id: config.markup.style_id.clone(),
            stylesheet: config.markup.stylesheet.clone(),
            phase: Arc::new(phase),
            passes: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    pub fn phase(&self) -> WatcherPhase {
        *self.phase.borrow()
    }

    /// Follow phase changes
    pub fn subscribe(&self) -> watch::Receiver<WatcherPhase> {
        self.phase.subscribe()
    }

    /// Passes run since this watcher was created, the start pass included
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Root of the running watch, if any
    pub fn root(&self) -> Option<NodeId> {
        self.active.as_ref().map(|active| active.root)
    }

    /// Install styling, augment `root` once, then keep it augmented.
    ///
    /// Starting a watcher that is already running, or on a document another
    /// watcher already owns, is rejected and leaves the running watch untouched.
    pub async fn start(&mut self, tree: SharedTree<D>, root: NodeId) -> Result<PassReport> {
        if let Some(active) = &self.active {
            return Err(SyncError::AlreadyRunning(active.root));
        }

        let mut guard = tree.write().await;
        let document_root = guard.root();
        if !guard.contains(document_root, root) {
            return Err(SyncError::DetachedRoot(root));
        }

        // The stylesheet marks the document as owned by a running watcher
        if let Some(style) = guard.find_by_id(&self.style_id) {
            return Err(SyncError::DocumentWatched(style));
        }

        if install_stylesheet(&mut *guard, &self.style_id, &self.stylesheet) {
            debug!("🎨 Installed timestamp stylesheet #{}", self.style_id);
        }
        let report = self.augmenter.augment(&mut *guard, root);
        self.passes.fetch_add(1, Ordering::SeqCst);
        let observer = guard.observe(root, ObserveOptions::content());
        drop(guard);

        let observer_id = observer.id;
        self.phase.send_replace(WatcherPhase::Observing);
        let task = tokio::spawn(debounce_loop(
            tree.clone(),
            root,
            observer,
            self.augmenter.clone(),
            self.debounce,
            self.phase.clone(),
            self.passes.clone(),
        ));

        self.active = Some(ActiveWatch {
            tree,
            root,
            observer: observer_id,
            task,
        });

        info!(
            "👀 Watching {:?} for timestamps ({} markers in {} containers)",
            root, report.markers, report.containers
        );
        Ok(report)
    }

    /// Disconnect, cancel any pending pass, unwrap the markers under the watched
    /// root and remove styling.
    ///
    /// Returns the number of markers unwrapped; stopping a stopped watcher does
    /// nothing and returns 0.
    pub async fn stop(&mut self) -> usize {
        let Some(active) = self.active.take() else {
            debug!("Watcher already stopped");
            return 0;
        };

        active.task.abort();

        let mut guard = active.tree.write().await;
        guard.disconnect(active.observer);
        let unwrapped = self.augmenter.unwrap_markers(&mut *guard, active.root);
        remove_stylesheet(&mut *guard, &self.style_id);
        drop(guard);

        // Cancelled or finished, either way the task is gone
        let _ = active.task.await;
        self.phase.send_replace(WatcherPhase::Stopped);

        info!("🛑 Stopped watching {:?}, unwrapped {} markers", active.root, unwrapped);
        unwrapped
    }
}

impl<D> Drop for MutationWatcher<D> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            // The dropped receiver unregisters itself on the next mutation
            active.task.abort();
        }
    }
}

async fn debounce_loop<D>(
    tree: SharedTree<D>,
    root: NodeId,
    mut observer: MutationObserver,
    augmenter: Arc<Augmenter>,
    debounce: Duration,
    phase: Arc<watch::Sender<WatcherPhase>>,
    passes: Arc<AtomicU64>,
) where
    D: DomTree + MutationSource + Send + Sync + 'static,
{
    loop {
        let Some(record) = observer.records.recv().await else {
            debug!("Observer {:?} disconnected", observer.id);
            return;
        };
        if !record.introduces_content() {
            continue;
        }

        phase.send_replace(WatcherPhase::PendingPass);
        let mut deadline = Instant::now() + debounce;
        loop {
            tokio::select! {
                received = observer.records.recv() => match received {
                    Some(record) => {
                        if record.introduces_content() {
                            deadline = Instant::now() + debounce;
                        }
                    }
                    None => {
                        debug!("Observer {:?} disconnected with a pass pending", observer.id);
                        return;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        {
            let mut guard = tree.write().await;
            // Anything queued so far is covered by this pass
            observer.take_records();
            let report = augmenter.augment(&mut *guard, root);
            let own = observer.take_records();
            passes.fetch_add(1, Ordering::SeqCst);
            debug!(
                "Debounced pass: {} new markers, {} own mutations discarded",
                report.markers, own
            );
        }
        phase.send_replace(WatcherPhase::Observing);
    }
}

/// Add a `<style id=...>` with `css` to the head unless one already exists
pub fn install_stylesheet<D: DomTree + ?Sized>(tree: &mut D, id: &str, css: &str) -> bool {
    if tree.find_by_id(id).is_some() {
        return false;
    }
    let style = tree.create_element("style");
    tree.set_attribute(style, "id", id);
    let rules = tree.create_text(css);
    tree.append_child(style, rules);
    let parent = tree.head().unwrap_or_else(|| tree.root());
    tree.append_child(parent, style);
    true
}

pub fn remove_stylesheet<D: DomTree + ?Sized>(tree: &mut D, id: &str) -> bool {
    match tree.find_by_id(id) {
        Some(style) => {
            tree.remove(style);
            true
        }
        None => false,
    }
}
