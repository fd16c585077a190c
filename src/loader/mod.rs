/// Background page loading
///
/// Pages are read (not decoded) by a pool of worker threads as soon as a book
/// is opened. Each worker owns a share of the pages and always loads the ones
/// the reader is looking at first, then the following ones.

pub mod slots;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crate::sources::{PageData, PageSource, SourceError};
use slots::PageSlots;

/// Upper bound on loader threads, whatever the core count
pub const MAX_LOADER_THREADS: usize = 16;

/// Outcome of loading one page
pub type LoadedPage = Result<Arc<PageData>, Arc<SourceError>>;

/// Pool of threads filling the pages of a book
pub struct PageLoader {
    total_pages: usize,
    pages: Arc<RwLock<PageSlots<LoadedPage>>>,
    /// Setting this to `true` makes the workers stop after their current page
    stop_signal: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl PageLoader {
    /// A loader for a book without pages, no thread is started
    pub fn idle() -> Self {
        Self {
            total_pages: 0,
            pages: Arc::new(RwLock::new(PageSlots::new(0))),
            stop_signal: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Start loading every page of `source`
    ///
    /// `current_page` is shared with the reader and decides which pages
    /// are loaded first.
    pub fn start(
        source: &dyn PageSource,
        current_page: Arc<AtomicUsize>,
    ) -> Result<Self, SourceError> {
        let cores = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        Self::start_with_threads(source, current_page, cores.min(MAX_LOADER_THREADS))
    }

    /// Start loading with at most `max_threads` workers
    pub fn start_with_threads(
        source: &dyn PageSource,
        current_page: Arc<AtomicUsize>,
        max_threads: usize,
    ) -> Result<Self, SourceError> {
        let total_pages = source.total_pages();
        let threads_count = max_threads.max(1).min(total_pages);

        // Any early return drops `loader`, which stops the workers already spawned
        let mut loader = Self {
            total_pages,
            pages: Arc::new(RwLock::new(PageSlots::new(total_pages))),
            stop_signal: Arc::new(AtomicBool::new(false)),
            handles: Vec::with_capacity(threads_count),
        };

        for thread_num in 0..threads_count {
            let worker_source = source.try_clone()?;

            // Worker n loads pages (threads_count * k) + n
            // e.g. with 8 threads, worker 4 loads pages 4, 12, 20, ...
            let pending = (0..total_pages)
                .filter(|page| page % threads_count == thread_num)
                .collect::<Vec<_>>();

            let pages = Arc::clone(&loader.pages);
            let stop_signal = Arc::clone(&loader.stop_signal);
            let current_page = Arc::clone(&current_page);

            let handle = thread::Builder::new()
                .name(format!("page-loader-{thread_num}"))
                .spawn(move || run_worker(worker_source, pending, pages, current_page, stop_signal))
                .map_err(SourceError::Spawn)?;

            loader.handles.push(handle);
        }

        tracing::debug!(
            "Loading {} pages with {} threads",
            total_pages,
            threads_count
        );

        Ok(loader)
    }

    /// Loading result for a page, `None` while it is still pending
    pub fn get(&self, page: usize) -> Option<LoadedPage> {
        let slots = self.pages.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.get(page).cloned()
    }

    /// Number of pages loaded so far (successfully or not)
    pub fn loaded_count(&self) -> usize {
        let slots = self.pages.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.filled()
    }

    pub fn is_complete(&self) -> bool {
        self.loaded_count() == self.total_pages
    }

    /// Stop all workers and wait for them to exit
    pub fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::Release);

        while let Some(handle) = self.handles.pop() {
            if handle.join().is_err() {
                tracing::error!("A page loader thread panicked");
            }
        }
    }
}

impl Drop for PageLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageLoader")
            .field("total_pages", &self.total_pages)
            .field("threads", &self.handles.len())
            .finish()
    }
}

/// Pick the next page a worker should load
///
/// The first pending page at or after the current one wins, so the pages the
/// user is looking at come first. Once all of those are loaded, the worker
/// goes back to the earliest pending page. `pending` must be sorted.
pub fn next_page_to_load(pending: &mut Vec<usize>, current_page: usize) -> Option<usize> {
    if pending.is_empty() {
        return None;
    }

    let index = pending
        .iter()
        .position(|page| *page >= current_page)
        .unwrap_or(0);

    Some(pending.remove(index))
}

fn run_worker(
    mut source: Box<dyn PageSource>,
    mut pending: Vec<usize>,
    pages: Arc<RwLock<PageSlots<LoadedPage>>>,
    current_page: Arc<AtomicUsize>,
    stop_signal: Arc<AtomicBool>,
) {
    loop {
        if stop_signal.load(Ordering::Acquire) {
            return;
        }

        let Some(page) = next_page_to_load(&mut pending, current_page.load(Ordering::Acquire))
        else {
            return;
        };

        let loaded = source.load_page(page).map(Arc::new).map_err(|err| {
            tracing::warn!("Failed to load page {}: {}", page, err);
            Arc::new(err)
        });

        // The lock is only held for the insertion
        pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set(page, loaded);
    }
}
