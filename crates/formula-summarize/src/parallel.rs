#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::ThreadPool;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::sync::OnceLock;

/// Best-effort Rayon thread pool for chunk scans.
///
/// Rayon normally uses a **global** thread pool. Under extreme resource constraints (e.g. many test
/// binaries running concurrently on a multi-agent host), global pool initialization can fail and
/// Rayon will panic on first use.
///
/// To keep scans resilient, we build and use a crate-local pool instead. If we can't create a
/// pool, chunks are scanned one after another on the calling thread.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
static RAYON_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn env_threads(var: &str) -> Option<usize> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

/// Number of worker threads scans should use.
pub(crate) fn desired_threads() -> usize {
    env_threads("FORMULA_SUMMARIZE_THREADS")
        .or_else(|| env_threads("RAYON_NUM_THREADS"))
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn build_rayon_pool() -> Option<ThreadPool> {
    let requested = desired_threads().max(1);
    let try_build = |n| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|idx| format!("formula-summarize-{idx}"))
            .build()
    };

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(err) if requested > 1 => {
            log::warn!("failed to build {requested}-thread scan pool ({err}); retrying with 1");
            try_build(1).ok()
        }
        Err(err) => {
            log::warn!("failed to build scan pool ({err}); scanning sequentially");
            None
        }
    }
}

/// Returns the crate-local Rayon thread pool, if one could be created.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
pub(crate) fn rayon_pool() -> Option<&'static ThreadPool> {
    RAYON_POOL.get_or_init(build_rayon_pool).as_ref()
}

/// Number of workers actually available to a scan.
pub(crate) fn worker_count() -> usize {
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    {
        rayon_pool().map_or(1, |pool| pool.current_num_threads())
    }
    #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
    {
        1
    }
}

/// Run `f` once per slice and return the results in slice order.
///
/// Every slice gets its own task; the call returns only after all tasks finished. A panic in any
/// task is re-raised on the calling thread after the others complete.
pub(crate) fn map_slices<'s, T, R, F>(slices: &[&'s [T]], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &'s [T]) -> R + Sync,
{
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    if slices.len() > 1 {
        if let Some(pool) = rayon_pool() {
            let mut out: Vec<Option<R>> = slices.iter().map(|_| None).collect();
            let f = &f;
            pool.scope(|scope| {
                for ((idx, slice), slot) in slices.iter().enumerate().zip(out.iter_mut()) {
                    let slice: &'s [T] = *slice;
                    scope.spawn(move |_| *slot = Some(f(idx, slice)));
                }
            });
            return out.into_iter().flatten().collect();
        }
    }

    slices
        .iter()
        .enumerate()
        .map(|(idx, &slice)| f(idx, slice))
        .collect()
}
