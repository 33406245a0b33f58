//! Work distribution across independent workers

use crate::types::DebrisResult;

/// Split items into `n` nearly equal slices.
///
/// Ordered splitting keeps contiguous runs of the input; unordered splitting
/// deals items round-robin. Slice sizes differ by at most one and empty
/// slices are dropped.
pub fn split_list<T: Clone>(items: &[T], n: usize, ordered: bool) -> Vec<Vec<T>> {
    let n = n.max(1).min(items.len().max(1));
    let mut slices: Vec<Vec<T>> = vec![Vec::new(); n];

    if ordered {
        let base = items.len() / n;
        let extra = items.len() % n;
        let mut start = 0;
        for (i, slice) in slices.iter_mut().enumerate() {
            let size = base + usize::from(i < extra);
            slice.extend_from_slice(&items[start..start + size]);
            start += size;
        }
    } else {
        for (i, item) in items.iter().enumerate() {
            slices[i % n].push(item.clone());
        }
    }

    slices.retain(|s| !s.is_empty());
    slices
}

/// Contiguous share `batchno` of `items` when the list is divided into
/// `batches` independent invocations. A batch number past the last non-empty
/// share yields an empty list.
pub fn select_batch<T: Clone>(items: &[T], batches: usize, batchno: usize) -> Vec<T> {
    if batches <= 1 {
        return items.to_vec();
    }
    split_list(items, batches, true)
        .into_iter()
        .nth(batchno)
        .unwrap_or_default()
}

/// Run `worker` on every slice and collect one result per slice, in slice order.
///
/// Workers share no mutable state; a failure inside one worker is carried in
/// its own result and never affects the others.
pub fn run_worker_slices<T, R, F>(
    slices: &[Vec<T>],
    num_threads: usize,
    parallel: bool,
    worker: F,
) -> DebrisResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &[T]) -> R + Sync,
{
    if parallel && slices.len() > 1 {
        run_parallel(slices, num_threads, worker)
    } else {
        Ok(run_sequential(slices, worker))
    }
}

fn run_sequential<T, R, F>(slices: &[Vec<T>], worker: F) -> Vec<R>
where
    F: Fn(usize, &[T]) -> R,
{
    slices
        .iter()
        .enumerate()
        .map(|(i, slice)| worker(i, slice))
        .collect()
}

#[cfg(feature = "parallel")]
fn run_parallel<T, R, F>(slices: &[Vec<T>], num_threads: usize, worker: F) -> DebrisResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &[T]) -> R + Sync,
{
    use rayon::prelude::*;
    use crate::types::DebrisError;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| DebrisError::Processing(format!("Failed to build worker pool: {}", e)))?;
    log::debug!("Worker pool with {} threads", pool.current_num_threads());

    Ok(pool.install(|| {
        slices
            .par_iter()
            .enumerate()
            .map(|(i, slice)| worker(i, slice))
            .collect()
    }))
}

#[cfg(not(feature = "parallel"))]
fn run_parallel<T, R, F>(slices: &[Vec<T>], _num_threads: usize, worker: F) -> DebrisResult<Vec<R>>
where
    F: Fn(usize, &[T]) -> R,
{
    log::warn!("Built without the parallel feature, running workers sequentially");
    Ok(run_sequential(slices, worker))
}
