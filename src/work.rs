// imports
use crate::error::{Error, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use log::info;
use rayon::ThreadPoolBuilder;

/// How often (in claimed units) progress is reported.
const PROGRESS_EVERY: usize = 100;

struct Cursor<I> {
    units: I,
    claimed: usize,
}

/// A shared cursor over the work units. Claiming the next unit is the only
/// step done under the lock; the unit itself is processed after release.
pub struct WorkQueue<I> {
    cursor: Mutex<Cursor<I>>,
    halted: AtomicBool,
    label: &'static str,
    total: Option<usize>,
}

impl<I: Iterator> WorkQueue<I> {

    pub fn new(label: &'static str, units: I, total: Option<usize>) -> Self {
        Self {
            cursor: Mutex::new(Cursor { units, claimed: 0 }),
            halted: AtomicBool::new(false),
            label,
            total,
        }
    }

    /// Takes the next unit, or `None` once the units are exhausted or the
    /// queue was halted.
    pub fn claim(&self) -> Option<I::Item> {
        if self.halted.load(Ordering::Relaxed) {
            return None;
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unit = cursor.units.next()?;
        if cursor.claimed % PROGRESS_EVERY == 0 {
            match self.total {
                Some(total) if total > 0 => info!("processing {}: {}/{} ({}%)",
                    self.label, cursor.claimed, total, 100 * cursor.claimed / total),
                _ => info!("processing {}: {}", self.label, cursor.claimed),
            }
        }
        cursor.claimed += 1;
        Some(unit)
    }

    /// Makes every worker stop at its next claim.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }

    pub fn claimed(&self) -> usize {
        self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).claimed
    }
}


/// Runs `job` over every unit with `workers` threads, each unit handed to
/// exactly one worker. The first failing unit stops the others and its
/// error is returned. Returns the number of units claimed.
pub fn distribute<I, F>(label: &'static str,
    units: I,
    total: Option<usize>,
    workers: usize,
    job: F) -> Result<usize>
where
    I: Iterator + Send,
    I::Item: Send,
    F: Fn(I::Item) -> Result<()> + Sync,
{
    if workers == 0 {
        return Err(Error::config("the number of threads must be a positive integer"));
    }

    let queue = WorkQueue::new(label, units, total);
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    let work = || {
        while let Some(unit) = queue.claim() {
            if let Err(e) = job(unit) {
                queue.halt();
                let mut failure = failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                failure.get_or_insert(e);
                break;
            }
        }
    };

    if workers == 1 {
        info!("not using threads for {}", label);
        work();
    } else {
        info!("running {} with {} threads", label, workers);
        let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| work());
            }
        });
    }

    let claimed = queue.claimed();
    match failure.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()) {
        Some(e) => Err(e),
        None => Ok(claimed),
    }
}
