//! Public entry points: lower one shader, or a batch of independent shaders
//! on a worker pool.

use std::sync::{Arc, Mutex};

use crate::config::CompileOptions;
use crate::diagnostic::Diagnostic;
use crate::ir::{Shader, SymbolTable};
use crate::pls::rewrite_pixel_local_storage;
use crate::pool::WorkerPool;
use crate::span::Span;


/// One shader to lower: the tree, the symbol table it refers to, and the
/// options to lower it with. A job is owned by exactly one task.
#[derive(Clone, Debug)]
pub struct CompileJob {
    pub shader: Shader,
    pub symbols: SymbolTable,
    pub options: CompileOptions,
}

impl CompileJob {
    pub fn new(shader: Shader, symbols: SymbolTable, options: CompileOptions) -> Self {
        Self {
            shader,
            symbols,
            options,
        }
    }
}

/// Lower pixel local storage in a single job.
pub fn lower(mut job: CompileJob) -> Result<CompileJob, Vec<Diagnostic>> {
    rewrite_pixel_local_storage(&mut job.shader, &mut job.symbols, &job.options)?;
    Ok(job)
}

type JobResult = Result<CompileJob, Vec<Diagnostic>>;

/// Lower every job as its own pool task. Results come back in submission
/// order regardless of completion order.
pub fn lower_all(pool: &dyn WorkerPool, jobs: Vec<CompileJob>) -> Vec<JobResult> {
    let pending: Vec<_> = jobs
        .into_iter()
        .enumerate()
        .map(|(index, job)| {
            let slot: Arc<Mutex<Option<JobResult>>> = Arc::new(Mutex::new(None));
            let output = slot.clone();
            let waitable = pool.post(Box::new(move || {
                let _span = tracing::debug_span!("job", index).entered();
                let result = lower(job);
                *output.lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
            }));
            (index, slot, waitable)
        })
        .collect();

    pending
        .into_iter()
        .map(|(index, slot, waitable)| {
            waitable.wait();
            let result = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
            result.unwrap_or_else(|| {
                Err(vec![Diagnostic::error(
                    format!("internal error: job {} did not produce a result", index),
                    Span::dummy(),
                )])
            })
        })
        .collect()
}
