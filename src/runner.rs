//! PipelineRunner: top-level scheduler — admission, poll loop,
//! completion accounting.

use crate::{
    error::{CrateResult, LogError},
    multi_writer::MultiProcessWriter,
    pipeline::{Advance, ProcessPipeline},
};
use std::time::Duration;
use tracing::{debug, trace};

/// The sub-second bound used in the "some pipelines are between stages"
/// branch of `write_ready_phase`, so control returns to the advance
/// phase promptly. Not a user-visible timeout; see DESIGN.md's Open
/// Question notes for why this is a tunable rather than load-tested.
const BETWEEN_STAGES_POLL: Duration = Duration::from_millis(100);

pub struct PipelineRunner {
    max_procs: usize,
    multi_writer: MultiProcessWriter,
    run_count: usize,
    failures_count: usize,
}

impl PipelineRunner {
    pub fn new(max_procs: usize) -> Self {
        Self {
            max_procs: max_procs.max(1),
            multi_writer: MultiProcessWriter::new(),
            run_count: 0,
            failures_count: 0,
        }
    }

    /// The sole entry point. Drains `pipelines` to completion; results
    /// are read back via `run_count()`/`failures_count()`.
    pub fn run(&mut self, pipelines: impl IntoIterator<Item = ProcessPipeline>) -> CrateResult<()> {
        let mut pending = pipelines.into_iter();
        let mut running: Vec<ProcessPipeline> = Vec::new();

        loop {
            self.start_pipelines(&mut pending, &mut running)?;
            if running.is_empty() {
                break;
            }
            self.write_ready_phase(running.len())?;
            self.advance_pipelines(&mut running)?;
        }
        Ok(())
    }

    fn start_pipelines(
        &mut self,
        pending: &mut impl Iterator<Item = ProcessPipeline>,
        running: &mut Vec<ProcessPipeline>,
    ) -> CrateResult<()> {
        while running.len() < self.max_procs {
            let Some(mut pipeline) = pending.next() else {
                break;
            };
            self.run_count += 1;
            match pipeline.advance().log(tracing::Level::DEBUG)? {
                Advance::Writer(w) => {
                    self.multi_writer.add(w);
                    running.push(pipeline);
                    trace!(
                        running = running.len(),
                        max_procs = self.max_procs,
                        "admitted pipeline"
                    );
                }
                Advance::Finished => {
                    // A pipeline with zero stages finishes on admission
                    // without ever needing to run.
                    if pipeline.success() == Some(false) {
                        self.failures_count += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Three cases: nobody writing (return immediately so
    /// advance can reap between-stage pipelines); some writing (poll
    /// with a bounded timeout); everybody writing (block until at least
    /// one finishes).
    fn write_ready_phase(&mut self, running_count: usize) -> CrateResult<()> {
        loop {
            let writing = self.multi_writer.writing_count();
            if writing == 0 {
                return Ok(());
            } else if writing < running_count {
                return self.multi_writer.write_ready(Some(BETWEEN_STAGES_POLL));
            } else {
                self.multi_writer.write_ready(None)?;
                if self.multi_writer.writing_count() < running_count {
                    return Ok(());
                }
            }
        }
    }

    fn advance_pipelines(&mut self, running: &mut Vec<ProcessPipeline>) -> CrateResult<()> {
        let mut i = 0;
        while i < running.len() {
            if running[i].current_poll().is_none() {
                i += 1;
                continue;
            }
            match running[i].advance().log(tracing::Level::DEBUG)? {
                Advance::Writer(w) => {
                    self.multi_writer.add(w);
                    i += 1;
                }
                Advance::Finished => {
                    if running[i].success() == Some(false) {
                        self.failures_count += 1;
                    }
                    running.swap_remove(i);
                }
            }
        }
        debug!(
            run_count = self.run_count,
            failures_count = self.failures_count,
            "advanced pipelines"
        );
        Ok(())
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    pub fn failures_count(&self) -> usize {
        self.failures_count
    }
}
