//! ProcessPipeline: sequential driver for the stages of a single
//! group's pipeline.

use crate::{
    error::{CrateError, LogError},
    multi_writer::SharedWriter,
    process_writer::{ProcessWriter, TokenIter},
};
use std::{cell::RefCell, rc::Rc};

/// One stage descriptor: argv, the byte source feeding its stdin, and
/// an optional separator.
pub struct StageSource {
    pub argv: Vec<String>,
    pub tokens: TokenIter,
    pub separator: Option<u8>,
}

pub type StageIter = Box<dyn Iterator<Item = StageSource>>;

/// What `advance()` produced.
pub enum Advance {
    /// A new stage was spawned; here's its writer.
    Writer(SharedWriter),
    /// The pipeline has no more stages to run, one way or another.
    Finished,
}

/// Pending -> Running (one stage at a time) -> Finished(success).
pub struct ProcessPipeline {
    stages: StageIter,
    last_writer: Option<SharedWriter>,
    success: Option<bool>,
}

impl ProcessPipeline {
    pub fn new(stages: StageIter) -> Self {
        Self {
            stages,
            last_writer: None,
            success: None,
        }
    }

    /// The single public driver operation. At most one stage writer
    /// exists at any time; a stage is launched only after its
    /// predecessor reports success. A stage that fails to spawn (missing
    /// or non-executable binary) counts as a failed stage rather than
    /// aborting the caller — per spec §4.8/§7, `UserCommandError` only
    /// ever aborts the owning pipeline, never the scheduler.
    pub fn advance(&mut self) -> Result<Advance, CrateError> {
        if self.success.is_some() {
            return Ok(Advance::Finished);
        }

        if let Some(writer) = &self.last_writer {
            let ok = writer.borrow_mut().success();
            if !ok {
                self.success = Some(false);
                return Ok(Advance::Finished);
            }
        }

        match self.stages.next() {
            None => {
                self.success = Some(true);
                Ok(Advance::Finished)
            }
            Some(stage) => {
                match ProcessWriter::spawn(&stage.argv, stage.tokens, stage.separator) {
                    Ok(writer) => {
                        let shared = Rc::new(RefCell::new(writer));
                        self.last_writer = Some(shared.clone());
                        Ok(Advance::Writer(shared))
                    }
                    Err(e) => {
                        e.log(tracing::Level::WARN);
                        self.success = Some(false);
                        Ok(Advance::Finished)
                    }
                }
            }
        }
    }

    pub fn success(&self) -> Option<bool> {
        self.success
    }

    /// Peeks at the current stage's exit status without advancing.
    /// `None` means the stage hasn't exited yet (or there is no current
    /// stage); callers should not call `advance()` in that case, since
    /// `advance()` would otherwise misread "still running" as failure.
    pub fn current_poll(&mut self) -> Option<i32> {
        self.last_writer.as_ref()?.borrow_mut().poll()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(argv: &str, tokens: &[&str]) -> StageSource {
        let tokens: Vec<Vec<u8>> = tokens.iter().map(|s| s.as_bytes().to_vec()).collect();
        StageSource {
            argv: vec![argv.to_string()],
            tokens: Box::new(tokens.into_iter()),
            separator: Some(0),
        }
    }

    fn wait_for_exit(writer: &SharedWriter) {
        loop {
            if writer.borrow_mut().poll().is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    #[test]
    fn one_step_pipeline_succeeds() {
        let stages: StageIter = Box::new(vec![stage("true", &[])].into_iter());
        let mut pipeline = ProcessPipeline::new(stages);
        match pipeline.advance().unwrap() {
            Advance::Writer(w) => wait_for_exit(&w),
            Advance::Finished => panic!("expected a writer"),
        }
        match pipeline.advance().unwrap() {
            Advance::Finished => (),
            Advance::Writer(_) => panic!("expected end of pipeline"),
        }
        assert_eq!(pipeline.success(), Some(true));
    }

    #[test]
    fn first_step_failing_skips_the_second() {
        let stages: StageIter = Box::new(
            vec![stage("false", &[]), stage("true", &[])].into_iter(),
        );
        let mut pipeline = ProcessPipeline::new(stages);
        let w1 = match pipeline.advance().unwrap() {
            Advance::Writer(w) => w,
            Advance::Finished => panic!("expected a writer"),
        };
        wait_for_exit(&w1);
        match pipeline.advance().unwrap() {
            Advance::Finished => (),
            Advance::Writer(_) => panic!("stage 2 must never spawn after stage 1 fails"),
        }
        assert_eq!(pipeline.success(), Some(false));
    }

    #[test]
    fn spawn_failure_is_counted_as_a_failed_stage_not_propagated() {
        let stages: StageIter = Box::new(
            vec![stage("no-such-binary-xyz", &[]), stage("true", &[])].into_iter(),
        );
        let mut pipeline = ProcessPipeline::new(stages);
        match pipeline.advance().unwrap() {
            Advance::Finished => (),
            Advance::Writer(_) => panic!("a missing binary must not produce a writer"),
        }
        assert_eq!(pipeline.success(), Some(false));
    }
}
