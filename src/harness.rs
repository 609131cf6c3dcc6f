//! Aggregate harness: wires the external collaborators (tokenizer,
//! grouping callable, command template sources) to `PipelineRunner` and
//! computes the final exit code.

use crate::{
    command::{GroupCommand, XargsCommand},
    error::CrateResult,
    grouping::{GroupKey, Grouper},
    input_prepper::{Encoding, InputPrepper},
    pipeline::{ProcessPipeline, StageIter, StageSource},
    runner::PipelineRunner,
};

/// Optional per-group pre-command template, run before the main xargs
/// fan-out stage.
pub struct Harness {
    preexec: Option<GroupCommand>,
    xargs: XargsCommand,
    max_procs: usize,
    cores: usize,
    max_procs_override: Option<usize>,
    fixed_delimiter: Option<u8>,
}

impl Harness {
    /// `max_procs` is the scheduler's admission cap; `cores`
    /// and `max_procs_override` feed `XargsCommand::set_parallel` once
    /// the group count is known, since that count only exists after
    /// bucketing the tokens below. `fixed_delimiter` is the user-supplied
    /// `-d`/`-0` byte, when given, bypassing auto-selection entirely.
    pub fn new(
        preexec: Option<GroupCommand>,
        xargs: XargsCommand,
        max_procs: usize,
        cores: usize,
        max_procs_override: Option<usize>,
        fixed_delimiter: Option<u8>,
    ) -> Self {
        Self {
            preexec,
            xargs,
            max_procs,
            cores,
            max_procs_override,
            fixed_delimiter,
        }
    }

    /// Runs tokens through grouping/bucketing, builds one pipeline per
    /// group, drains them through the runner, and returns the process
    /// exit code.
    pub fn run<G, I>(&self, tokens: I, grouper: G) -> CrateResult<i32>
    where
        G: Grouper,
        I: IntoIterator<Item = String>,
    {
        let mut prepper = InputPrepper::new(grouper, self.fixed_delimiter, Encoding);
        for token in tokens {
            prepper.add(&token)?;
        }

        let keys: Vec<GroupKey> = prepper.keys().cloned().collect();

        let mut xargs = self.xargs.clone();
        match self.max_procs_override {
            Some(n) => xargs.set_max_procs_override(n),
            None => xargs.set_parallel(self.cores, keys.len()),
        }

        let mut runner = PipelineRunner::new(self.max_procs);

        let pipelines: Vec<ProcessPipeline> = keys
            .iter()
            .map(|key| self.build_pipeline(key, &prepper, &xargs))
            .collect::<CrateResult<_>>()?;

        runner.run(pipelines)?;
        Ok(exit_code(runner.run_count(), runner.failures_count()))
    }

    fn build_pipeline(
        &self,
        key: &GroupKey,
        prepper: &InputPrepper<impl Grouper>,
        xargs: &XargsCommand,
    ) -> CrateResult<ProcessPipeline> {
        let bucket = prepper.bucket(key).unwrap_or(&[]).to_vec();
        let delimiter = prepper.delimiter(Some(key))?;

        // The chosen delimiter can vary per bucket in per-bucket mode, so
        // the rendered `--delimiter` switch is set fresh for each group.
        let mut xargs = xargs.clone();
        xargs.set_delimiter(delimiter);

        let mut stages: Vec<StageSource> = Vec::new();
        if let Some(preexec) = &self.preexec {
            stages.push(StageSource {
                argv: preexec.render(key),
                tokens: Box::new(std::iter::empty()),
                separator: None,
            });
        }
        stages.push(StageSource {
            argv: xargs.render(key),
            tokens: Box::new(bucket.into_iter()),
            separator: Some(delimiter),
        });

        let iter: StageIter = Box::new(stages.into_iter());
        Ok(ProcessPipeline::new(iter))
    }
}

/// Aggregate exit code, computed from `run_count`/`failures_count`.
pub fn exit_code(run_count: usize, failures_count: usize) -> i32 {
    if failures_count == 0 {
        0
    } else if failures_count == run_count {
        100
    } else {
        std::cmp::min(10 + failures_count as i32, 99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::BuiltinGrouper;

    /// S2: a preexec stage rendered with the group-key placeholder, then
    /// a main stage whose bucket is piped to the fan-out command's
    /// stdin. Both groups ("123" and "456" by 3-char prefix) must run
    /// their preexec before the xargs stage and succeed end to end.
    #[test]
    fn preexec_then_xargs_stage_runs_in_order() {
        let preexec = GroupCommand::new(
            vec!["echo".into(), "group:".into(), "{G}".into()],
            Some("{G}".into()),
        );
        let inner = GroupCommand::new(vec!["echo".into()], None);
        let xargs = XargsCommand::new(vec!["xargs".into()], inner);
        let harness = Harness::new(Some(preexec), xargs, 2, 2, None, None);

        let tokens = vec![
            "123".to_string(),
            "456".to_string(),
            "123\t456".to_string(),
            "456789".to_string(),
        ];
        let code = harness.run(tokens, BuiltinGrouper::Prefix(3)).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn zero_failures_is_success() {
        assert_eq!(exit_code(4, 0), 0);
    }

    #[test]
    fn zero_admitted_is_success() {
        assert_eq!(exit_code(0, 0), 0);
    }

    #[test]
    fn total_failure_is_100() {
        assert_eq!(exit_code(3, 3), 100);
    }

    #[test]
    fn partial_failure_yields_offset_exit_code() {
        assert_eq!(exit_code(4, 2), 12);
    }

    #[test]
    fn failures_count_is_clamped_to_99() {
        assert_eq!(exit_code(1000, 500), 99);
    }
}
