use {
    crate::{
        cli::{PassthroughValue, ProgramArgs},
        command::{GroupCommand, OptionValue, XargsCommand},
        error::LogError,
        grouping::BuiltinGrouper,
        harness::Harness,
        tokenizer::tokenize,
    },
    lazy_static::lazy_static,
    std::{fs::File, io::stdin, process::ExitCode},
    tracing::Level,
};

mod cli;
mod command;
mod delimiter;
mod error;
mod grouping;
mod harness;
mod input_prepper;
mod multi_writer;
mod pipeline;
mod process_writer;
mod runner;
mod tokenizer;

mod prelude {
    pub use crate::error::{CrateError, CrateResult};
}

lazy_static! {
    static ref ARGS: ProgramArgs = ProgramArgs::from_cli();
}

const PLACEHOLDER: &str = "{}";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code_to_exit(code),
        Err(e) => {
            e.log(Level::ERROR);
            if e.is_user_attributable() {
                ExitCode::from(3)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn run() -> crate::prelude::CrateResult<i32> {
    let grouper = BuiltinGrouper::parse(ARGS.group_code())
        .map_err(|_| error::Err::UserExpression(ARGS.group_code().to_string()))?;

    // `-d`/`-0` also choose how the tokenizer splits stdin/`--arg-file`
    // (e.g. `find ... -print0 | xargs-groupby -0 ...`), matching the
    // original's `--arg-file`/stdin behavior.
    let tokens = match ARGS.arg_file() {
        Some(path) => tokenize(File::open(path)?, ARGS.delimiter())?,
        None => tokenize(stdin(), ARGS.delimiter())?,
    };

    let inner = GroupCommand::new(ARGS.command().to_vec(), Some(PLACEHOLDER.to_string()));
    let mut xargs = XargsCommand::new(vec!["xargs".to_string()], inner);
    xargs.set_options(ARGS.xargs_passthrough().iter().cloned().map(|(k, v)| {
        let v = match v {
            PassthroughValue::Flag => OptionValue::Flag(true),
            PassthroughValue::Value(s) => OptionValue::Value(s),
        };
        (k, v)
    }));

    let preexec = ARGS
        .preexec()
        .map(|argv| GroupCommand::new(argv.to_vec(), Some(PLACEHOLDER.to_string())));

    let cores = num_cpus();
    let harness = Harness::new(
        preexec,
        xargs,
        ARGS.max_procs().unwrap_or(cores),
        cores,
        ARGS.max_procs(),
        ARGS.delimiter(),
    );

    harness.run(tokens, grouper)
}

fn code_to_exit(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
