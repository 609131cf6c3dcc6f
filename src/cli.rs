#![allow(deprecated)]
//! Command-line flag parsing. This is plumbing that exists so the
//! binary is runnable; the core dispatcher itself never looks at
//! `clap` types directly.

use {
    clap::{crate_version, App, Arg, ArgMatches},
    std::path::PathBuf,
};

pub struct ProgramArgs {
    group_code: String,
    command: Vec<String>,
    preexec: Option<Vec<String>>,
    delimiter: Option<u8>,
    arg_file: Option<PathBuf>,
    max_procs: Option<usize>,
    xargs_passthrough: Vec<(String, PassthroughValue)>,
}

/// A single xargs passthrough switch, gathered from the CLI and handed
/// to `XargsCommand::set_options` as-is.
#[derive(Debug, Clone)]
pub enum PassthroughValue {
    Flag,
    Value(String),
}

pub fn generate_cli<'a, 'b>() -> App<'a, 'b> {
    App::new("xargs-groupby")
        .about("Partitions input into groups, then runs a command once per group in parallel")
        .version(crate_version!())
        .arg(
            Arg::with_name("arg_file")
                .long("arg-file")
                .short("a")
                .takes_value(true)
                .value_name("FILE")
                .help("Read arguments from FILE instead of stdin"),
        )
        .arg(
            Arg::with_name("delimiter")
                .long("delimiter")
                .short("d")
                .takes_value(true)
                .value_name("CHAR")
                .conflicts_with("null")
                .help("Separator byte for arguments; auto-selected when omitted"),
        )
        .arg(
            Arg::with_name("null")
                .long("null")
                .short("0")
                .help("Use the null byte as the delimiter"),
        )
        .arg(
            Arg::with_name("max_procs")
                .long("max-procs")
                .short("P")
                .takes_value(true)
                .value_name("NUM")
                .help("Override the automatic --max-procs passed to the fan-out command"),
        )
        .arg(
            Arg::with_name("exit")
                .long("exit")
                .short("x")
                .help("xargs passthrough: exit if a command exceeds --max-chars"),
        )
        .arg(
            Arg::with_name("replace")
                .long("replace")
                .short("I")
                .takes_value(true)
                .value_name("STR")
                .help("xargs passthrough: replace this string in the command with arguments"),
        )
        .arg(
            Arg::with_name("interactive")
                .long("interactive")
                .short("p")
                .help("xargs passthrough: prompt user before running commands"),
        )
        .arg(
            Arg::with_name("max_args")
                .long("max-args")
                .short("n")
                .takes_value(true)
                .value_name("NUM")
                .help("xargs passthrough: maximum number of arguments per command line"),
        )
        .arg(
            Arg::with_name("max_chars")
                .long("max-chars")
                .short("s")
                .takes_value(true)
                .value_name("NUM")
                .help("xargs passthrough: maximum number of characters per command line"),
        )
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .short("t")
                .help("xargs passthrough: write commands to stderr before executing"),
        )
        .arg(
            Arg::with_name("preexec")
                .long("preexec")
                .visible_alias("pre")
                .takes_value(true)
                .multiple(true)
                .value_name("COMMAND")
                .help("Command to run per group before the main command, terminated with --"),
        )
        .arg(
            Arg::with_name("group_code")
                .required(true)
                .value_name("GROUP")
                .help("Built-in grouping function: len, lower, identity, ext, or prefix:N"),
        )
        .arg(
            Arg::with_name("command")
                .required(true)
                .multiple(true)
                .last(true)
                .value_name("COMMAND")
                .help("Command to run per group, with the grouped arguments on stdin"),
        )
}

impl ProgramArgs {
    pub fn from_cli() -> Self {
        Self::init(generate_cli())
    }

    /// Retains relevant user defined config settings gathered from the CLI
    pub fn init(cli: App<'_, '_>) -> Self {
        Self::init_from_matches(cli.get_matches())
    }

    fn init_from_matches(store: ArgMatches<'_>) -> Self {
        let group_code = store.value_of("group_code").unwrap().to_string();
        let command = store
            .values_of("command")
            .unwrap()
            .map(str::to_string)
            .collect();
        let preexec = store
            .values_of("preexec")
            .map(|vals| vals.map(str::to_string).collect());
        let arg_file = store.value_of("arg_file").map(PathBuf::from);
        let max_procs = store.value_of("max_procs").map(|v| v.parse().unwrap_or(1));
        let delimiter = if store.is_present("null") {
            Some(0u8)
        } else {
            store.value_of("delimiter").map(parse_delimiter)
        };

        let mut xargs_passthrough = Vec::new();
        if store.is_present("exit") {
            xargs_passthrough.push(("-x".to_string(), PassthroughValue::Flag));
        }
        if let Some(v) = store.value_of("replace") {
            xargs_passthrough.push(("-I".to_string(), PassthroughValue::Value(v.to_string())));
        }
        if store.is_present("interactive") {
            xargs_passthrough.push(("-p".to_string(), PassthroughValue::Flag));
        }
        if let Some(v) = store.value_of("max_args") {
            xargs_passthrough.push(("-n".to_string(), PassthroughValue::Value(v.to_string())));
        }
        if let Some(v) = store.value_of("max_chars") {
            xargs_passthrough.push(("-s".to_string(), PassthroughValue::Value(v.to_string())));
        }
        if store.is_present("verbose") {
            xargs_passthrough.push(("-t".to_string(), PassthroughValue::Flag));
        }

        Self {
            group_code,
            command,
            preexec,
            delimiter,
            arg_file,
            max_procs,
            xargs_passthrough,
        }
    }

    pub fn group_code(&self) -> &str {
        &self.group_code
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn preexec(&self) -> Option<&[String]> {
        self.preexec.as_deref()
    }

    pub fn delimiter(&self) -> Option<u8> {
        self.delimiter
    }

    pub fn arg_file(&self) -> Option<&PathBuf> {
        self.arg_file.as_ref()
    }

    pub fn max_procs(&self) -> Option<usize> {
        self.max_procs
    }

    pub fn xargs_passthrough(&self) -> &[(String, PassthroughValue)] {
        &self.xargs_passthrough
    }
}

/// Accepts a literal single byte, or a handful of common backslash
/// escapes (`\0`, `\n`, `\t`, `\r`), matching the original's delimiter
/// syntax.
fn parse_delimiter(raw: &str) -> u8 {
    match raw {
        r"\0" => 0,
        r"\n" => b'\n',
        r"\t" => b'\t',
        r"\r" => b'\r',
        other => other.as_bytes().first().copied().unwrap_or(0),
    }
}
