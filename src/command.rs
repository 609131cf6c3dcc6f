//! GroupCommand and XargsCommand: command template rendering.

use crate::grouping::GroupKey;
use indexmap::IndexMap;

/// An immutable list of argument strings plus an optional placeholder.
/// Rendering substitutes the group key everywhere the placeholder
/// occurs; absent a placeholder, the template is returned verbatim as a
/// freshly owned copy.
#[derive(Debug, Clone)]
pub struct GroupCommand {
    template: Vec<String>,
    placeholder: Option<String>,
}

impl GroupCommand {
    pub fn new(template: Vec<String>, placeholder: Option<String>) -> Self {
        Self {
            template,
            placeholder,
        }
    }

    pub fn render(&self, key: &GroupKey) -> Vec<String> {
        match &self.placeholder {
            None => self.template.clone(),
            Some(ph) => {
                let value = key.as_template_value();
                self.template
                    .iter()
                    .map(|arg| arg.replace(ph.as_str(), &value))
                    .collect()
            }
        }
    }
}

/// A single passthrough switch value, as accepted by `set_options`.
#[derive(Debug, Clone)]
pub enum OptionValue {
    Flag(bool),
    Value(String),
}

/// Renders the fan-out `xargs`-style command: base argv, `--max-procs`,
/// `--delimiter`, user passthrough switches, then the inner
/// `GroupCommand`'s rendered arguments.
#[derive(Debug, Clone)]
pub struct XargsCommand {
    xargs_base: Vec<String>,
    inner: GroupCommand,
    switches: IndexMap<String, Option<String>>,
}

impl XargsCommand {
    pub fn new(xargs_base: Vec<String>, inner: GroupCommand) -> Self {
        let mut switches = IndexMap::new();
        switches.insert("--max-procs".to_string(), Some("1".to_string()));
        Self {
            xargs_base,
            inner,
            switches,
        }
    }

    /// `--max-procs = max(1, cores / groups)`; leaves the default of `1`
    /// when `groups == 0`.
    pub fn set_parallel(&mut self, cores: usize, groups: usize) {
        if groups == 0 {
            return;
        }
        let max_procs = std::cmp::max(1, cores / groups);
        self.switches
            .insert("--max-procs".to_string(), Some(max_procs.to_string()));
    }

    /// Overrides `--max-procs` with an explicit value, bypassing the
    /// `cores / groups` formula (used when the caller passed `-P` on the
    /// command line rather than relying on automatic scaling).
    pub fn set_max_procs_override(&mut self, max_procs: usize) {
        self.switches
            .insert("--max-procs".to_string(), Some(max_procs.to_string()));
    }

    /// Stores the delimiter as `--delimiter=\NNN` (three-digit octal).
    pub fn set_delimiter(&mut self, byte: u8) {
        self.switches.insert(
            "--delimiter".to_string(),
            Some(format!("\\{:03o}", byte)),
        );
    }

    /// Merges user passthrough switches: bare flags for booleans (when
    /// true), `--key=value` for long options, `-kvalue` for short
    /// (single-character) options. Unset/false values are skipped.
    pub fn set_options(&mut self, opts: impl IntoIterator<Item = (String, OptionValue)>) {
        for (key, value) in opts {
            match value {
                OptionValue::Flag(false) => {
                    self.switches.shift_remove(&key);
                }
                OptionValue::Flag(true) => {
                    self.switches.insert(key, None);
                }
                OptionValue::Value(v) => {
                    self.switches.insert(key, Some(v));
                }
            }
        }
    }

    fn render_switches(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.switches.len());
        for (key, value) in &self.switches {
            match value {
                None => out.push(key.clone()),
                Some(v) => {
                    if key.starts_with("--") {
                        out.push(format!("{}={}", key, v));
                    } else {
                        out.push(format!("{}{}", key, v));
                    }
                }
            }
        }
        out
    }

    pub fn render(&self, key: &GroupKey) -> Vec<String> {
        self.xargs_base
            .iter()
            .cloned()
            .chain(self.render_switches())
            .chain(self.inner.render(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> GroupKey {
        GroupKey::Text(s.to_string())
    }

    #[test]
    fn group_command_copies_template_without_placeholder() {
        let cmd = GroupCommand::new(vec!["echo".into(), "hi".into()], None);
        let a = cmd.render(&key("x"));
        let b = cmd.render(&key("x"));
        assert_eq!(a, b);
        assert_eq!(a, vec!["echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn group_command_substitutes_placeholder() {
        let cmd = GroupCommand::new(
            vec!["echo".into(), "group:".into(), "{G}".into()],
            Some("{G}".into()),
        );
        assert_eq!(
            cmd.render(&key("123")),
            vec!["echo".to_string(), "group:".to_string(), "123".to_string()]
        );
    }

    #[test]
    fn rendering_twice_yields_equal_but_non_aliased_vectors() {
        let cmd = GroupCommand::new(vec!["echo".into(), "{}".into()], Some("{}".into()));
        let a = cmd.render(&key("k"));
        let mut b = cmd.render(&key("k"));
        assert_eq!(a, b);
        b.push("extra".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn default_max_procs_is_one() {
        let xargs = XargsCommand::new(vec!["xargs".into()], GroupCommand::new(vec![], None));
        assert_eq!(
            xargs.switches.get("--max-procs").cloned().flatten(),
            Some("1".to_string())
        );
    }

    #[test]
    fn set_parallel_divides_cores_by_groups() {
        let mut xargs = XargsCommand::new(vec!["xargs".into()], GroupCommand::new(vec![], None));
        xargs.set_parallel(8, 3);
        assert_eq!(
            xargs.switches.get("--max-procs").cloned().flatten(),
            Some("2".to_string())
        );
    }

    #[test]
    fn set_parallel_ignores_zero_groups() {
        let mut xargs = XargsCommand::new(vec!["xargs".into()], GroupCommand::new(vec![], None));
        xargs.set_parallel(2, 0);
        assert_eq!(
            xargs.switches.get("--max-procs").cloned().flatten(),
            Some("1".to_string())
        );
    }

    #[test]
    fn delimiter_is_rendered_as_three_digit_octal() {
        let mut xargs = XargsCommand::new(vec!["xargs".into()], GroupCommand::new(vec![], None));
        xargs.set_delimiter(0);
        let rendered = xargs.render(&key("k"));
        assert!(rendered.contains(&"--delimiter=\\000".to_string()));
    }

    #[test]
    fn render_places_group_command_last() {
        let inner = GroupCommand::new(vec!["echo".into(), "{}".into()], Some("{}".into()));
        let xargs = XargsCommand::new(vec!["xargs".into(), "-0".into()], inner);
        let rendered = xargs.render(&key("test"));
        assert_eq!(&rendered[rendered.len() - 2..], &["echo", "test"]);
    }
}
