//! The command graph: build rules plus the variables they reference.
//!
//! Nodes are kept in insertion order, which the builder guarantees is a
//! topological order. Generation-time variables (`@NAME@`) and
//! execution-time variables (exports) live in separate namespaces; a name may
//! be bound in only one of them.

use crate::adapter::{Command, StageId};
use crate::error::FlowError;
use crate::template::{expand, is_placeholder_name};
use kiln_config::{Job, ResolvedOptions};
use std::collections::BTreeMap;
use std::fmt;

/// The identity of a node: its stage and the index of the step within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// The stage the node belongs to.
    pub stage: StageId,
    /// The step index within the stage.
    pub step: usize,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stage, self.step)
    }
}

/// One build rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The node identity.
    pub id: NodeId,
    /// The stage's merged options. Each node owns its copy.
    pub options: ResolvedOptions,
    /// Artifacts produced by the rule.
    pub targets: Vec<String>,
    /// Artifacts the rule reads.
    pub depends: Vec<String>,
    /// Commands, run in order.
    pub commands: Vec<Command>,
}

/// A named variable binding and the stage that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The variable name.
    pub name: String,
    /// The value, emitted verbatim.
    pub value: String,
    /// Who declared it (a stage id or the flow name).
    pub origin: String,
}

/// An environment variable that must be set before the build runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvGuard {
    /// The variable name.
    pub name: String,
    /// The message shown when it is unset.
    pub message: String,
}

/// A convenience target outside the default build that depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxTarget {
    /// The phony target name (e.g. `run`).
    pub name: String,
    /// Commands, run in order.
    pub commands: Vec<Command>,
}

/// Accumulated rules and bindings for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandGraph {
    nodes: Vec<Node>,
    generation: BTreeMap<String, Binding>,
    environment: Vec<Binding>,
    default_target: Vec<String>,
    aux_targets: Vec<AuxTarget>,
    guards: Vec<EnvGuard>,
    header: Vec<String>,
    footer: Vec<String>,
}

fn is_env_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Characters with a meaning of their own in a rule's target or
/// prerequisite list.
const RULE_SPECIAL: &[char] = &[':', ';', '#', '=', '%', '*', '?', '['];

fn unsafe_text(what: &'static str, text: &str, referrer: &str, found: char) -> FlowError {
    FlowError::UnsafeText {
        what,
        text: text.to_string(),
        referrer: referrer.to_string(),
        found,
    }
}

fn breaks_line(c: char) -> bool {
    c.is_control() && c != '\t'
}

/// Checks a target or dependency after expansion. Make splits names on
/// whitespace, so each artifact must be a single plain word.
pub(crate) fn check_artifact(name: &str, referrer: &str) -> Result<(), FlowError> {
    if name.contains('$') {
        return Err(FlowError::DeferredArtifact {
            name: name.to_string(),
            referrer: referrer.to_string(),
        });
    }
    match name
        .chars()
        .find(|&c| c.is_whitespace() || c.is_control() || RULE_SPECIAL.contains(&c))
    {
        Some(found) => Err(unsafe_text("artifact name", name, referrer, found)),
        None => Ok(()),
    }
}

/// Checks text emitted on one recipe or comment line.
pub(crate) fn check_line(what: &'static str, text: &str, referrer: &str) -> Result<(), FlowError> {
    match text.chars().find(|&c| breaks_line(c)) {
        Some(found) => Err(unsafe_text(what, text, referrer, found)),
        None => Ok(()),
    }
}

/// Checks a variable value. Besides line breaks, `#` would start a comment
/// in an `export` line and cut the value short.
pub(crate) fn check_value(text: &str, referrer: &str) -> Result<(), FlowError> {
    match text.chars().find(|&c| c == '#' || breaks_line(c)) {
        Some(found) => Err(unsafe_text("value", text, referrer, found)),
        None => Ok(()),
    }
}

impl CommandGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node. Nodes must be pushed producer first.
    pub fn push_node(&mut self, node: Node) -> Result<(), FlowError> {
        for target in &node.targets {
            if let Some(first) = self.nodes.iter().find(|n| n.targets.contains(target)) {
                return Err(FlowError::DuplicateTarget {
                    name: target.clone(),
                    first: first.id.to_string(),
                    second: node.id.to_string(),
                });
            }
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Binds a generation-time variable.
    ///
    /// Rebinding with the same value is a no-op. A different value, or a name
    /// already exported, is [`FlowError::DuplicateBinding`].
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        origin: impl Into<String>,
    ) -> Result<(), FlowError> {
        let (name, value, origin) = (name.into(), value.into(), origin.into());
        if !is_placeholder_name(&name) {
            return Err(FlowError::InvalidBinding {
                name,
                reason: "generation-time names use only A-Z, 0-9 and _",
            });
        }
        check_value(&value, &format!("@{name}@ from {origin}"))?;
        if let Some(first) = self.environment.iter().find(|b| b.name == name) {
            return Err(FlowError::DuplicateBinding {
                name,
                first: first.origin.clone(),
                second: origin,
            });
        }
        match self.generation.get(&name) {
            Some(existing) if existing.value == value => Ok(()),
            Some(existing) => Err(FlowError::DuplicateBinding {
                first: existing.origin.clone(),
                name,
                second: origin,
            }),
            None => {
                self.generation
                    .insert(name.clone(), Binding { name, value, origin });
                Ok(())
            }
        }
    }

    /// Binds an execution-time variable, emitted as an export.
    ///
    /// Same conflict rules as [`define`](Self::define).
    pub fn export(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        origin: impl Into<String>,
    ) -> Result<(), FlowError> {
        let (name, value, origin) = (name.into(), value.into(), origin.into());
        if !is_env_name(&name) {
            return Err(FlowError::InvalidBinding {
                name,
                reason: "environment names start with a letter or _ and use only letters, digits and _",
            });
        }
        check_value(&value, &format!("{name} from {origin}"))?;
        if let Some(first) = self.generation.get(&name) {
            return Err(FlowError::DuplicateBinding {
                name,
                first: first.origin.clone(),
                second: origin,
            });
        }
        match self.environment.iter().find(|b| b.name == name) {
            Some(existing) if existing.value == value => Ok(()),
            Some(existing) => Err(FlowError::DuplicateBinding {
                first: existing.origin.clone(),
                name,
                second: origin,
            }),
            None => {
                self.environment.push(Binding { name, value, origin });
                Ok(())
            }
        }
    }

    /// Requires an environment variable at build time. The first message for
    /// a name is kept.
    pub fn require_env(
        &mut self,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), FlowError> {
        let name = name.into();
        if !is_env_name(&name) {
            return Err(FlowError::InvalidBinding {
                name,
                reason: "guarded names must be valid environment names",
            });
        }
        if !self.guards.iter().any(|g| g.name == name) {
            self.guards.push(EnvGuard {
                name,
                message: message.into(),
            });
        }
        Ok(())
    }

    /// Overrides the default target.
    pub fn set_default_target(&mut self, targets: Vec<String>) {
        self.default_target = targets;
    }

    /// Adds a convenience target depending on the default target.
    pub fn add_aux_target(&mut self, name: impl Into<String>, commands: Vec<Command>) {
        self.aux_targets.push(AuxTarget {
            name: name.into(),
            commands,
        });
    }

    /// Appends a header comment line.
    pub fn add_header(&mut self, line: impl Into<String>) {
        self.header.push(line.into());
    }

    /// Appends a line of raw text after the rules.
    pub fn add_footer(&mut self, line: impl Into<String>) {
        self.footer.push(line.into());
    }

    /// The nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Generation-time bindings, sorted by name.
    pub fn generation(&self) -> impl Iterator<Item = &Binding> {
        self.generation.values()
    }

    /// Execution-time bindings in declaration order.
    pub fn environment(&self) -> &[Binding] {
        &self.environment
    }

    /// The default target: the explicit override, or the last node's
    /// targets.
    pub fn default_target(&self) -> &[String] {
        match (self.default_target.is_empty(), self.nodes.last()) {
            (true, Some(last)) => &last.targets,
            _ => &self.default_target,
        }
    }

    /// The convenience targets.
    pub fn aux_targets(&self) -> &[AuxTarget] {
        &self.aux_targets
    }

    /// The environment guards.
    pub fn guards(&self) -> &[EnvGuard] {
        &self.guards
    }

    /// Header comment lines.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Footer lines.
    pub fn footer(&self) -> &[String] {
        &self.footer
    }

    /// Generation-time variables as a name to value map.
    pub fn gen_vars(&self) -> BTreeMap<String, String> {
        self.generation
            .iter()
            .map(|(name, b)| (name.clone(), b.value.clone()))
            .collect()
    }

    /// Checks the whole graph against the job.
    ///
    /// Every dependency must be produced by an earlier node or be one of the
    /// job's files, every target must have one producer, the default target
    /// must be produced, and every placeholder must be bound.
    pub fn validate(&self, job: &Job) -> Result<(), FlowError> {
        if self.nodes.is_empty() {
            return Err(FlowError::EmptyGraph);
        }
        let vars = self.gen_vars();
        let mut producers: BTreeMap<String, String> = BTreeMap::new();

        for node in &self.nodes {
            let referrer = node.id.to_string();
            for dep in &node.depends {
                let dep = expand(dep, &vars, &referrer)?;
                check_artifact(&dep, &referrer)?;
                if !producers.contains_key(&dep) && !job.provides(&dep) {
                    return Err(FlowError::UnresolvedReference {
                        name: dep,
                        referrer,
                    });
                }
            }
            for target in &node.targets {
                let target = expand(target, &vars, &referrer)?;
                check_artifact(&target, &referrer)?;
                if let Some(first) = producers.get(&target) {
                    return Err(FlowError::DuplicateTarget {
                        name: target,
                        first: first.clone(),
                        second: referrer,
                    });
                }
                producers.insert(target, referrer.clone());
            }
            for command in &node.commands {
                let text = expand(&command.to_string(), &vars, &referrer)?;
                check_line("command", &text, &referrer)?;
            }
        }

        for target in self.default_target() {
            let target = expand(target, &vars, "the default target")?;
            if !producers.contains_key(&target) {
                return Err(FlowError::UnresolvedReference {
                    name: target,
                    referrer: "the default target".to_string(),
                });
            }
        }

        let mut aux_names: Vec<&str> = Vec::new();
        for aux in &self.aux_targets {
            let referrer = format!("target '{}'", aux.name);
            let clash = if aux.name == "all" || aux_names.contains(&aux.name.as_str()) {
                Some("the script".to_string())
            } else {
                producers.get(&aux.name).cloned()
            };
            if let Some(first) = clash {
                return Err(FlowError::DuplicateTarget {
                    name: aux.name.clone(),
                    first,
                    second: referrer,
                });
            }
            aux_names.push(&aux.name);
            for command in &aux.commands {
                let text = expand(&command.to_string(), &vars, &referrer)?;
                check_line("command", &text, &referrer)?;
            }
        }

        for binding in &self.environment {
            let referrer = format!("export {}", binding.name);
            check_value(&expand(&binding.value, &vars, &referrer)?, &referrer)?;
        }
        for guard in &self.guards {
            let referrer = format!("guard {}", guard.name);
            check_value(&expand(&guard.message, &vars, &referrer)?, &referrer)?;
        }
        for line in self.header.iter().chain(&self.footer) {
            let text = expand(line, &vars, "the script header")?;
            check_line("comment", &text, "the script header")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ToolKind;

    fn job() -> Job {
        kiln_config::load_job_from_str(
            r#"
name = "blinky"
toplevel = "top"
flow = "f4pga"

[[files]]
name = "top.v"
file_type = "verilogSource"
"#,
        )
        .unwrap()
    }

    fn node(tool: ToolKind, position: usize, targets: &[&str], depends: &[&str]) -> Node {
        Node {
            id: NodeId {
                stage: StageId { tool, position },
                step: 0,
            },
            options: ResolvedOptions::new(),
            targets: targets.iter().map(|s| s.to_string()).collect(),
            depends: depends.iter().map(|s| s.to_string()).collect(),
            commands: vec![Command::new(tool.to_string())],
        }
    }

    #[test]
    fn valid_two_node_graph() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Yosys, 0, &["out.a"], &["top.v"])).unwrap();
        g.push_node(node(ToolKind::Vpr, 1, &["out.b"], &["out.a"])).unwrap();
        g.validate(&job()).unwrap();
        assert_eq!(g.default_target(), ["out.b".to_string()]);
    }

    #[test]
    fn empty_graph() {
        assert!(matches!(
            CommandGraph::new().validate(&job()).unwrap_err(),
            FlowError::EmptyGraph
        ));
    }

    #[test]
    fn dangling_dependency() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Vpr, 1, &["out.b"], &["out.a"])).unwrap();
        let err = g.validate(&job()).unwrap_err();
        assert!(matches!(
            err,
            FlowError::UnresolvedReference { name, referrer } if name == "out.a" && referrer == "vpr#1.0"
        ));
    }

    #[test]
    fn consumer_before_producer_is_unresolved() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Vpr, 1, &["out.b"], &["out.a"])).unwrap();
        g.push_node(node(ToolKind::Yosys, 0, &["out.a"], &[])).unwrap();
        assert!(matches!(
            g.validate(&job()).unwrap_err(),
            FlowError::UnresolvedReference { .. }
        ));
    }

    #[test]
    fn duplicate_target_on_push() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Yosys, 0, &["x"], &[])).unwrap();
        let err = g.push_node(node(ToolKind::Vpr, 1, &["x"], &[])).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateTarget { first, .. } if first == "yosys#0.0"));
    }

    #[test]
    fn duplicate_target_after_expansion() {
        let mut g = CommandGraph::new();
        g.define("NAME", "x", "flow").unwrap();
        g.push_node(node(ToolKind::Yosys, 0, &["x.net"], &[])).unwrap();
        g.push_node(node(ToolKind::Vpr, 1, &["@NAME@.net"], &[])).unwrap();
        assert!(matches!(
            g.validate(&job()).unwrap_err(),
            FlowError::DuplicateTarget { .. }
        ));
    }

    #[test]
    fn generation_vars_resolve_dependencies() {
        let mut g = CommandGraph::new();
        g.define("TOP", "top", "flow").unwrap();
        g.push_node(node(ToolKind::Yosys, 0, &["@TOP@.json"], &["@TOP@.v"])).unwrap();
        g.validate(&job()).unwrap();
    }

    #[test]
    fn deferred_artifact_name() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Yosys, 0, &["${OUT}.json"], &[])).unwrap();
        assert!(matches!(
            g.validate(&job()).unwrap_err(),
            FlowError::DeferredArtifact { .. }
        ));
    }

    #[test]
    fn undefined_placeholder_in_command() {
        let mut g = CommandGraph::new();
        let mut n = node(ToolKind::Yosys, 0, &["a"], &[]);
        n.commands.push(Command::new("cp").arg("@SRC@").arg("a"));
        g.push_node(n).unwrap();
        assert!(matches!(
            g.validate(&job()).unwrap_err(),
            FlowError::UndefinedVariable { name, .. } if name == "SRC"
        ));
    }

    #[test]
    fn identical_rebinding_is_accepted() {
        let mut g = CommandGraph::new();
        g.export("PART", "xc7a35t", "vpr#1").unwrap();
        g.export("PART", "xc7a35t", "xcfasm#2").unwrap();
        assert_eq!(g.environment().len(), 1);
        assert_eq!(g.environment()[0].origin, "vpr#1");
    }

    #[test]
    fn conflicting_export() {
        let mut g = CommandGraph::new();
        g.export("NAME", "foo", "yosys#0").unwrap();
        let err = g.export("NAME", "bar", "vpr#1").unwrap_err();
        assert!(matches!(
            err,
            FlowError::DuplicateBinding { name, first, second }
                if name == "NAME" && first == "yosys#0" && second == "vpr#1"
        ));
    }

    #[test]
    fn conflicting_definition() {
        let mut g = CommandGraph::new();
        g.define("UTILS_PATH", "/a", "flow").unwrap();
        g.define("UTILS_PATH", "/a", "flow").unwrap();
        assert!(g.define("UTILS_PATH", "/b", "yosys#0").is_err());
    }

    #[test]
    fn namespaces_do_not_share_names() {
        let mut g = CommandGraph::new();
        g.define("PART", "x", "flow").unwrap();
        assert!(matches!(
            g.export("PART", "x", "vpr#1").unwrap_err(),
            FlowError::DuplicateBinding { .. }
        ));

        let mut g = CommandGraph::new();
        g.export("PART", "x", "vpr#1").unwrap();
        assert!(matches!(
            g.define("PART", "x", "flow").unwrap_err(),
            FlowError::DuplicateBinding { .. }
        ));
    }

    #[test]
    fn invalid_binding_names() {
        let mut g = CommandGraph::new();
        assert!(matches!(
            g.define("lower", "x", "flow").unwrap_err(),
            FlowError::InvalidBinding { .. }
        ));
        assert!(matches!(
            g.export("1ABC", "x", "flow").unwrap_err(),
            FlowError::InvalidBinding { .. }
        ));
        assert!(g.require_env("A B", "m").is_err());
        g.export("net_file", "x", "flow").unwrap();
    }

    #[test]
    fn guards_are_deduplicated() {
        let mut g = CommandGraph::new();
        g.require_env("F4PGA_ENV_SHARE", "first").unwrap();
        g.require_env("F4PGA_ENV_SHARE", "second").unwrap();
        assert_eq!(g.guards().len(), 1);
        assert_eq!(g.guards()[0].message, "first");
    }

    #[test]
    fn explicit_default_must_be_produced() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Yosys, 0, &["a"], &[])).unwrap();
        g.set_default_target(vec!["b".to_string()]);
        assert!(matches!(
            g.validate(&job()).unwrap_err(),
            FlowError::UnresolvedReference { referrer, .. } if referrer == "the default target"
        ));
    }

    #[test]
    fn aux_target_may_not_shadow() {
        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Yosys, 0, &["run"], &[])).unwrap();
        g.add_aux_target("run", vec![Command::new("true")]);
        assert!(matches!(
            g.validate(&job()).unwrap_err(),
            FlowError::DuplicateTarget { .. }
        ));

        let mut g = CommandGraph::new();
        g.push_node(node(ToolKind::Yosys, 0, &["a"], &[])).unwrap();
        g.add_aux_target("all", vec![Command::new("true")]);
        assert!(g.validate(&job()).is_err());
    }

    #[test]
    fn node_id_display() {
        let id = NodeId {
            stage: StageId {
                tool: ToolKind::Vpr,
                position: 1,
            },
            step: 3,
        };
        assert_eq!(id.to_string(), "vpr#1.3");
    }

    #[test]
    fn artifact_names_must_be_single_words() {
        for name in ["my top.v", "a:b", "x#y", "k=v", "%.o", "a\nb"] {
            let mut g = CommandGraph::new();
            g.push_node(node(ToolKind::Yosys, 0, &["out.a"], &[name])).unwrap();
            let err = g.validate(&job()).unwrap_err();
            assert!(
                matches!(&err, FlowError::UnsafeText { what: "artifact name", .. }),
                "{name:?}: {err}"
            );
        }
    }

    #[test]
    fn values_may_not_break_the_line() {
        let mut g = CommandGraph::new();
        let err = g.export("PART", "xc7a35t\nall: evil", "flow").unwrap_err();
        assert!(matches!(err, FlowError::UnsafeText { found: '\n', .. }));

        let err = g.export("PART", "xc7a35t # note", "flow").unwrap_err();
        assert!(matches!(err, FlowError::UnsafeText { found: '#', .. }));

        let err = g.define("PART", "xc7a35t\r", "flow").unwrap_err();
        assert!(matches!(err, FlowError::UnsafeText { found: '\r', .. }));
        assert!(g.environment().is_empty());
        assert!(g.gen_vars().is_empty());
    }

    #[test]
    fn commands_may_not_break_the_line() {
        let mut g = CommandGraph::new();
        let mut n = node(ToolKind::Yosys, 0, &["out.a"], &["top.v"]);
        n.commands = vec![Command::new("xcfasm").arg("--part").arg("x\nall: evil")];
        g.push_node(n).unwrap();
        let err = g.validate(&job()).unwrap_err();
        assert!(matches!(
            err,
            FlowError::UnsafeText { what: "command", referrer, .. } if referrer == "yosys#0.0"
        ));
    }
}
