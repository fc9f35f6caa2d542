//! Tool trait — the abstraction over agent capabilities.
//!
//! A tool declares its parameters once, as a static [`ParamSpec`] slice.
//! The [`ToolRegistry`] derives both the schema advertised in the prompt and
//! the argument binding used at dispatch from that one declaration, so the
//! two cannot drift apart.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::session::SessionContext;

/// A literal argument value as written in a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

impl ArgValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ArgValue::None)
    }

    fn describe(&self) -> String {
        match self {
            ArgValue::Str(s) => format!("\"{s}\""),
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::None => "None".into(),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Int(i)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// A parsed tool call. Transient: lives for one reasoning turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub positional: Vec<ArgValue>,
    pub keyword: Vec<(String, ArgValue)>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Bool,
}

impl ParamKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamKind::Str => "str",
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Arguments bound to a tool's declared parameters and coerced to their kinds.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    tool: String,
    values: HashMap<&'static str, ArgValue>,
}

impl ToolArgs {
    /// Bind positional then keyword values to `params`.
    ///
    /// `None` literals count as absent. Unknown, duplicate, surplus, missing
    /// required or mistyped arguments are reported as `InvalidArguments`.
    pub fn bind(
        tool: &str,
        params: &'static [ParamSpec],
        invocation: &ToolInvocation,
    ) -> std::result::Result<Self, ToolError> {
        if invocation.positional.len() > params.len() {
            return Err(ToolError::invalid(
                tool,
                format!(
                    "takes at most {} argument(s) but {} were given",
                    params.len(),
                    invocation.positional.len()
                ),
            ));
        }

        let mut values = HashMap::new();
        for (spec, value) in params.iter().zip(&invocation.positional) {
            if !value.is_none() {
                values.insert(spec.name, coerce(tool, spec, value)?);
            }
        }

        for (name, value) in &invocation.keyword {
            let Some(spec) = params.iter().find(|p| p.name == name.as_str()) else {
                let expected: Vec<_> = params.iter().map(|p| p.name).collect();
                return Err(ToolError::invalid(
                    tool,
                    if expected.is_empty() {
                        format!("unknown argument '{name}'; this tool takes no arguments")
                    } else {
                        format!("unknown argument '{name}'; expected {}", expected.join(", "))
                    },
                ));
            };
            if values.contains_key(spec.name) {
                return Err(ToolError::invalid(
                    tool,
                    format!("argument '{name}' given more than once"),
                ));
            }
            if !value.is_none() {
                values.insert(spec.name, coerce(tool, spec, value)?);
            }
        }

        for spec in params.iter().filter(|p| p.required) {
            if !values.contains_key(spec.name) {
                return Err(ToolError::invalid(
                    tool,
                    format!("missing required argument '{}'", spec.name),
                ));
            }
        }

        Ok(Self {
            tool: tool.to_string(),
            values,
        })
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn require_str(&self, name: &str) -> std::result::Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ToolError::invalid(&self.tool, format!("missing required argument '{name}'")))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn require_int(&self, name: &str) -> std::result::Result<i64, ToolError> {
        self.int(name)
            .ok_or_else(|| ToolError::invalid(&self.tool, format!("missing required argument '{name}'")))
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

fn coerce(
    tool: &str,
    spec: &ParamSpec,
    value: &ArgValue,
) -> std::result::Result<ArgValue, ToolError> {
    let mismatch = || {
        ToolError::invalid(
            tool,
            format!(
                "argument '{}' must be {}, got {}",
                spec.name,
                spec.kind.type_name(),
                value.describe()
            ),
        )
    };

    match (spec.kind, value) {
        (ParamKind::Str, ArgValue::Str(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() && spec.required {
                return Err(ToolError::invalid(
                    tool,
                    format!("argument '{}' must not be empty", spec.name),
                ));
            }
            Ok(ArgValue::Str(trimmed.to_string()))
        }
        (ParamKind::Str, ArgValue::Int(i)) => Ok(ArgValue::Str(i.to_string())),
        (ParamKind::Str, ArgValue::Float(f)) => Ok(ArgValue::Str(f.to_string())),
        (ParamKind::Str, ArgValue::Bool(b)) => Ok(ArgValue::Str(b.to_string())),

        (ParamKind::Int, ArgValue::Int(i)) => Ok(ArgValue::Int(*i)),
        (ParamKind::Int, ArgValue::Float(f)) if f.fract() == 0.0 => Ok(ArgValue::Int(*f as i64)),
        (ParamKind::Int, ArgValue::Str(s)) => s
            .trim()
            .trim_start_matches('#')
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| mismatch()),

        (ParamKind::Bool, ArgValue::Bool(b)) => Ok(ArgValue::Bool(*b)),
        (ParamKind::Bool, ArgValue::Int(i)) if *i == 0 || *i == 1 => Ok(ArgValue::Bool(*i == 1)),
        (ParamKind::Bool, ArgValue::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(ArgValue::Bool(true)),
            "false" | "no" => Ok(ArgValue::Bool(false)),
            _ => Err(mismatch()),
        },

        _ => Err(mismatch()),
    }
}

/// The text result of a tool run, fed back into the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub tool: String,
    pub text: String,
    pub is_error: bool,
    pub duration_ms: u64,
}

/// The core Tool trait.
///
/// Tools return bounded human-readable text, never structured records:
/// the string becomes input to the next reasoning turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description for the prompt schema.
    fn description(&self) -> &'static str;

    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    /// A literal call shown to the model, e.g. `add_task("Buy milk")`.
    fn example(&self) -> Option<&'static str> {
        None
    }

    async fn execute(
        &self,
        args: ToolArgs,
        session: &mut SessionContext,
    ) -> std::result::Result<String, ToolError>;

    /// `name(a: str, b: int = None)` as advertised in the prompt.
    fn signature(&self) -> String {
        let params: Vec<String> = self
            .params()
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}: {}", p.name, p.kind.type_name())
                } else {
                    format!("{}: {} = None", p.name, p.kind.type_name())
                }
            })
            .collect();
        format!("{}({})", self.name(), params.join(", "))
    }
}

/// The closed set of tools available to one orchestrator, in advertised order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name();
        match self.index.get(name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&slot| self.tools[slot].as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The enumerated tool schema placed in the system prompt.
    pub fn render_schema(&self) -> String {
        let mut out = String::from("You have access to the following tools:\n");
        for (i, tool) in self.tools.iter().enumerate() {
            let _ = write!(
                out,
                "\n{}. **{}**\n   - {}\n",
                i + 1,
                tool.signature(),
                tool.description()
            );
            if let Some(example) = tool.example() {
                let _ = writeln!(out, "   - Example: `Tool: {example}`");
            }
        }
        out
    }

    /// Bind and run an invocation. Never fails: errors become `Error: …` observations.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        session: &mut SessionContext,
    ) -> Observation {
        let started = Instant::now();
        let result = self.try_execute(invocation, session).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(text) => {
                debug!(tool = %invocation.name, duration_ms, "Tool executed");
                Observation {
                    tool: invocation.name.clone(),
                    text,
                    is_error: false,
                    duration_ms,
                }
            }
            Err(e) => {
                warn!(tool = %invocation.name, error = %e, "Tool failed");
                Observation {
                    tool: invocation.name.clone(),
                    text: format!("Error: {e}"),
                    is_error: true,
                    duration_ms,
                }
            }
        }
    }

    async fn try_execute(
        &self,
        invocation: &ToolInvocation,
        session: &mut SessionContext,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .get(&invocation.name)
            .ok_or_else(|| ToolError::NotFound(invocation.name.clone()))?;
        let args = ToolArgs::bind(tool.name(), tool.params(), invocation)?;
        tool.execute(args, session).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    static ECHO_PARAMS: [ParamSpec; 2] = [
        ParamSpec::required("text", ParamKind::Str),
        ParamSpec::optional("times", ParamKind::Int),
    ];

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "Echoes back the input"
        }
        fn params(&self) -> &'static [ParamSpec] {
            &ECHO_PARAMS
        }
        fn example(&self) -> Option<&'static str> {
            Some("echo(\"hi\")")
        }
        async fn execute(
            &self,
            args: ToolArgs,
            _session: &mut SessionContext,
        ) -> std::result::Result<String, ToolError> {
            let text = args.require_str("text")?;
            let times = args.int("times").unwrap_or(1).max(1) as usize;
            Ok(text.repeat(times))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn schema_is_rendered_from_params() {
        let schema = registry().render_schema();
        assert!(schema.contains("1. **echo(text: str, times: int = None)**"));
        assert!(schema.contains("Example: `Tool: echo(\"hi\")`"));
    }

    #[tokio::test]
    async fn execute_binds_positional_and_keyword() {
        let registry = registry();
        let mut session = SessionContext::new("t");
        let call = ToolInvocation::new("echo").arg("ab").kwarg("times", "3");
        let obs = registry.execute(&call, &mut session).await;
        assert!(!obs.is_error);
        assert_eq!(obs.text, "ababab");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_observation() {
        let registry = registry();
        let mut session = SessionContext::new("t");
        let obs = registry
            .execute(&ToolInvocation::new("teleport"), &mut session)
            .await;
        assert!(obs.is_error);
        assert_eq!(obs.text, "Error: Tool 'teleport' not found.");
    }

    #[tokio::test]
    async fn missing_required_argument_is_reported() {
        let registry = registry();
        let mut session = SessionContext::new("t");
        let obs = registry
            .execute(&ToolInvocation::new("echo"), &mut session)
            .await;
        assert!(obs.is_error);
        assert!(obs.text.contains("missing required argument 'text'"));
    }

    #[test]
    fn bind_rejects_unknown_keyword_and_surplus_positionals() {
        let unknown = ToolInvocation::new("echo").kwarg("colour", "red");
        let err = ToolArgs::bind("echo", &ECHO_PARAMS, &unknown).unwrap_err();
        assert!(err.to_string().contains("unknown argument 'colour'"));

        let surplus = ToolInvocation::new("echo").arg("a").arg(1i64).arg(2i64);
        let err = ToolArgs::bind("echo", &ECHO_PARAMS, &surplus).unwrap_err();
        assert!(err.to_string().contains("at most 2"));
    }

    #[test]
    fn bind_rejects_duplicate_and_mistyped_values() {
        let dup = ToolInvocation::new("echo").arg("a").kwarg("text", "b");
        assert!(ToolArgs::bind("echo", &ECHO_PARAMS, &dup).is_err());

        let typed = ToolInvocation::new("echo").arg("a").arg("many");
        let err = ToolArgs::bind("echo", &ECHO_PARAMS, &typed).unwrap_err();
        assert!(err.to_string().contains("must be int"));
    }

    #[test]
    fn none_literal_counts_as_absent() {
        let call = ToolInvocation::new("echo").arg("a").arg(ArgValue::None);
        let args = ToolArgs::bind("echo", &ECHO_PARAMS, &call).unwrap();
        assert_eq!(args.int("times"), None);
    }

    #[test]
    fn numbers_coerce_to_strings_for_text_params() {
        let call = ToolInvocation::new("echo").arg(9876i64);
        let args = ToolArgs::bind("echo", &ECHO_PARAMS, &call).unwrap();
        assert_eq!(args.str("text"), Some("9876"));
    }
}
