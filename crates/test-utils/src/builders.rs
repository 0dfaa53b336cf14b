#![allow(dead_code)]

/// Builder for `.rhai` sequence module sources.
///
/// ```ignore
/// let src = ScriptBuilder::new()
///     .provides(&["identity"])
///     .param_default("identity", "value", "0")
///     .function("fn identity(value) { value }")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    provides: Option<Vec<String>>,
    requires: Vec<String>,
    defaults: Vec<(String, Vec<(String, String)>)>,
    body: Vec<String>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provides(mut self, names: &[&str]) -> Self {
        self.provides = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn requires(mut self, modules: &[&str]) -> Self {
        self.requires = modules.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Declare the default of `param` in `sequence` as a Rhai literal.
    pub fn param_default(mut self, sequence: &str, param: &str, literal: &str) -> Self {
        let index = match self.defaults.iter().position(|(s, _)| s == sequence) {
            Some(index) => index,
            None => {
                self.defaults.push((sequence.to_string(), Vec::new()));
                self.defaults.len() - 1
            }
        };
        self.defaults[index]
            .1
            .push((param.to_string(), literal.to_string()));
        self
    }

    /// Append raw Rhai source (functions or statements).
    pub fn function(mut self, source: &str) -> Self {
        self.body.push(source.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();

        if let Some(provides) = &self.provides {
            out.push_str(&format!("let provides = {};\n", list_literal(provides)));
        }
        if !self.requires.is_empty() {
            out.push_str(&format!("let requires = {};\n", list_literal(&self.requires)));
        }
        if !self.defaults.is_empty() {
            out.push_str("let defaults = #{\n");
            for (sequence, params) in &self.defaults {
                let params: Vec<String> = params
                    .iter()
                    .map(|(name, literal)| format!("{name}: {literal}"))
                    .collect();
                out.push_str(&format!("    {sequence}: #{{ {} }},\n", params.join(", ")));
            }
            out.push_str("};\n");
        }

        out.push('\n');
        for chunk in &self.body {
            out.push_str(chunk);
            out.push('\n');
        }
        out
    }
}

fn list_literal(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
    format!("[{}]", quoted.join(", "))
}
