// src/registry/args.rs

use rhai::Dynamic;

use crate::errors::{Result, SequencerError};
use crate::registry::descriptor::ParamDescriptor;

/// Positional and keyword arguments for one sequence call.
///
/// ```
/// use sequencer::CallArgs;
///
/// let args = CallArgs::new().arg(42_i64).kwarg("verbose", true);
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Dynamic>,
    keywords: Vec<(String, Dynamic)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Dynamic>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Dynamic>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn positional(&self) -> &[Dynamic] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Dynamic)] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind against a sequence's parameters, producing the full positional list.
    ///
    /// Positional arguments fill parameters in order, keywords fill by name,
    /// anything left unbound takes its default.
    pub fn bind(self, sequence: &str, params: &[ParamDescriptor]) -> Result<Vec<Dynamic>> {
        let invalid = |reason: String| SequencerError::InvalidArguments {
            sequence: sequence.to_string(),
            reason,
        };

        if self.positional.len() > params.len() {
            return Err(invalid(format!(
                "takes {} argument(s) but {} were given",
                params.len(),
                self.positional.len()
            )));
        }

        let mut slots: Vec<Option<Dynamic>> = vec![None; params.len()];
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }

        for (name, value) in self.keywords {
            let index = params
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| invalid(format!("unexpected keyword argument '{name}'")))?;
            if slots[index].is_some() {
                return Err(invalid(format!("got multiple values for argument '{name}'")));
            }
            slots[index] = Some(value);
        }

        Ok(slots
            .into_iter()
            .zip(params)
            .map(|(slot, param)| slot.unwrap_or_else(|| param.default.to_dynamic()))
            .collect())
    }
}

impl From<Vec<Dynamic>> for CallArgs {
    fn from(positional: Vec<Dynamic>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }
}
