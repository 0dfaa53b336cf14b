// src/registry/handle.rs

use std::sync::Arc;

use rhai::Dynamic;
use tracing::debug;

use crate::errors::Result;
use crate::registry::args::CallArgs;
use crate::registry::descriptor::SequenceDescriptor;
use crate::script::ScriptUnit;

/// A resolved, callable sequence.
///
/// Obtained from [`SequenceRegistry::sequence`](crate::SequenceRegistry::sequence)
/// after the auto-reload check has run. Calling it never checks for
/// modifications again, and it keeps the unit it was resolved from alive even
/// if that unit is reloaded in the meantime.
#[derive(Debug, Clone)]
pub struct SequenceHandle {
    descriptor: SequenceDescriptor,
    unit: Arc<dyn ScriptUnit>,
}

impl SequenceHandle {
    pub(crate) fn new(descriptor: SequenceDescriptor, unit: Arc<dyn ScriptUnit>) -> Self {
        Self { descriptor, unit }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn module(&self) -> &str {
        &self.descriptor.module
    }

    pub fn descriptor(&self) -> &SequenceDescriptor {
        &self.descriptor
    }

    pub fn call(&self, args: CallArgs) -> Result<Dynamic> {
        let values = args.bind(self.name(), &self.descriptor.params)?;
        self.invoke(values)
    }

    /// Call with every parameter bound to its descriptor's current value.
    pub fn call_with_current_values(&self) -> Result<Dynamic> {
        self.invoke(self.descriptor.current_values())
    }

    fn invoke(&self, values: Vec<Dynamic>) -> Result<Dynamic> {
        debug!(sequence = %self.name(), module = %self.module(), "executing sequence");
        self.unit.invoke(self.name(), values)
    }
}
