//! Executor descriptions for script modules.
//!
//! A [`ScriptSpecification`] is the JSON document a host uses to describe a
//! script executor: its identity, the module file and entry point to call,
//! and the parameters, inputs and outputs it declares. It implements
//! [`SpecificationHandle`] so it can be handed to modules through the
//! bridge, and it yields the [`FieldSet`]s for the structured records.

use crate::bridge::SpecificationHandle;
use crate::context::FieldSet;
use crate::errors::{Result, ScriptbridgeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default entry-point function name.
pub const DEFAULT_FUNCTION: &str = "execute";

/// Default output slot receiving the entry point's return value.
pub const DEFAULT_OUTPUT: &str = "output";

/// Where the entry point lives inside the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConf {
    /// Module file, absolute or relative to the working directory.
    pub module: String,
    /// Entry-point function name.
    #[serde(default = "default_function")]
    pub function: String,
    /// Optional class whose instance method is the entry point.
    #[serde(default, rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

fn default_function() -> String {
    DEFAULT_FUNCTION.to_string()
}

impl ScriptConf {
    /// Returns whether the entry point is an instance method.
    #[must_use]
    pub fn is_class_method(&self) -> bool {
        self.class_name.is_some()
    }
}

/// A declared parameter, input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Field name.
    pub name: String,
    /// Value type hint (e.g. "scalar", "numbers").
    #[serde(default, rename = "value_type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Default value for parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PortSpec {
    /// Creates a port with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: None,
            default: None,
            description: None,
        }
    }
}

/// Description of a script executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSpecification {
    /// Host executor id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category used by host UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Script language.
    #[serde(default = "default_language")]
    pub language: String,
    /// Module and entry point.
    pub script: ScriptConf,
    /// Declared parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PortSpec>,
    /// Declared inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PortSpec>,
    /// Declared outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PortSpec>,
}

fn default_language() -> String {
    "lua".to_string()
}

impl ScriptSpecification {
    /// Creates a specification with no declared fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            description: None,
            language: default_language(),
            script: ScriptConf {
                module: module.into(),
                function: default_function(),
                class_name: None,
            },
            parameters: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Parses a specification from JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` on malformed JSON and `Configuration` if the
    /// document is incomplete.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.check_completeness()?;
        Ok(spec)
    }

    /// Reads a specification file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`ScriptSpecification::from_json_str`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Sets the entry-point function.
    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.script.function = function.into();
        self
    }

    /// Makes the entry point an instance method of `class_name`.
    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.script.class_name = Some(class_name.into());
        self
    }

    /// Declares a parameter.
    #[must_use]
    pub fn with_parameter(mut self, port: PortSpec) -> Self {
        self.parameters.push(port);
        self
    }

    /// Declares an input.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(PortSpec::named(name));
        self
    }

    /// Declares an output.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(PortSpec::named(name));
        self
    }

    /// Field set for the params record.
    ///
    /// Open when no parameter is declared.
    #[must_use]
    pub fn parameter_fields(&self) -> FieldSet {
        fields_of(&self.parameters)
    }

    /// Field set for the inputs record.
    #[must_use]
    pub fn input_fields(&self) -> FieldSet {
        fields_of(&self.inputs)
    }

    /// Field set for the outputs record.
    ///
    /// The default output slot is always accepted.
    #[must_use]
    pub fn output_fields(&self) -> FieldSet {
        if self.outputs.is_empty() {
            return FieldSet::open();
        }
        FieldSet::strict(
            self.outputs
                .iter()
                .map(|p| p.name.clone())
                .chain(std::iter::once(DEFAULT_OUTPUT.to_string())),
        )
    }

    /// Returns declared parameter defaults.
    pub fn parameter_defaults(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.parameters
            .iter()
            .filter_map(|p| p.default.as_ref().map(|d| (p.name.as_str(), d)))
    }

    fn check_completeness(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ScriptbridgeError::Configuration(
                "executor specification has an empty \"id\"".to_string(),
            ));
        }
        if self.script.module.trim().is_empty() {
            return Err(ScriptbridgeError::Configuration(format!(
                "executor specification \"{}\" has an empty \"script.module\"",
                self.id
            )));
        }
        if self.script.function.trim().is_empty() {
            return Err(ScriptbridgeError::Configuration(format!(
                "executor specification \"{}\" has an empty \"script.function\"",
                self.id
            )));
        }
        Ok(())
    }
}

fn fields_of(ports: &[PortSpec]) -> FieldSet {
    if ports.is_empty() {
        FieldSet::open()
    } else {
        FieldSet::strict(ports.iter().map(|p| p.name.clone()))
    }
}

impl SpecificationHandle for ScriptSpecification {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
