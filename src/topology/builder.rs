//! Topology builder
//!
//! Walks a [`ConfigDocument`] and produces a fresh [`Hand`] plus a list of
//! [`Diagnostic`]s. Mistakes in one entry never abort the build:
//!
//! - an input whose function is not registered is built with an inert binding
//! - an input with a malformed field or a non-numeric parameter is skipped
//! - a motor with a missing, invalid or repeated pin is built inoperable
//! - an output of an unknown type is skipped
//!
//! Whether any diagnostic is fatal is the caller's decision; the controller
//! accepts partial configurations and only logs them.

use crate::config::HardwareProfile;
use crate::document::ConfigDocument;
use crate::functions::{FunctionParams, FunctionRegistry};
use crate::topology::Hand;
use crate::types::{
    DcMotor, FunctionBinding, Input, Output, PinAssignment, PinNumber, PinRole, DC_MOTOR_TAG,
};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// A recoverable problem found while building a topology
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("Section '{section}' is malformed: {reason}")]
    MalformedSection {
        section: &'static str,
        reason: String,
    },

    #[error("Input #{index} skipped: {reason}")]
    MalformedInput { index: usize, reason: String },

    #[error("Input '{name}' (id={id}) skipped: id already used")]
    DuplicateInputId { id: i64, name: String },

    #[error("Input '{name}' (id={id}) skipped: parameter '{parameter}' is not a number")]
    NonNumericParameter {
        id: i64,
        name: String,
        parameter: String,
    },

    #[error("Input '{name}' (id={id}) is inert: function '{function}' not found")]
    UnresolvedFunction {
        id: i64,
        name: String,
        function: String,
    },

    #[error("Output #{index} skipped: {reason}")]
    MalformedOutput { index: usize, reason: String },

    #[error("Output '{name}' skipped: unsupported type '{output_type}'")]
    UnknownOutputType { name: String, output_type: String },

    #[error("Output '{output}' is inoperable: no {role} assigned")]
    MissingPinRole { output: String, role: PinRole },

    #[error("Output '{output}' is inoperable: {role} {pin} is not a usable pin")]
    InvalidPin {
        output: String,
        role: PinRole,
        pin: i64,
    },

    #[error("Output '{output}' is inoperable: pin {pin} used for more than one role")]
    DuplicatePin { output: String, pin: PinNumber },

    #[error("Output '{output}': ignoring pin entry: {reason}")]
    MalformedPin { output: String, reason: String },

    #[error("Output '{output}': ignoring unknown pin role '{tag}'")]
    UnknownPinRole { output: String, tag: String },

    #[error("Output '{output}' is inoperable: missing or non-numeric safety_threshold")]
    MissingSafetyThreshold { output: String },
}

/// Result of a topology build
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub topology: Hand,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds runtime topologies from configuration documents
#[derive(Debug, Clone, Copy)]
pub struct TopologyBuilder<'a> {
    registry: &'a FunctionRegistry,
    hardware: &'a HardwareProfile,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(registry: &'a FunctionRegistry, hardware: &'a HardwareProfile) -> Self {
        Self { registry, hardware }
    }

    /// Build a topology from a document
    pub fn build(&self, doc: &ConfigDocument) -> BuildOutput {
        let mut out = BuildOutput::default();

        if let Some(entries) = section(doc.inputs(), "inputs", &mut out.diagnostics) {
            let mut seen_ids = HashSet::new();
            for (index, entry) in entries.iter().enumerate() {
                let Some(input) = self.build_input(index, entry, &mut out.diagnostics) else {
                    continue;
                };
                if !seen_ids.insert(input.id) {
                    out.diagnostics.push(Diagnostic::DuplicateInputId {
                        id: input.id,
                        name: input.name,
                    });
                    continue;
                }
                out.topology.add_input(input);
            }
        }

        if let Some(entries) = section(doc.outputs(), "outputs", &mut out.diagnostics) {
            for (index, entry) in entries.iter().enumerate() {
                if let Some(output) = self.build_output(index, entry, &mut out.diagnostics) {
                    out.topology.add_output(output);
                }
            }
        }

        for diagnostic in &out.diagnostics {
            tracing::warn!("{}", diagnostic);
        }

        out
    }

    fn build_input(
        &self,
        index: usize,
        entry: &Value,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Input> {
        let malformed = |reason: &str| Diagnostic::MalformedInput {
            index,
            reason: reason.to_string(),
        };

        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            diagnostics.push(malformed("missing or non-string 'name'"));
            return None;
        };
        let Some(id) = entry.get("id").and_then(Value::as_i64) else {
            diagnostics.push(malformed("missing or non-integer 'id'"));
            return None;
        };
        let Some(sensor_type) = entry.get("type").and_then(Value::as_str) else {
            diagnostics.push(malformed("missing or non-string 'type'"));
            return None;
        };
        let Some(function_name) = entry
            .get("function")
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
        else {
            diagnostics.push(malformed("missing or non-string 'function.name'"));
            return None;
        };

        let mut parameters = FunctionParams::new();
        match entry.get("function").and_then(|f| f.get("parameters")) {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (param, value) in map {
                    let Some(value) = value.as_f64() else {
                        diagnostics.push(Diagnostic::NonNumericParameter {
                            id,
                            name: name.to_string(),
                            parameter: param.clone(),
                        });
                        return None;
                    };
                    parameters.insert(param.as_str(), value);
                }
            }
            Some(_) => {
                diagnostics.push(malformed("'function.parameters' is not a mapping"));
                return None;
            }
        }

        let binding = match self.registry.resolve(function_name) {
            Some(function) => FunctionBinding::resolved(function, parameters),
            None => {
                diagnostics.push(Diagnostic::UnresolvedFunction {
                    id,
                    name: name.to_string(),
                    function: function_name.to_string(),
                });
                FunctionBinding::inert(parameters)
            }
        };

        tracing::debug!(
            "Input id={} name={} type={} function={} ({} parameter(s))",
            id,
            name,
            sensor_type,
            function_name,
            binding.parameters().len()
        );

        Some(Input::new(id, name, sensor_type, binding))
    }

    fn build_output(
        &self,
        index: usize,
        entry: &Value,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Output> {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            diagnostics.push(Diagnostic::MalformedOutput {
                index,
                reason: "missing or non-string 'name'".to_string(),
            });
            return None;
        };
        let Some(output_type) = entry.get("type").and_then(Value::as_str) else {
            diagnostics.push(Diagnostic::MalformedOutput {
                index,
                reason: "missing or non-string 'type'".to_string(),
            });
            return None;
        };

        match output_type {
            DC_MOTOR_TAG => Some(Output::DcMotor(self.build_dc_motor(
                name,
                entry,
                diagnostics,
            ))),
            other => {
                diagnostics.push(Diagnostic::UnknownOutputType {
                    name: name.to_string(),
                    output_type: other.to_string(),
                });
                None
            }
        }
    }

    fn build_dc_motor(
        &self,
        name: &str,
        entry: &Value,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> DcMotor {
        let mut assignments = [PinAssignment::Unassigned; 3];
        let mut seen = [false; 3];
        let mut inhibit = false;

        let pins = entry
            .get("pins")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for pin in pins {
            let Some(tag) = pin.get("type").and_then(Value::as_str) else {
                diagnostics.push(Diagnostic::MalformedPin {
                    output: name.to_string(),
                    reason: "missing or non-string 'type'".to_string(),
                });
                continue;
            };
            let Some(role) = PinRole::from_tag(tag) else {
                diagnostics.push(Diagnostic::UnknownPinRole {
                    output: name.to_string(),
                    tag: tag.to_string(),
                });
                continue;
            };
            let Some(raw) = pin.get("pin_number").and_then(Value::as_i64) else {
                diagnostics.push(Diagnostic::MalformedPin {
                    output: name.to_string(),
                    reason: format!("{} has no integer 'pin_number'", role),
                });
                continue;
            };

            let slot = role_index(role);
            seen[slot] = true;
            match self.hardware.validate_pin(raw) {
                Some(pin) => assignments[slot] = PinAssignment::Assigned(pin),
                None => {
                    diagnostics.push(Diagnostic::InvalidPin {
                        output: name.to_string(),
                        role,
                        pin: raw,
                    });
                    assignments[slot] = PinAssignment::Unassigned;
                    inhibit = true;
                }
            }
        }

        for role in PinRole::ALL {
            if !seen[role_index(role)] {
                diagnostics.push(Diagnostic::MissingPinRole {
                    output: name.to_string(),
                    role,
                });
            }
        }

        let mut used = HashSet::new();
        for pin in assignments.iter().filter_map(PinAssignment::pin) {
            if !used.insert(pin) {
                diagnostics.push(Diagnostic::DuplicatePin {
                    output: name.to_string(),
                    pin,
                });
                inhibit = true;
            }
        }

        let safety_threshold = entry.get("safety_threshold").and_then(Value::as_f64);
        if safety_threshold.is_none() {
            diagnostics.push(Diagnostic::MissingSafetyThreshold {
                output: name.to_string(),
            });
        }

        let [in1, in2, sense] = assignments;
        let mut motor = DcMotor::new(name, in1, in2, sense, safety_threshold);
        if inhibit {
            motor.inhibit();
        }

        tracing::debug!(
            "Output name={} type={} in1={} in2={} sense={} operable={}",
            name,
            DC_MOTOR_TAG,
            in1,
            in2,
            sense,
            motor.is_operable()
        );

        motor
    }
}

fn role_index(role: PinRole) -> usize {
    match role {
        PinRole::In1 => 0,
        PinRole::In2 => 1,
        PinRole::Sense => 2,
    }
}

/// Resolve a top-level list; absent means empty
fn section<'v>(
    value: Option<&'v Value>,
    name: &'static str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<&'v Vec<Value>> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Array(entries)) => Some(entries),
        Some(_) => {
            diagnostics.push(Diagnostic::MalformedSection {
                section: name,
                reason: "expected a list".to_string(),
            });
            None
        }
    }
}
