//! Runtime topology ("Hand")
//!
//! The [`Hand`] owns the configured inputs and outputs in declaration order.
//! It has no locking of its own; the controller shares it with workers through
//! [`SharedTopology`], and replaces its contents in one write-locked step so a
//! reader sees either the previous topology or the new one, never a mix.
//!
//! # Components
//!
//! - [`Hand`] - Ordered inputs and outputs plus an install generation
//! - [`SharedTopology`] - Thread-safe handle handed to workers
//! - [`TopologyBuilder`] - Builds a `Hand` from a configuration document
//! - [`TopologySnapshot`] - Serializable summary used for persistence

pub mod builder;

pub use builder::{BuildOutput, Diagnostic, TopologyBuilder};

use crate::functions::FunctionParams;
use crate::types::{Input, MotorState, Output, PinAssignment};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The current set of configured sensors and actuators
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hand {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    generation: u64,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every input and output
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    pub fn add_input(&mut self, input: Input) {
        self.inputs.push(input);
    }

    pub fn add_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut [Output] {
        &mut self.outputs
    }

    pub fn input_by_id(&self, id: i64) -> Option<&Input> {
        self.inputs.iter().find(|i| i.id == id)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    pub fn output_by_name_mut(&mut self, name: &str) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Number of times a topology has been installed into this hand
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Command every motor to STOP, returning how many were running
    pub fn stop_all_motors(&mut self) -> usize {
        let mut stopped = 0;
        for output in &mut self.outputs {
            if let Some(motor) = output.as_dc_motor_mut() {
                if motor.state() != MotorState::Stop {
                    stopped += 1;
                }
            }
            output.stop();
        }
        stopped
    }

    /// Human-readable listing of the current contents
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Hand (generation {}): {} input(s), {} output(s)",
            self.generation,
            self.inputs.len(),
            self.outputs.len()
        );

        for input in &self.inputs {
            let function = input.binding.function_name().unwrap_or("<unresolved>");
            let params: Vec<String> = input
                .binding
                .parameters()
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            let _ = writeln!(
                out,
                "  input  id={} name={} type={} function={} params={{{}}}",
                input.id,
                input.name,
                input.sensor_type,
                function,
                params.join(", ")
            );
        }

        for output in &self.outputs {
            match output {
                Output::DcMotor(motor) => {
                    let threshold = motor
                        .safety_threshold
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "unset".to_string());
                    let _ = writeln!(
                        out,
                        "  output name={} type={} in1={} in2={} sense={} threshold={} state={}{}",
                        motor.name,
                        output.type_tag(),
                        motor.in1_pin,
                        motor.in2_pin,
                        motor.sense_pin,
                        threshold,
                        motor.state(),
                        if motor.is_operable() { "" } else { " (inoperable)" }
                    );
                }
            }
        }

        tracing::debug!("{}", out.trim_end());
        out
    }

    /// Serializable summary of the current contents
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            generation: self.generation,
            inputs: self
                .inputs
                .iter()
                .map(|input| InputSnapshot {
                    id: input.id,
                    name: input.name.clone(),
                    sensor_type: input.sensor_type.clone(),
                    function: input.binding.function_name().map(str::to_string),
                    parameters: input.binding.parameters().clone(),
                })
                .collect(),
            outputs: self
                .outputs
                .iter()
                .map(|output| match output {
                    Output::DcMotor(motor) => OutputSnapshot::DcMotor {
                        name: motor.name.clone(),
                        in1_pin: motor.in1_pin,
                        in2_pin: motor.in2_pin,
                        sense_pin: motor.sense_pin,
                        safety_threshold: motor.safety_threshold,
                        operable: motor.is_operable(),
                    },
                })
                .collect(),
        }
    }
}

/// Shared, lockable handle to the runtime topology
#[derive(Debug, Clone, Default)]
pub struct SharedTopology {
    inner: Arc<RwLock<Hand>>,
}

impl SharedTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access for workers
    pub fn read(&self) -> RwLockReadGuard<'_, Hand> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write access (actuator commands, draining)
    pub fn write(&self) -> RwLockWriteGuard<'_, Hand> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the current contents with a fully built topology.
    ///
    /// The previous inputs and outputs are released and the new ones added in
    /// declaration order while the write lock is held. Returns the new
    /// generation.
    pub fn install(&self, built: Hand) -> u64 {
        let mut hand = self.write();
        hand.clear();
        for input in built.inputs {
            hand.add_input(input);
        }
        for output in built.outputs {
            hand.add_output(output);
        }
        hand.generation += 1;
        hand.generation
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Point this handle at a private copy of the current topology.
    /// Clones taken before keep the old one and no longer see changes.
    pub fn renew(&mut self) {
        let hand = self.read().clone();
        self.inner = Arc::new(RwLock::new(hand));
    }

    pub fn stop_all_motors(&self) -> usize {
        self.write().stop_all_motors()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        self.read().snapshot()
    }

    pub fn debug_dump(&self) -> String {
        self.read().debug_dump()
    }
}

/// Persisted view of a [`Hand`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub generation: u64,
    pub inputs: Vec<InputSnapshot>,
    pub outputs: Vec<OutputSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    /// `None` for an inert binding
    pub function: Option<String>,
    pub parameters: FunctionParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputSnapshot {
    #[serde(rename = "DC_motor")]
    DcMotor {
        name: String,
        in1_pin: PinAssignment,
        in2_pin: PinAssignment,
        sense_pin: PinAssignment,
        safety_threshold: Option<f64>,
        operable: bool,
    },
}
