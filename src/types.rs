//! Core data types for the runtime topology
//!
//! This module contains the objects a topology is made of: sensor inputs bound
//! to transfer functions, and actuator outputs with their pin assignments.
//!
//! # Main Types
//!
//! - [`FunctionBinding`] - Resolved transfer function plus its parameters
//! - [`Input`] - A configured sensor
//! - [`Output`] - A configured actuator, one variant per actuator kind
//! - [`DcMotor`] - H-bridge driven DC motor with a current sense pin
//! - [`MotorState`] - Commanded motor state
//!
//! # Inert Objects
//!
//! Configuration mistakes do not abort a build. An input whose transfer
//! function could not be resolved carries an inert binding and never produces
//! a value; a motor with a missing or invalid pin role is built inoperable and
//! refuses every command except [`MotorState::Stop`].

use crate::functions::{FunctionParams, TransferFunction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hardware pin number
pub type PinNumber = u8;

/// Output type tag for DC motors
pub const DC_MOTOR_TAG: &str = "DC_motor";

/// Association of an input with a transfer function and its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBinding {
    function: Option<TransferFunction>,
    parameters: FunctionParams,
}

impl FunctionBinding {
    /// Binding to a resolved function
    pub fn resolved(function: TransferFunction, parameters: FunctionParams) -> Self {
        Self {
            function: Some(function),
            parameters,
        }
    }

    /// Binding whose function could not be resolved
    pub fn inert(parameters: FunctionParams) -> Self {
        Self {
            function: None,
            parameters,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.function.is_none()
    }

    pub fn function(&self) -> Option<&TransferFunction> {
        self.function.as_ref()
    }

    /// Name of the bound function, if resolved
    pub fn function_name(&self) -> Option<&'static str> {
        self.function.map(|f| f.name())
    }

    pub fn parameters(&self) -> &FunctionParams {
        &self.parameters
    }

    /// Evaluate the bound function. Inert bindings yield `None`.
    pub fn evaluate(&self, value: f64) -> Option<f64> {
        self.function.map(|f| f.apply(value, &self.parameters))
    }
}

/// A configured sensor
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    /// Identifier, unique within a topology
    pub id: i64,
    pub name: String,
    /// Sensor type tag from the configuration (e.g. "analog")
    pub sensor_type: String,
    pub binding: FunctionBinding,
}

impl Input {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        sensor_type: impl Into<String>,
        binding: FunctionBinding,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            sensor_type: sensor_type.into(),
            binding,
        }
    }

    /// True if this sensor will not produce values until reconfigured
    pub fn is_inert(&self) -> bool {
        self.binding.is_inert()
    }

    /// Convert a measured value through the bound transfer function
    pub fn convert(&self, measured: f64) -> Option<f64> {
        self.binding.evaluate(measured)
    }
}

/// Commanded state of a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotorState {
    RunForward,
    RunReverse,
    #[default]
    Stop,
}

impl std::fmt::Display for MotorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotorState::RunForward => write!(f, "RUN_FORWARD"),
            MotorState::RunReverse => write!(f, "RUN_REVERSE"),
            MotorState::Stop => write!(f, "STOP"),
        }
    }
}

/// Role a pin plays on a DC motor driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinRole {
    In1,
    In2,
    Sense,
}

impl PinRole {
    pub const ALL: [PinRole; 3] = [PinRole::In1, PinRole::In2, PinRole::Sense];

    /// Tag used for this role in configuration documents
    pub fn tag(&self) -> &'static str {
        match self {
            PinRole::In1 => "in1_pin",
            PinRole::In2 => "in2_pin",
            PinRole::Sense => "sense_pin",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "in1_pin" => Some(PinRole::In1),
            "in2_pin" => Some(PinRole::In2),
            "sense_pin" => Some(PinRole::Sense),
            _ => None,
        }
    }
}

impl std::fmt::Display for PinRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Pin assigned to a role, or the explicit absence of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinAssignment {
    Assigned(PinNumber),
    #[default]
    Unassigned,
}

impl PinAssignment {
    pub fn pin(&self) -> Option<PinNumber> {
        match self {
            PinAssignment::Assigned(pin) => Some(*pin),
            PinAssignment::Unassigned => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, PinAssignment::Assigned(_))
    }
}

impl std::fmt::Display for PinAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinAssignment::Assigned(pin) => write!(f, "{}", pin),
            PinAssignment::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// Errors raised when commanding an actuator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("Actuator '{name}' is inoperable and only accepts STOP")]
    Inoperable { name: String },
}

/// DC motor driven through two H-bridge inputs with a current sense pin
#[derive(Debug, Clone, PartialEq)]
pub struct DcMotor {
    pub name: String,
    pub in1_pin: PinAssignment,
    pub in2_pin: PinAssignment,
    pub sense_pin: PinAssignment,
    /// Sensed value above which the motor is forced to STOP
    pub safety_threshold: Option<f64>,
    state: MotorState,
    inhibited: bool,
}

impl DcMotor {
    pub fn new(
        name: impl Into<String>,
        in1_pin: PinAssignment,
        in2_pin: PinAssignment,
        sense_pin: PinAssignment,
        safety_threshold: Option<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            in1_pin,
            in2_pin,
            sense_pin,
            safety_threshold,
            state: MotorState::Stop,
            inhibited: false,
        }
    }

    /// Pin assigned to a role
    pub fn pin(&self, role: PinRole) -> PinAssignment {
        match role {
            PinRole::In1 => self.in1_pin,
            PinRole::In2 => self.in2_pin,
            PinRole::Sense => self.sense_pin,
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Keep the motor stopped regardless of its pin assignment
    pub fn inhibit(&mut self) {
        self.inhibited = true;
        self.state = MotorState::Stop;
    }

    /// A motor can run only with every pin role assigned and a safety threshold
    pub fn is_operable(&self) -> bool {
        !self.inhibited
            && PinRole::ALL.iter().all(|role| self.pin(*role).is_assigned())
            && self.safety_threshold.is_some()
    }

    /// Command a new state. STOP is always accepted.
    pub fn set_state(&mut self, state: MotorState) -> Result<(), ActuatorError> {
        if state != MotorState::Stop && !self.is_operable() {
            return Err(ActuatorError::Inoperable {
                name: self.name.clone(),
            });
        }
        if self.state != state {
            tracing::trace!("Motor '{}' {} -> {}", self.name, self.state, state);
        }
        self.state = state;
        Ok(())
    }

    /// Force STOP when the sensed value exceeds the safety threshold.
    /// Returns true if the motor was tripped by this call.
    pub fn check_safety(&mut self, sensed: f64) -> bool {
        let Some(limit) = self.safety_threshold else {
            return false;
        };
        if self.state != MotorState::Stop && sensed.abs() > limit {
            tracing::warn!(
                "Motor '{}' sensed {} above safety threshold {}, stopping",
                self.name,
                sensed,
                limit
            );
            self.state = MotorState::Stop;
            return true;
        }
        false
    }
}

/// A configured actuator
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    DcMotor(DcMotor),
}

impl Output {
    pub fn name(&self) -> &str {
        match self {
            Output::DcMotor(motor) => &motor.name,
        }
    }

    /// Output type tag as written in configuration documents
    pub fn type_tag(&self) -> &'static str {
        match self {
            Output::DcMotor(_) => DC_MOTOR_TAG,
        }
    }

    pub fn is_operable(&self) -> bool {
        match self {
            Output::DcMotor(motor) => motor.is_operable(),
        }
    }

    /// Bring the actuator to its safe state
    pub fn stop(&mut self) {
        match self {
            // STOP is accepted unconditionally
            Output::DcMotor(motor) => {
                let _ = motor.set_state(MotorState::Stop);
            }
        }
    }

    pub fn as_dc_motor(&self) -> Option<&DcMotor> {
        match self {
            Output::DcMotor(motor) => Some(motor),
        }
    }

    pub fn as_dc_motor_mut(&mut self) -> Option<&mut DcMotor> {
        match self {
            Output::DcMotor(motor) => Some(motor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;

    fn test_motor() -> DcMotor {
        DcMotor::new(
            "motor1",
            PinAssignment::Assigned(5),
            PinAssignment::Assigned(6),
            PinAssignment::Assigned(34),
            Some(2.5),
        )
    }

    #[test]
    fn test_resolved_binding_evaluates() {
        let linear = FunctionRegistry::builtin().resolve("linear").unwrap();
        let mut params = FunctionParams::new();
        params.insert("a", 2.0);
        let binding = FunctionBinding::resolved(linear, params);

        assert!(!binding.is_inert());
        assert_eq!(binding.function_name(), Some("linear"));
        assert_eq!(binding.evaluate(3.0), Some(6.0));
    }

    #[test]
    fn test_inert_binding_never_evaluates() {
        let binding = FunctionBinding::inert(FunctionParams::new());
        let input = Input::new(7, "broken", "analog", binding);

        assert!(input.is_inert());
        assert_eq!(input.convert(1.0), None);
    }

    #[test]
    fn test_motor_starts_stopped() {
        let motor = test_motor();
        assert_eq!(motor.state(), MotorState::Stop);
        assert!(motor.is_operable());
    }

    #[test]
    fn test_motor_state_changes() {
        let mut motor = test_motor();
        motor.set_state(MotorState::RunForward).unwrap();
        assert_eq!(motor.state(), MotorState::RunForward);
        motor.set_state(MotorState::RunReverse).unwrap();
        assert_eq!(motor.state(), MotorState::RunReverse);
    }

    #[test]
    fn test_unassigned_pin_makes_motor_inoperable() {
        let mut motor = test_motor();
        motor.sense_pin = PinAssignment::Unassigned;

        assert!(!motor.is_operable());
        assert_eq!(
            motor.set_state(MotorState::RunForward),
            Err(ActuatorError::Inoperable {
                name: "motor1".to_string()
            })
        );
        assert!(motor.set_state(MotorState::Stop).is_ok());
    }

    #[test]
    fn test_missing_threshold_makes_motor_inoperable() {
        let mut motor = test_motor();
        motor.safety_threshold = None;
        assert!(!motor.is_operable());
    }

    #[test]
    fn test_inhibit_forces_stop() {
        let mut motor = test_motor();
        motor.set_state(MotorState::RunForward).unwrap();
        motor.inhibit();

        assert_eq!(motor.state(), MotorState::Stop);
        assert!(motor.set_state(MotorState::RunReverse).is_err());
    }

    #[test]
    fn test_safety_trip() {
        let mut motor = test_motor();
        motor.set_state(MotorState::RunForward).unwrap();

        assert!(!motor.check_safety(2.0));
        assert_eq!(motor.state(), MotorState::RunForward);

        assert!(motor.check_safety(-3.0));
        assert_eq!(motor.state(), MotorState::Stop);

        // Already stopped, nothing to trip
        assert!(!motor.check_safety(10.0));
    }

    #[test]
    fn test_pin_role_tags() {
        for role in PinRole::ALL {
            assert_eq!(PinRole::from_tag(role.tag()), Some(role));
        }
        assert_eq!(PinRole::from_tag("pwm_pin"), None);
    }

    #[test]
    fn test_output_dispatch() {
        let mut output = Output::DcMotor(test_motor());
        assert_eq!(output.name(), "motor1");
        assert_eq!(output.type_tag(), DC_MOTOR_TAG);

        output
            .as_dc_motor_mut()
            .unwrap()
            .set_state(MotorState::RunForward)
            .unwrap();
        output.stop();
        assert_eq!(output.as_dc_motor().unwrap().state(), MotorState::Stop);
    }

    #[test]
    fn test_motor_state_display() {
        assert_eq!(MotorState::RunForward.to_string(), "RUN_FORWARD");
        assert_eq!(MotorState::Stop.to_string(), "STOP");
        assert_eq!(PinAssignment::Unassigned.to_string(), "unassigned");
    }
}
