//! Test data builders for configuration documents

use serde_json::{json, Map, Value};

/// Builder for one sensor entry
pub struct InputBuilder {
    name: String,
    id: i64,
    sensor_type: String,
    function: String,
    parameters: Map<String, Value>,
}

impl InputBuilder {
    pub fn new(name: &str, id: i64) -> Self {
        Self {
            name: name.to_string(),
            id,
            sensor_type: "analog".to_string(),
            function: "linear".to_string(),
            parameters: Map::new(),
        }
    }

    pub fn sensor_type(mut self, sensor_type: &str) -> Self {
        self.sensor_type = sensor_type.to_string();
        self
    }

    pub fn function(mut self, function: &str) -> Self {
        self.function = function.to_string();
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> Value {
        json!({
            "name": self.name,
            "id": self.id,
            "type": self.sensor_type,
            "function": { "name": self.function, "parameters": self.parameters },
        })
    }
}

/// Builder for one DC motor entry
pub struct MotorBuilder {
    name: String,
    pins: Vec<(String, i64)>,
    safety_threshold: Option<f64>,
}

impl MotorBuilder {
    /// A motor on pins 5/6/34 with a 2.5 threshold
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pins: vec![
                ("in1_pin".to_string(), 5),
                ("in2_pin".to_string(), 6),
                ("sense_pin".to_string(), 34),
            ],
            safety_threshold: Some(2.5),
        }
    }

    pub fn pins(mut self, in1: i64, in2: i64, sense: i64) -> Self {
        self.pins = vec![
            ("in1_pin".to_string(), in1),
            ("in2_pin".to_string(), in2),
            ("sense_pin".to_string(), sense),
        ];
        self
    }

    pub fn without_pin(mut self, role: &str) -> Self {
        self.pins.retain(|(r, _)| r != role);
        self
    }

    pub fn without_threshold(mut self) -> Self {
        self.safety_threshold = None;
        self
    }

    pub fn build(self) -> Value {
        let pins: Vec<Value> = self
            .pins
            .into_iter()
            .map(|(role, pin)| json!({ "type": role, "pin_number": pin }))
            .collect();
        let mut motor = json!({ "name": self.name, "type": "DC_motor", "pins": pins });
        if let Some(threshold) = self.safety_threshold {
            motor["safety_threshold"] = json!(threshold);
        }
        motor
    }
}

/// Builder for a whole configuration document
pub struct DocumentBuilder {
    file_type: Option<String>,
    inputs: Vec<Value>,
    outputs: Vec<Value>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            file_type: Some("config_system".to_string()),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn file_type(mut self, file_type: &str) -> Self {
        self.file_type = Some(file_type.to_string());
        self
    }

    pub fn without_file_type(mut self) -> Self {
        self.file_type = None;
        self
    }

    pub fn input(mut self, input: InputBuilder) -> Self {
        self.inputs.push(input.build());
        self
    }

    pub fn motor(mut self, motor: MotorBuilder) -> Self {
        self.outputs.push(motor.build());
        self
    }

    pub fn build(self) -> Value {
        let mut doc = json!({ "inputs": self.inputs, "outputs": self.outputs });
        if let Some(file_type) = self.file_type {
            doc["file_type"] = json!(file_type);
        }
        doc
    }

    pub fn to_yaml(self) -> String {
        serde_yaml::to_string(&self.build()).expect("document serializes to YAML")
    }

    pub fn to_json(self) -> String {
        serde_json::to_string_pretty(&self.build()).expect("document serializes to JSON")
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The one-sensor, one-motor configuration used throughout the tests
pub fn reference_document() -> DocumentBuilder {
    DocumentBuilder::new()
        .input(InputBuilder::new("temp1", 1).param("a", 2.0).param("b", 0.5))
        .motor(MotorBuilder::new("motor1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_builder() {
        let motor = MotorBuilder::new("m").without_pin("sense_pin").build();
        assert_eq!(motor["pins"].as_array().unwrap().len(), 2);
        assert_eq!(motor["safety_threshold"], json!(2.5));
    }
}
