//! Property tests for topology construction

mod common;

use common::builders::{DocumentBuilder, InputBuilder, MotorBuilder};
use hand_reconfig::config::HardwareProfile;
use hand_reconfig::topology::TopologyBuilder;
use hand_reconfig::{ConfigDocument, FunctionRegistry, SharedTopology};
use proptest::prelude::*;

fn document(inputs: usize, motors: usize) -> ConfigDocument {
    let mut doc = DocumentBuilder::new();
    for i in 0..inputs {
        doc = doc.input(InputBuilder::new(&format!("sensor{}", i), i as i64 + 100));
    }
    for m in 0..motors {
        // Pins 0..=35 stay distinct and on-board for up to 12 motors
        let base = (m * 3) as i64;
        doc = doc.motor(MotorBuilder::new(&format!("motor{}", m)).pins(base, base + 1, base + 2));
    }
    ConfigDocument::from_value(doc.build()).unwrap()
}

proptest! {
    #[test]
    fn prop_all_entries_present_in_declaration_order(inputs in 0usize..40, motors in 0usize..12) {
        let registry = FunctionRegistry::builtin();
        let hardware = HardwareProfile::default();
        let out = TopologyBuilder::new(&registry, &hardware).build(&document(inputs, motors));

        prop_assert!(out.diagnostics.is_empty());
        prop_assert_eq!(out.topology.inputs().len(), inputs);
        prop_assert_eq!(out.topology.outputs().len(), motors);

        for (i, input) in out.topology.inputs().iter().enumerate() {
            prop_assert_eq!(input.id, i as i64 + 100);
        }
        for (m, output) in out.topology.outputs().iter().enumerate() {
            let expected = format!("motor{}", m);
            prop_assert_eq!(output.name(), expected.as_str());
            prop_assert!(output.is_operable());
        }
    }

    #[test]
    fn prop_install_replaces_previous_topology(first in 0usize..20, second in 0usize..20) {
        let registry = FunctionRegistry::builtin();
        let hardware = HardwareProfile::default();
        let builder = TopologyBuilder::new(&registry, &hardware);
        let shared = SharedTopology::new();

        shared.install(builder.build(&document(first, 1)).topology);
        let generation = shared.install(builder.build(&document(second, 0)).topology);

        prop_assert_eq!(generation, 2);
        let hand = shared.read();
        prop_assert_eq!(hand.inputs().len(), second);
        prop_assert!(hand.outputs().is_empty());
    }

    #[test]
    fn prop_linear_parameters_apply(
        a in -1.0e3f64..1.0e3,
        b in -1.0e3f64..1.0e3,
        x in -1.0e3f64..1.0e3
    ) {
        let doc = DocumentBuilder::new()
            .input(InputBuilder::new("s", 1).param("a", a).param("b", b))
            .build();
        let registry = FunctionRegistry::builtin();
        let hardware = HardwareProfile::default();
        let out = TopologyBuilder::new(&registry, &hardware)
            .build(&ConfigDocument::from_value(doc).unwrap());

        let converted = out.topology.inputs()[0].convert(x).unwrap();
        prop_assert!((converted - (a * x + b)).abs() < 1e-6);
    }
}
