//! Builtin transfer functions

use super::{FunctionParams, TransferFn};

pub(super) const BUILTINS: &[(&str, TransferFn)] = &[
    ("identity", identity),
    ("linear", linear),
    ("quadratic", quadratic),
    ("exponential", exponential),
    ("map_range", map_range),
    ("clamp", clamp),
    ("voltage_divider", voltage_divider),
    ("threshold", threshold),
];

fn identity(value: f64, _params: &FunctionParams) -> f64 {
    value
}

fn linear(value: f64, params: &FunctionParams) -> f64 {
    params.get_or("a", 1.0) * value + params.get_or("b", 0.0)
}

fn quadratic(value: f64, params: &FunctionParams) -> f64 {
    let a = params.get_or("a", 0.0);
    let b = params.get_or("b", 0.0);
    let c = params.get_or("c", 0.0);
    a * value * value + b * value + c
}

fn exponential(value: f64, params: &FunctionParams) -> f64 {
    params.get_or("a", 1.0) * (params.get_or("b", 0.0) * value).exp() + params.get_or("c", 0.0)
}

fn map_range(value: f64, params: &FunctionParams) -> f64 {
    let in_min = params.get_or("in_min", 0.0);
    let in_max = params.get_or("in_max", 0.0);
    let out_min = params.get_or("out_min", 0.0);
    let out_max = params.get_or("out_max", 0.0);

    let span = in_max - in_min;
    if span == 0.0 {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / span + out_min
}

fn clamp(value: f64, params: &FunctionParams) -> f64 {
    let min = params.get_or("min", f64::NEG_INFINITY);
    let max = params.get_or("max", f64::INFINITY);
    if min > max {
        return value;
    }
    value.clamp(min, max)
}

// 12-bit ADC with a 3.3V reference unless told otherwise
fn voltage_divider(value: f64, params: &FunctionParams) -> f64 {
    let v_ref = params.get_or("v_ref", 3.3);
    let resolution = params.get_or("resolution", 4095.0);
    if resolution == 0.0 {
        return 0.0;
    }
    value * v_ref / resolution
}

fn threshold(value: f64, params: &FunctionParams) -> f64 {
    if value >= params.get_or("level", 0.0) {
        params.get_or("high", 1.0)
    } else {
        params.get_or("low", 0.0)
    }
}
