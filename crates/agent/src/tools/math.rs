use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tool::{parse_arguments, Tool};

#[derive(Deserialize)]
struct PairParams {
    a: f64,
    b: f64,
}

fn pair_schema(a_description: &str, b_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "number", "description": a_description },
            "b": { "type": "number", "description": b_description }
        },
        "required": ["a", "b"]
    })
}

pub struct SumNumbers;

#[async_trait]
impl Tool for SumNumbers {
    fn name(&self) -> &'static str {
        "sumNumbers"
    }

    fn description(&self) -> &'static str {
        "Use this function to sum two numbers"
    }

    fn parameters(&self) -> Value {
        pair_schema("The first number", "The second number")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<PairParams>(self.name(), arguments) {
            Ok(params) => (params.a + params.b).to_string(),
            Err(error) => error,
        }
    }
}

pub struct SubtractNumbers;

#[async_trait]
impl Tool for SubtractNumbers {
    fn name(&self) -> &'static str {
        "subtractNumbers"
    }

    fn description(&self) -> &'static str {
        "Use this function to subtract two numbers"
    }

    fn parameters(&self) -> Value {
        pair_schema("The number to subtract from", "The number to subtract")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<PairParams>(self.name(), arguments) {
            Ok(params) => (params.a - params.b).to_string(),
            Err(error) => error,
        }
    }
}

pub struct MultiplyNumbers;

#[async_trait]
impl Tool for MultiplyNumbers {
    fn name(&self) -> &'static str {
        "multiplyNumbers"
    }

    fn description(&self) -> &'static str {
        "Use this function to multiply two numbers"
    }

    fn parameters(&self) -> Value {
        pair_schema("The first number", "The second number")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<PairParams>(self.name(), arguments) {
            Ok(params) => (params.a * params.b).to_string(),
            Err(error) => error,
        }
    }
}

pub struct DivideNumbers;

#[async_trait]
impl Tool for DivideNumbers {
    fn name(&self) -> &'static str {
        "divideNumbers"
    }

    fn description(&self) -> &'static str {
        "Use this function to divide two numbers"
    }

    fn parameters(&self) -> Value {
        pair_schema("The dividend a to divide", "The divisor b to divide by")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<PairParams>(self.name(), arguments) {
            Ok(params) if params.b == 0.0 => {
                "Error: Division by zero is not allowed".to_owned()
            }
            Ok(params) => (params.a / params.b).to_string(),
            Err(error) => error,
        }
    }
}

pub struct PowerNumbers;

#[async_trait]
impl Tool for PowerNumbers {
    fn name(&self) -> &'static str {
        "powerNumbers"
    }

    fn description(&self) -> &'static str {
        "Use this function to raise a number to a power"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "base": { "type": "number", "description": "The base number" },
                "exponent": { "type": "number", "description": "The exponent" }
            },
            "required": ["base", "exponent"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            base: f64,
            exponent: f64,
        }
        match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params.base.powf(params.exponent).to_string(),
            Err(error) => error,
        }
    }
}

pub struct SquareRoot;

#[async_trait]
impl Tool for SquareRoot {
    fn name(&self) -> &'static str {
        "squareRoot"
    }

    fn description(&self) -> &'static str {
        "Use this function to calculate the square root of a number"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "number": { "type": "number", "description": "The number to find the square root of" }
            },
            "required": ["number"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            number: f64,
        }
        match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) if params.number < 0.0 => {
                "Error: Cannot calculate square root of negative number".to_owned()
            }
            Ok(params) => params.number.sqrt().to_string(),
            Err(error) => error,
        }
    }
}

pub struct Modulo;

#[async_trait]
impl Tool for Modulo {
    fn name(&self) -> &'static str {
        "modulo"
    }

    fn description(&self) -> &'static str {
        "Use this function to find the remainder when dividing two numbers"
    }

    fn parameters(&self) -> Value {
        pair_schema("The dividend", "The divisor")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<PairParams>(self.name(), arguments) {
            Ok(params) if params.b == 0.0 => {
                "Error: Division by zero is not allowed".to_owned()
            }
            Ok(params) => (params.a % params.b).to_string(),
            Err(error) => error,
        }
    }
}
