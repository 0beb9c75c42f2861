use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tool::{parse_arguments, Tool};

#[derive(Deserialize)]
struct InputParams {
    input: String,
}

fn input_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "input": { "type": "string", "description": description }
        },
        "required": ["input"]
    })
}

pub struct ToUpperCase;

#[async_trait]
impl Tool for ToUpperCase {
    fn name(&self) -> &'static str {
        "toUpperCase"
    }

    fn description(&self) -> &'static str {
        "Use this function to convert a string to uppercase"
    }

    fn parameters(&self) -> Value {
        input_schema("The string to convert to uppercase")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<InputParams>(self.name(), arguments) {
            Ok(params) => params.input.to_uppercase(),
            Err(error) => error,
        }
    }
}

pub struct ToLowerCase;

#[async_trait]
impl Tool for ToLowerCase {
    fn name(&self) -> &'static str {
        "toLowerCase"
    }

    fn description(&self) -> &'static str {
        "Use this function to convert a string to lowercase"
    }

    fn parameters(&self) -> Value {
        input_schema("The string to convert to lowercase")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<InputParams>(self.name(), arguments) {
            Ok(params) => params.input.to_lowercase(),
            Err(error) => error,
        }
    }
}

pub struct CapitalizeWords;

#[async_trait]
impl Tool for CapitalizeWords {
    fn name(&self) -> &'static str {
        "capitalizeWords"
    }

    fn description(&self) -> &'static str {
        "Use this function to capitalize the first letter of each word in a string"
    }

    fn parameters(&self) -> Value {
        input_schema("The string whose words should be capitalized")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<InputParams>(self.name(), arguments) {
            Ok(params) => capitalize_words(&params.input),
            Err(error) => error,
        }
    }
}

/// Uppercases the first alphanumeric character of each whitespace-delimited
/// word, leaving everything else untouched.
fn capitalize_words(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            output.push(ch);
        } else if at_word_start && ch.is_alphanumeric() {
            output.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            if ch.is_alphanumeric() {
                at_word_start = false;
            }
            output.push(ch);
        }
    }
    output
}

pub struct GetStringLength;

#[async_trait]
impl Tool for GetStringLength {
    fn name(&self) -> &'static str {
        "getStringLength"
    }

    fn description(&self) -> &'static str {
        "Use this function to get the length of a string"
    }

    fn parameters(&self) -> Value {
        input_schema("The string to measure")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<InputParams>(self.name(), arguments) {
            Ok(params) => params.input.chars().count().to_string(),
            Err(error) => error,
        }
    }
}

pub struct ReverseString;

#[async_trait]
impl Tool for ReverseString {
    fn name(&self) -> &'static str {
        "reverseString"
    }

    fn description(&self) -> &'static str {
        "Use this function to reverse a string"
    }

    fn parameters(&self) -> Value {
        input_schema("The string to reverse")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<InputParams>(self.name(), arguments) {
            Ok(params) => params.input.chars().rev().collect(),
            Err(error) => error,
        }
    }
}

pub struct ExtractSubstring;

#[async_trait]
impl Tool for ExtractSubstring {
    fn name(&self) -> &'static str {
        "extractSubstring"
    }

    fn description(&self) -> &'static str {
        "Use this function to extract a substring by character positions"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "The string to extract from" },
                "start": { "type": "integer", "description": "Zero-based start position" },
                "end": { "type": "integer", "description": "Optional exclusive end position" }
            },
            "required": ["input", "start"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            input: String,
            start: usize,
            end: Option<usize>,
        }
        match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => {
                let length = params.input.chars().count();
                // A start at or past the end has no characters to take, so it
                // is out of bounds even for the empty string.
                if params.start >= length {
                    return "Error: Start position is out of bounds".to_owned();
                }
                let end = params.end.unwrap_or(length).min(length);
                if end <= params.start {
                    return String::new();
                }
                params
                    .input
                    .chars()
                    .skip(params.start)
                    .take(end - params.start)
                    .collect()
            }
            Err(error) => error,
        }
    }
}

pub struct ReplaceText;

#[async_trait]
impl Tool for ReplaceText {
    fn name(&self) -> &'static str {
        "replaceText"
    }

    fn description(&self) -> &'static str {
        "Use this function to replace every occurrence of a substring"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "The string to operate on" },
                "search": { "type": "string", "description": "The literal text to find" },
                "replacement": { "type": "string", "description": "The text to insert in its place" }
            },
            "required": ["input", "search", "replacement"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            input: String,
            search: String,
            replacement: String,
        }
        match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params.input.replace(&params.search, &params.replacement),
            Err(error) => error,
        }
    }
}

pub struct SplitString;

#[async_trait]
impl Tool for SplitString {
    fn name(&self) -> &'static str {
        "splitString"
    }

    fn description(&self) -> &'static str {
        "Use this function to split a string by a delimiter into a JSON array"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "The string to split" },
                "delimiter": { "type": "string", "description": "The delimiter to split on" }
            },
            "required": ["input", "delimiter"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            input: String,
            delimiter: String,
        }
        match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => {
                let parts: Vec<&str> = params.input.split(&params.delimiter).collect();
                match serde_json::to_string(&parts) {
                    Ok(encoded) => encoded,
                    Err(error) => format!("Error: failed to encode split result: {error}"),
                }
            }
            Err(error) => error,
        }
    }
}

pub struct TrimWhitespace;

#[async_trait]
impl Tool for TrimWhitespace {
    fn name(&self) -> &'static str {
        "trimWhitespace"
    }

    fn description(&self) -> &'static str {
        "Use this function to trim leading and trailing whitespace from a string"
    }

    fn parameters(&self) -> Value {
        input_schema("The string to trim")
    }

    async fn execute(&self, arguments: Value) -> String {
        match parse_arguments::<InputParams>(self.name(), arguments) {
            Ok(params) => params.input.trim().to_owned(),
            Err(error) => error,
        }
    }
}
