//! This module materializes harness programs: complete programs in the target language that embed
//! the candidate's code, decode one test input, call the candidate's entry point and print exactly
//! one result line of the form `{"success":true,"result":...}` or
//! `{"success":false,"error":"..."}`.
//!

use serde_json::Value;

use crate::Result;
use crate::languages::LanguageProfile;

/// A materialized harness program.
#[derive(Clone, Debug)]
pub struct Harness {
    /// Name of the file the program must be saved as, relative to the execution directory.
    pub file_name: &'static str,

    /// Text of the program.
    pub text: String,
}

/// Materialize the harness program that runs `code` against `input`.
pub fn materialize(profile: &dyn LanguageProfile, code: &str, input: &Value) -> Result<Harness> {
    let serialized_input = serde_json::to_string(input)?;
    trace!("Materializing {} harness for input: {}", profile.language(), serialized_input);

    Ok(Harness {
        file_name: profile.source_file(),
        text: profile.harness(code, &serialized_input),
    })
}
