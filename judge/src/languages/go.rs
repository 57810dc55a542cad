use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of Go. The candidate defines `func Solution(input any) any`; its `package` clause, if
/// any, is dropped because the harness owns `package main`.
pub struct Go;

const TEMPLATE: &str = r#"package main

import (
	harnessjson "encoding/json"
	harnessfmt "fmt"
	harnessos "os"
)

{{CODE}}

func harnessEmit(payload map[string]interface{}) {
	data, err := harnessjson.Marshal(payload)
	if err != nil {
		data, _ = harnessjson.Marshal(map[string]interface{}{
			"success": false,
			"error":   "result is not JSON serializable: " + err.Error(),
		})
	}
	harnessos.Stdout.Write([]byte("\n"))
	harnessos.Stdout.Write(data)
	harnessos.Stdout.Write([]byte("\n"))
}

func harnessInvoke(input interface{}) (result interface{}, err error) {
	defer func() {
		if r := recover(); r != nil {
			err = harnessfmt.Errorf("panic: %v", r)
		}
	}()
	return Solution(input), nil
}

func main() {
	var input interface{}
	if err := harnessjson.Unmarshal([]byte("{{INPUT}}"), &input); err != nil {
		harnessfmt.Fprintln(harnessos.Stderr, "cannot decode input:", err)
		harnessos.Exit(2)
	}

	result, err := harnessInvoke(input)
	if err != nil {
		harnessEmit(map[string]interface{}{"success": false, "error": err.Error()})
		return
	}
	harnessEmit(map[string]interface{}{"success": true, "result": result})
}
"#;

/// Drop `package` clauses from the candidate code.
fn strip_package_clause(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim_start().starts_with("package "))
        .collect::<Vec<&str>>()
        .join("\n")
}

impl LanguageProfile for Go {
    fn language(&self) -> Language {
        Language::Go
    }

    fn extension(&self) -> &'static str {
        "go"
    }

    fn source_file(&self) -> &'static str {
        "main.go"
    }

    fn output_file(&self) -> &'static str {
        "main"
    }

    fn compile(&self, source: &str, output: &str) -> Option<Vec<String>> {
        Some(command_line(&["go", "build", "-o", output, source]))
    }

    fn run(&self, executable: &str) -> Vec<String> {
        vec![format!("./{}", executable)]
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let code = strip_package_clause(code);
        let input = literal::c_like(serialized_input);
        render(TEMPLATE, &[("{{CODE}}", code.as_str()), ("{{INPUT}}", input.as_str())])
    }
}
