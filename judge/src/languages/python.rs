use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of Python 3. The candidate defines `main(input)`.
pub struct Python;

const TEMPLATE: &str = r#"import json as __bench_json
import sys as __bench_sys

{{CODE}}


def __bench_emit(payload):
    __bench_sys.stdout.write("\n" + __bench_json.dumps(payload, allow_nan=False) + "\n")
    __bench_sys.stdout.flush()


if __name__ == "__main__":
    __bench_input = __bench_json.loads("{{INPUT}}")
    __bench_entry = main
    try:
        __bench_result = __bench_entry(__bench_input)
    except BaseException as __bench_error:
        __bench_emit({"success": False,
                      "error": "%s: %s" % (type(__bench_error).__name__, __bench_error)})
    else:
        try:
            __bench_emit({"success": True, "result": __bench_result})
        except (TypeError, ValueError) as __bench_error:
            __bench_emit({"success": False,
                          "error": "result is not JSON serializable: %s" % __bench_error})
"#;

impl LanguageProfile for Python {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extension(&self) -> &'static str {
        "py"
    }

    fn source_file(&self) -> &'static str {
        "main.py"
    }

    fn run(&self, executable: &str) -> Vec<String> {
        command_line(&["python3", "-B", executable])
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let input = literal::c_like(serialized_input);
        render(TEMPLATE, &[("{{CODE}}", code), ("{{INPUT}}", input.as_str())])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_embeds_code_and_escaped_input() {
        let program = Python.harness("def main(x):\n    return x", r#"{"k":"a\"b"}"#);

        assert!(program.contains("def main(x):\n    return x"));
        assert!(program.contains(r#"__bench_json.loads("{\"k\":\"a\\\"b\"}")"#));
        assert!(!program.contains("{{"));
    }
}
