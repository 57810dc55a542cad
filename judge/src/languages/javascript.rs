use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of JavaScript on Node.js. The candidate defines `main(input)` or `solution(input)`,
/// either of which may return a promise.
pub struct JavaScript;

const TEMPLATE: &str = r#"{{CODE}}
;(function () {
  const __benchInput = JSON.parse("{{INPUT}}");
  const __benchEntry = typeof main === "function" ? main
    : typeof solution === "function" ? solution
    : undefined;
  if (__benchEntry === undefined) {
    throw new Error("entry point not found: define main(input) or solution(input)");
  }

  const __benchEmit = function (payload) {
    process.stdout.write("\n" + JSON.stringify(payload) + "\n");
  };
  const __benchFail = function (e) {
    const message = e instanceof Error ? e.name + ": " + e.message : String(e);
    __benchEmit({ success: false, error: message });
  };

  let __benchPending;
  try {
    __benchPending = Promise.resolve(__benchEntry(__benchInput));
  } catch (e) {
    __benchFail(e);
    return;
  }
  __benchPending.then(function (result) {
    try {
      __benchEmit(result === undefined ? { success: true } : { success: true, result: result });
    } catch (e) {
      __benchFail(e);
    }
  }, __benchFail);
})();
"#;

impl LanguageProfile for JavaScript {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn extension(&self) -> &'static str {
        "js"
    }

    fn source_file(&self) -> &'static str {
        "main.js"
    }

    fn run(&self, executable: &str) -> Vec<String> {
        command_line(&["node", executable])
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
    fn harness_guards_against_missing_semicolon() {
        let program = JavaScript.harness("const main = (x) => x", "[1,2]");

        assert!(program.starts_with("const main = (x) => x\n;(function"));
        assert!(program.contains(r#"JSON.parse("[1,2]")"#));
    }
}
