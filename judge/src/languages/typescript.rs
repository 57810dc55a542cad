use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of TypeScript, transpiled on the fly by `ts-node` without type checking. The entry
/// point contract is the same as for JavaScript.
pub struct TypeScript;

const TEMPLATE: &str = r#"{{CODE}}
;(function (): void {
  const __benchInput: unknown = JSON.parse("{{INPUT}}");
  const __benchEntry: ((input: any) => unknown) | undefined =
    typeof main === "function" ? (main as any)
    : typeof solution === "function" ? (solution as any)
    : undefined;
  if (__benchEntry === undefined) {
    throw new Error("entry point not found: define main(input) or solution(input)");
  }

  const __benchEmit = (payload: object): void => {
    process.stdout.write("\n" + JSON.stringify(payload) + "\n");
  };
  const __benchFail = (e: unknown): void => {
    const message = e instanceof Error ? e.name + ": " + e.message : String(e);
    __benchEmit({ success: false, error: message });
  };

  let __benchPending: Promise<unknown>;
  try {
    __benchPending = Promise.resolve(__benchEntry(__benchInput));
  } catch (e) {
    __benchFail(e);
    return;
  }
  __benchPending.then((result: unknown) => {
    try {
      __benchEmit(result === undefined ? { success: true } : { success: true, result });
    } catch (e) {
      __benchFail(e);
    }
  }, __benchFail);
})();
"#;

impl LanguageProfile for TypeScript {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn extension(&self) -> &'static str {
        "ts"
    }

    fn source_file(&self) -> &'static str {
        "main.ts"
    }

    fn run(&self, executable: &str) -> Vec<String> {
        command_line(&["ts-node", "--transpile-only", executable])
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let input = literal::c_like(serialized_input);
        render(TEMPLATE, &[("{{CODE}}", code), ("{{INPUT}}", input.as_str())])
    }
}
