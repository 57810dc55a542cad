use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of Java. The candidate defines `class Solution` with a static method
/// `Object solution(Object input)`. Top-level `public` modifiers are dropped so the candidate's
/// types can share `Main.java` with the harness.
pub struct Java;

/// Number of characters of the serialized input per string constant.
const CHUNK_CHARS: usize = 8000;

const TEMPLATE: &str = r##"{{CODE}}

final class BenchJson {
    private final String s;
    private int pos;

    private BenchJson(String s) {
        this.s = s;
    }

    static Object parse(String text) {
        BenchJson parser = new BenchJson(text);
        Object value = parser.value();
        parser.ws();
        if (parser.pos != text.length()) {
            throw new IllegalArgumentException("trailing characters after json");
        }
        return value;
    }

    private void ws() {
        while (pos < s.length() && " \t\r\n".indexOf(s.charAt(pos)) >= 0) {
            pos++;
        }
    }

    private void expect(String literal) {
        if (!s.startsWith(literal, pos)) {
            throw new IllegalArgumentException("expected " + literal + " at offset " + pos);
        }
        pos += literal.length();
    }

    private Object value() {
        ws();
        if (pos >= s.length()) {
            throw new IllegalArgumentException("unexpected end of json");
        }
        char c = s.charAt(pos);
        if (c == 'n') { expect("null"); return null; }
        if (c == 't') { expect("true"); return Boolean.TRUE; }
        if (c == 'f') { expect("false"); return Boolean.FALSE; }
        if (c == '"') return string();
        if (c == '[') {
            pos++;
            java.util.List<Object> items = new java.util.ArrayList<>();
            ws();
            if (pos < s.length() && s.charAt(pos) == ']') { pos++; return items; }
            while (true) {
                items.add(value());
                ws();
                char d = pos < s.length() ? s.charAt(pos) : '\0';
                pos++;
                if (d == ',') continue;
                if (d == ']') return items;
                throw new IllegalArgumentException("expected , or ] in json array");
            }
        }
        if (c == '{') {
            pos++;
            java.util.Map<String, Object> map = new java.util.LinkedHashMap<>();
            ws();
            if (pos < s.length() && s.charAt(pos) == '}') { pos++; return map; }
            while (true) {
                ws();
                String key = string();
                ws();
                expect(":");
                map.put(key, value());
                ws();
                char d = pos < s.length() ? s.charAt(pos) : '\0';
                pos++;
                if (d == ',') continue;
                if (d == '}') return map;
                throw new IllegalArgumentException("expected , or } in json object");
            }
        }
        return number();
    }

    private Object number() {
        int start = pos;
        boolean integral = true;
        while (pos < s.length() && "+-0123456789.eE".indexOf(s.charAt(pos)) >= 0) {
            char c = s.charAt(pos);
            if (c == '.' || c == 'e' || c == 'E') integral = false;
            pos++;
        }
        String text = s.substring(start, pos);
        if (integral) {
            try {
                return Long.parseLong(text);
            } catch (NumberFormatException e) {
                // Out of range for a long.
            }
        }
        return Double.parseDouble(text);
    }

    private String string() {
        expect("\"");
        StringBuilder out = new StringBuilder();
        while (true) {
            if (pos >= s.length()) {
                throw new IllegalArgumentException("unterminated json string");
            }
            char c = s.charAt(pos++);
            if (c == '"') break;
            if (c != '\\') { out.append(c); continue; }
            char e = s.charAt(pos++);
            switch (e) {
                case '"': out.append('"'); break;
                case '\\': out.append('\\'); break;
                case '/': out.append('/'); break;
                case 'b': out.append('\b'); break;
                case 'f': out.append('\f'); break;
                case 'n': out.append('\n'); break;
                case 'r': out.append('\r'); break;
                case 't': out.append('\t'); break;
                case 'u':
                    out.append((char) Integer.parseInt(s.substring(pos, pos + 4), 16));
                    pos += 4;
                    break;
                default:
                    throw new IllegalArgumentException("bad json escape");
            }
        }
        return out.toString();
    }

    static String write(Object value) {
        StringBuilder out = new StringBuilder();
        write(out, value);
        return out.toString();
    }

    private static void writeNumber(StringBuilder out, double d) {
        if (Double.isNaN(d) || Double.isInfinite(d)) {
            out.append("null");
        } else if (d == Math.floor(d) && Math.abs(d) < 1e15) {
            out.append((long) d);
        } else {
            out.append(Double.toString(d));
        }
    }

    private static void writeString(StringBuilder out, String s) {
        out.append('"');
        for (int i = 0; i < s.length(); i++) {
            char c = s.charAt(i);
            switch (c) {
                case '"': out.append("\\\""); break;
                case '\\': out.append("\\\\"); break;
                case '\n': out.append("\\n"); break;
                case '\r': out.append("\\r"); break;
                case '\t': out.append("\\t"); break;
                default:
                    if (c < 0x20 || c > 0x7e) {
                        out.append(String.format("\\u%04x", (int) c));
                    } else {
                        out.append(c);
                    }
            }
        }
        out.append('"');
    }

    private static void write(StringBuilder out, Object value) {
        if (value == null) {
            out.append("null");
        } else if (value instanceof Boolean) {
            out.append(((Boolean) value).booleanValue() ? "true" : "false");
        } else if (value instanceof Double || value instanceof Float
                || value instanceof java.math.BigDecimal) {
            writeNumber(out, ((Number) value).doubleValue());
        } else if (value instanceof Number) {
            out.append(value.toString());
        } else if (value instanceof CharSequence || value instanceof Character) {
            writeString(out, value.toString());
        } else if (value instanceof java.util.Map) {
            out.append('{');
            boolean first = true;
            for (java.util.Map.Entry<?, ?> entry : ((java.util.Map<?, ?>) value).entrySet()) {
                if (!first) out.append(',');
                first = false;
                writeString(out, String.valueOf(entry.getKey()));
                out.append(':');
                write(out, entry.getValue());
            }
            out.append('}');
        } else if (value instanceof Iterable) {
            out.append('[');
            boolean first = true;
            for (Object item : (Iterable<?>) value) {
                if (!first) out.append(',');
                first = false;
                write(out, item);
            }
            out.append(']');
        } else if (value.getClass().isArray()) {
            out.append('[');
            int length = java.lang.reflect.Array.getLength(value);
            for (int i = 0; i < length; i++) {
                if (i > 0) out.append(',');
                write(out, java.lang.reflect.Array.get(value, i));
            }
            out.append(']');
        } else {
            writeString(out, value.toString());
        }
    }
}

public class Main {
    public static void main(String[] args) {
        StringBuilder benchText = new StringBuilder();
{{INPUT_CHUNKS}}
        Object benchInput = BenchJson.parse(benchText.toString());

        String benchLine;
        try {
            Object benchResult = Solution.solution(benchInput);
            benchLine = "{\"success\":true,\"result\":" + BenchJson.write(benchResult) + "}";
        } catch (Throwable e) {
            benchLine = "{\"success\":false,\"error\":" + BenchJson.write(e.toString()) + "}";
        }

        System.out.println();
        System.out.println(benchLine);
        System.out.flush();
    }
}
"##;

/// Type declaration keywords that may follow `public` at the top level.
const TYPE_KEYWORDS: [&str; 6] = ["class", "interface", "enum", "record", "abstract", "final"];

/// Drop `package` declarations and top-level `public` type modifiers from the candidate code.
fn normalize_candidate(code: &str) -> String {
    code.lines()
        .filter(|line| !line.starts_with("package "))
        .map(|line| {
            match line.strip_prefix("public ") {
                Some(rest) if TYPE_KEYWORDS.iter().any(|kw| rest.starts_with(kw)) => rest,
                _ => line,
            }
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

impl LanguageProfile for Java {
    fn language(&self) -> Language {
        Language::Java
    }

    fn extension(&self) -> &'static str {
        "java"
    }

    fn source_file(&self) -> &'static str {
        "Main.java"
    }

    fn output_file(&self) -> &'static str {
        "classes"
    }

    fn compile(&self, source: &str, output: &str) -> Option<Vec<String>> {
        Some(command_line(&["javac", "-encoding", "UTF-8", "-d", output, source]))
    }

    fn run(&self, executable: &str) -> Vec<String> {
        command_line(&["java", "-cp", executable, "Main"])
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let code = normalize_candidate(code);
        let chunks = literal::java_chunks(serialized_input, CHUNK_CHARS)
            .into_iter()
            .map(|chunk| format!("        benchText.append(\"{}\");", chunk))
            .collect::<Vec<String>>()
            .join("\n");
        render(TEMPLATE, &[("{{CODE}}", code.as_str()), ("{{INPUT_CHUNKS}}", chunks.as_str())])
    }
}
