use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of Rust. The candidate defines `fn solution(input: Json) -> impl Into<Json>`, where
/// `Json` is the dependency free JSON value type embedded in the harness.
pub struct Rust;

const TEMPLATE: &str = r##"#![allow(dead_code, unused_imports, unused_macros, unused_mut, unused_variables)]

#[derive(Clone, Debug)]
pub enum Json {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    String(String),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

static JSON_NULL: Json = Json::Null;

impl PartialEq for Json {
    fn eq(&self, other: &Json) -> bool {
        match (self, other) {
            (Json::Null, Json::Null) => true,
            (Json::Bool(a), Json::Bool(b)) => a == b,
            (Json::Int(a), Json::Int(b)) => a == b,
            (Json::Int(a), Json::Number(b)) | (Json::Number(b), Json::Int(a)) => *a as f64 == *b,
            (Json::Number(a), Json::Number(b)) => a == b,
            (Json::String(a), Json::String(b)) => a == b,
            (Json::Array(a), Json::Array(b)) => a == b,
            (Json::Object(a), Json::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Json {
    pub fn object(pairs: Vec<(String, Json)>) -> Json {
        Json::Object(pairs)
    }

    pub fn is_null(&self) -> bool {
        match self { Json::Null => true, _ => false }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Json::Bool(b) => Some(*b), _ => None }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Json::Int(i) => Some(*i as f64),
            Json::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Json::Int(i) => Some(*i),
            Json::Number(n) if n.fract() == 0.0 && n.abs() < 9.2e18 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Json::String(s) => Some(s.as_str()), _ => None }
    }

    pub fn as_array(&self) -> Option<&Vec<Json>> {
        match self { Json::Array(items) => Some(items), _ => None }
    }

    pub fn as_object(&self) -> Option<&Vec<(String, Json)>> {
        match self { Json::Object(pairs) => Some(pairs), _ => None }
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        match self {
            Json::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Json::Array(items) => items.len(),
            Json::Object(pairs) => pairs.len(),
            Json::String(s) => s.chars().count(),
            _ => 0,
        }
    }
}

impl std::ops::Index<usize> for Json {
    type Output = Json;
    fn index(&self, index: usize) -> &Json {
        match self {
            Json::Array(items) => items.get(index).unwrap_or(&JSON_NULL),
            _ => &JSON_NULL,
        }
    }
}

impl<'a> std::ops::Index<&'a str> for Json {
    type Output = Json;
    fn index(&self, key: &'a str) -> &Json {
        self.get(key).unwrap_or(&JSON_NULL)
    }
}

impl From<()> for Json { fn from(_: ()) -> Json { Json::Null } }
impl From<bool> for Json { fn from(v: bool) -> Json { Json::Bool(v) } }
impl From<i32> for Json { fn from(v: i32) -> Json { Json::Int(v as i64) } }
impl From<i64> for Json { fn from(v: i64) -> Json { Json::Int(v) } }
impl From<u32> for Json { fn from(v: u32) -> Json { Json::Int(v as i64) } }
impl From<isize> for Json { fn from(v: isize) -> Json { Json::Int(v as i64) } }
impl From<u64> for Json {
    fn from(v: u64) -> Json {
        if v <= i64::MAX as u64 { Json::Int(v as i64) } else { Json::Number(v as f64) }
    }
}
impl From<usize> for Json { fn from(v: usize) -> Json { Json::from(v as u64) } }
impl From<f32> for Json { fn from(v: f32) -> Json { Json::Number(v as f64) } }
impl From<f64> for Json { fn from(v: f64) -> Json { Json::Number(v) } }
impl From<char> for Json { fn from(v: char) -> Json { Json::String(v.to_string()) } }
impl From<String> for Json { fn from(v: String) -> Json { Json::String(v) } }
impl<'a> From<&'a str> for Json { fn from(v: &'a str) -> Json { Json::String(v.to_owned()) } }
impl<'a> From<&'a Json> for Json { fn from(v: &'a Json) -> Json { v.clone() } }

impl<T: Into<Json>> From<Vec<T>> for Json {
    fn from(v: Vec<T>) -> Json {
        Json::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Json>> From<Option<T>> for Json {
    fn from(v: Option<T>) -> Json {
        match v { Some(v) => v.into(), None => Json::Null }
    }
}

fn json_write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn json_write(out: &mut String, value: &Json) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Json::Int(i) => out.push_str(&i.to_string()),
        Json::Number(n) => {
            if !n.is_finite() {
                out.push_str("null");
            } else if n.fract() == 0.0 && n.abs() < 1e15 {
                out.push_str(&format!("{}", *n as i64));
            } else {
                out.push_str(&format!("{}", n));
            }
        }
        Json::String(s) => json_write_string(out, s),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 { out.push(','); }
                json_write(out, item);
            }
            out.push(']');
        }
        Json::Object(pairs) => {
            out.push('{');
            for (i, (key, item)) in pairs.iter().enumerate() {
                if i > 0 { out.push(','); }
                json_write_string(out, key);
                out.push(':');
                json_write(out, item);
            }
            out.push('}');
        }
    }
}

impl std::fmt::Display for Json {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        json_write(&mut out, self);
        f.write_str(&out)
    }
}

struct JsonParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> JsonParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && (self.bytes[self.pos] as char).is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, literal: &str) -> Result<(), String> {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(format!("expected `{}` at offset {}", literal, self.pos))
        }
    }

    fn value(&mut self) -> Result<Json, String> {
        self.skip_ws();
        match self.bytes.get(self.pos) {
            None => Err(String::from("unexpected end of input")),
            Some(b'n') => self.expect("null").map(|_| Json::Null),
            Some(b't') => self.expect("true").map(|_| Json::Bool(true)),
            Some(b'f') => self.expect("false").map(|_| Json::Bool(false)),
            Some(b'"') => self.string().map(Json::String),
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                self.skip_ws();
                if self.bytes.get(self.pos) == Some(&b']') {
                    self.pos += 1;
                    return Ok(Json::Array(items));
                }
                loop {
                    items.push(self.value()?);
                    self.skip_ws();
                    match self.bytes.get(self.pos) {
                        Some(b',') => self.pos += 1,
                        Some(b']') => { self.pos += 1; return Ok(Json::Array(items)); }
                        _ => return Err(format!("expected `,` or `]` at offset {}", self.pos)),
                    }
                }
            }
            Some(b'{') => {
                self.pos += 1;
                let mut pairs = Vec::new();
                self.skip_ws();
                if self.bytes.get(self.pos) == Some(&b'}') {
                    self.pos += 1;
                    return Ok(Json::Object(pairs));
                }
                loop {
                    self.skip_ws();
                    let key = self.string()?;
                    self.skip_ws();
                    self.expect(":")?;
                    let item = self.value()?;
                    pairs.push((key, item));
                    self.skip_ws();
                    match self.bytes.get(self.pos) {
                        Some(b',') => self.pos += 1,
                        Some(b'}') => { self.pos += 1; return Ok(Json::Object(pairs)); }
                        _ => return Err(format!("expected `,` or `}}` at offset {}", self.pos)),
                    }
                }
            }
            Some(_) => self.number(),
        }
    }

    fn number(&mut self) -> Result<Json, String> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && b"+-0123456789.eE".contains(&self.bytes[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|e| e.to_string())?;
        if !text.contains(|c: char| c == '.' || c == 'e' || c == 'E') {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Json::Int(i));
            }
        }
        text.parse::<f64>()
            .map(Json::Number)
            .map_err(|_| format!("invalid number `{}` at offset {}", text, start))
    }

    fn hex4(&mut self) -> Result<u32, String> {
        let digits = self.bytes.get(self.pos..self.pos + 4)
            .ok_or_else(|| String::from("truncated unicode escape"))?;
        let text = std::str::from_utf8(digits).map_err(|e| e.to_string())?;
        let code = u32::from_str_radix(text, 16).map_err(|e| e.to_string())?;
        self.pos += 4;
        Ok(code)
    }

    fn string(&mut self) -> Result<String, String> {
        self.expect("\"")?;
        let mut out = Vec::new();
        loop {
            let b = *self.bytes.get(self.pos).ok_or_else(|| String::from("unterminated string"))?;
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => {
                    let e = *self.bytes.get(self.pos).ok_or_else(|| String::from("bad escape"))?;
                    self.pos += 1;
                    let c = match e {
                        b'"' => '"',
                        b'\\' => '\\',
                        b'/' => '/',
                        b'b' => '\u{8}',
                        b'f' => '\u{c}',
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'u' => {
                            let mut code = self.hex4()?;
                            if (0xd800..0xdc00).contains(&code)
                                && self.bytes[self.pos..].starts_with(b"\\u") {
                                self.pos += 2;
                                let low = self.hex4()?;
                                code = 0x10000 + ((code - 0xd800) << 10) + (low - 0xdc00);
                            }
                            std::char::from_u32(code).unwrap_or('\u{fffd}')
                        }
                        _ => return Err(format!("bad escape at offset {}", self.pos)),
                    };
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
                b => out.push(b),
            }
        }
        String::from_utf8(out).map_err(|e| e.to_string())
    }
}

pub fn json_parse(text: &str) -> Result<Json, String> {
    let mut parser = JsonParser { bytes: text.as_bytes(), pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(format!("trailing characters at offset {}", parser.pos));
    }
    Ok(value)
}

{{CODE}}

fn main() {
    let input = match json_parse("{{INPUT}}") {
        Ok(input) => input,
        Err(e) => {
            eprintln!("cannot decode input: {}", e);
            std::process::exit(2);
        }
    };

    std::panic::set_hook(Box::new(|_| {}));
    let outcome = std::panic::catch_unwind(move || -> Json { solution(input).into() });
    let line = match outcome {
        Ok(result) => format!("{{\"success\":true,\"result\":{}}}", result),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                String::from("unknown panic")
            };
            format!("{{\"success\":false,\"error\":{}}}", Json::from(format!("panic: {}", message)))
        }
    };
    println!();
    println!("{}", line);
}
"##;

impl LanguageProfile for Rust {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extension(&self) -> &'static str {
        "rs"
    }

    fn source_file(&self) -> &'static str {
        "main.rs"
    }

    fn output_file(&self) -> &'static str {
        "main"
    }

    fn compile(&self, source: &str, output: &str) -> Option<Vec<String>> {
        Some(command_line(&["rustc", "-O", "--edition", "2021", "-o", output, source]))
    }

    fn run(&self, executable: &str) -> Vec<String> {
        vec![format!("./{}", executable)]
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let input = literal::rust(serialized_input);
        render(TEMPLATE, &[("{{CODE}}", code), ("{{INPUT}}", input.as_str())])
    }
}
