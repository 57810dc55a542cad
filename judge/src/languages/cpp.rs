use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of C++17. The candidate defines `Json solution(const Json& input)`, where `Json` is the
/// JSON value type embedded in the harness.
pub struct Cpp;

const TEMPLATE: &str = r##"#include <cerrno>
#include <climits>
#include <cmath>
#include <cstddef>
#include <cstdio>
#include <cstdlib>
#include <exception>
#include <stdexcept>
#include <string>
#include <vector>

struct Json {
    enum Kind { Null, Bool, Number, String, Array, Object };

    Kind kind = Null;
    bool boolean = false;
    double number = 0;
    bool integral = false;
    long long integer = 0;
    std::string text;
    std::vector<Json> items;
    std::vector<std::string> keys;
    std::vector<Json> values;

    Json() {}
    Json(std::nullptr_t) {}
    Json(bool v) : kind(Bool), boolean(v) {}
    Json(int v) : Json(static_cast<long long>(v)) {}
    Json(long v) : Json(static_cast<long long>(v)) {}
    Json(long long v)
        : kind(Number), number(static_cast<double>(v)), integral(true), integer(v) {}
    Json(unsigned v) : Json(static_cast<long long>(v)) {}
    Json(unsigned long v) : Json(static_cast<unsigned long long>(v)) {}
    Json(unsigned long long v) : kind(Number), number(static_cast<double>(v)) {
        if (v <= static_cast<unsigned long long>(LLONG_MAX)) {
            integral = true;
            integer = static_cast<long long>(v);
        }
    }
    Json(float v) : kind(Number), number(v) {}
    Json(double v) : kind(Number), number(v) {}
    Json(const char* v) : kind(String), text(v) {}
    Json(const std::string& v) : kind(String), text(v) {}
    template <typename T>
    Json(const std::vector<T>& v) : kind(Array) {
        for (const auto& item : v) items.push_back(Json(item));
    }

    static Json array() { Json j; j.kind = Array; return j; }
    static Json object() { Json j; j.kind = Object; return j; }

    bool is_null() const { return kind == Null; }
    bool is_bool() const { return kind == Bool; }
    bool is_number() const { return kind == Number; }
    bool is_string() const { return kind == String; }
    bool is_array() const { return kind == Array; }
    bool is_object() const { return kind == Object; }

    bool as_bool() const {
        if (kind != Bool) throw std::runtime_error("json value is not a boolean");
        return boolean;
    }
    double as_double() const {
        if (kind != Number) throw std::runtime_error("json value is not a number");
        return number;
    }
    long long as_int() const {
        if (kind == Number && integral) return integer;
        return static_cast<long long>(as_double());
    }
    const std::string& as_string() const {
        if (kind != String) throw std::runtime_error("json value is not a string");
        return text;
    }

    std::size_t size() const {
        if (kind == Array) return items.size();
        if (kind == Object) return keys.size();
        if (kind == String) return text.size();
        return 0;
    }

    bool has(const std::string& key) const {
        for (const auto& k : keys) if (k == key) return true;
        return false;
    }

    const Json& at(std::size_t index) const {
        if (kind != Array || index >= items.size()) throw std::out_of_range("json index out of range");
        return items[index];
    }
    const Json& at(const std::string& key) const {
        for (std::size_t i = 0; i < keys.size(); ++i) if (keys[i] == key) return values[i];
        throw std::out_of_range("json key not found: " + key);
    }
    const Json& operator[](int index) const { return at(static_cast<std::size_t>(index)); }
    const Json& operator[](std::size_t index) const { return at(index); }
    const Json& operator[](const std::string& key) const { return at(key); }
    const Json& operator[](const char* key) const { return at(std::string(key)); }

    void push_back(const Json& v) { kind = Array; items.push_back(v); }
    void set(const std::string& key, const Json& v) {
        kind = Object;
        for (std::size_t i = 0; i < keys.size(); ++i) {
            if (keys[i] == key) { values[i] = v; return; }
        }
        keys.push_back(key);
        values.push_back(v);
    }

    std::vector<Json>::const_iterator begin() const { return items.begin(); }
    std::vector<Json>::const_iterator end() const { return items.end(); }

    static void write_string(std::string& out, const std::string& s) {
        out += '"';
        for (unsigned char c : s) {
            switch (c) {
                case '"': out += "\\\""; break;
                case '\\': out += "\\\\"; break;
                case '\n': out += "\\n"; break;
                case '\r': out += "\\r"; break;
                case '\t': out += "\\t"; break;
                default:
                    if (c < 0x20) {
                        char buf[8];
                        std::snprintf(buf, sizeof(buf), "\\u%04x", c);
                        out += buf;
                    } else {
                        out += static_cast<char>(c);
                    }
            }
        }
        out += '"';
    }

    void write(std::string& out) const {
        switch (kind) {
            case Null: out += "null"; break;
            case Bool: out += boolean ? "true" : "false"; break;
            case Number: {
                char buf[64];
                if (!std::isfinite(number)) {
                    out += "null";
                    break;
                }
                if (integral) {
                    std::snprintf(buf, sizeof(buf), "%lld", integer);
                } else if (std::floor(number) == number && std::fabs(number) < 1e15) {
                    std::snprintf(buf, sizeof(buf), "%lld", static_cast<long long>(number));
                } else {
                    std::snprintf(buf, sizeof(buf), "%.17g", number);
                }
                out += buf;
                break;
            }
            case String: write_string(out, text); break;
            case Array:
                out += '[';
                for (std::size_t i = 0; i < items.size(); ++i) {
                    if (i > 0) out += ',';
                    items[i].write(out);
                }
                out += ']';
                break;
            case Object:
                out += '{';
                for (std::size_t i = 0; i < keys.size(); ++i) {
                    if (i > 0) out += ',';
                    write_string(out, keys[i]);
                    out += ':';
                    values[i].write(out);
                }
                out += '}';
                break;
        }
    }

    std::string dump() const {
        std::string out;
        write(out);
        return out;
    }

    static Json parse(const std::string& text);
};

struct JsonParser {
    const std::string& s;
    std::size_t pos = 0;

    explicit JsonParser(const std::string& text) : s(text) {}

    void ws() {
        while (pos < s.size() && (s[pos] == ' ' || s[pos] == '\n' || s[pos] == '\r' || s[pos] == '\t')) ++pos;
    }

    void expect(const char* literal) {
        std::string lit(literal);
        if (s.compare(pos, lit.size(), lit) != 0) throw std::runtime_error("invalid json literal");
        pos += lit.size();
    }

    unsigned hex4() {
        if (pos + 4 > s.size()) throw std::runtime_error("truncated unicode escape");
        unsigned code = static_cast<unsigned>(std::stoul(s.substr(pos, 4), nullptr, 16));
        pos += 4;
        return code;
    }

    static void append_utf8(std::string& out, unsigned cp) {
        if (cp < 0x80) {
            out += static_cast<char>(cp);
        } else if (cp < 0x800) {
            out += static_cast<char>(0xc0 | (cp >> 6));
            out += static_cast<char>(0x80 | (cp & 0x3f));
        } else if (cp < 0x10000) {
            out += static_cast<char>(0xe0 | (cp >> 12));
            out += static_cast<char>(0x80 | ((cp >> 6) & 0x3f));
            out += static_cast<char>(0x80 | (cp & 0x3f));
        } else {
            out += static_cast<char>(0xf0 | (cp >> 18));
            out += static_cast<char>(0x80 | ((cp >> 12) & 0x3f));
            out += static_cast<char>(0x80 | ((cp >> 6) & 0x3f));
            out += static_cast<char>(0x80 | (cp & 0x3f));
        }
    }

    std::string string() {
        expect("\"");
        std::string out;
        while (true) {
            if (pos >= s.size()) throw std::runtime_error("unterminated json string");
            char c = s[pos++];
            if (c == '"') break;
            if (c != '\\') { out += c; continue; }
            if (pos >= s.size()) throw std::runtime_error("bad json escape");
            char e = s[pos++];
            switch (e) {
                case '"': out += '"'; break;
                case '\\': out += '\\'; break;
                case '/': out += '/'; break;
                case 'b': out += '\b'; break;
                case 'f': out += '\f'; break;
                case 'n': out += '\n'; break;
                case 'r': out += '\r'; break;
                case 't': out += '\t'; break;
                case 'u': {
                    unsigned cp = hex4();
                    if (cp >= 0xd800 && cp < 0xdc00 && s.compare(pos, 2, "\\u") == 0) {
                        pos += 2;
                        unsigned low = hex4();
                        cp = 0x10000 + ((cp - 0xd800) << 10) + (low - 0xdc00);
                    }
                    append_utf8(out, cp);
                    break;
                }
                default: throw std::runtime_error("bad json escape");
            }
        }
        return out;
    }

    Json value() {
        ws();
        if (pos >= s.size()) throw std::runtime_error("unexpected end of json");
        char c = s[pos];
        if (c == 'n') { expect("null"); return Json(); }
        if (c == 't') { expect("true"); return Json(true); }
        if (c == 'f') { expect("false"); return Json(false); }
        if (c == '"') return Json(string());
        if (c == '[') {
            ++pos;
            Json arr = Json::array();
            ws();
            if (pos < s.size() && s[pos] == ']') { ++pos; return arr; }
            while (true) {
                arr.items.push_back(value());
                ws();
                if (pos < s.size() && s[pos] == ',') { ++pos; continue; }
                if (pos < s.size() && s[pos] == ']') { ++pos; return arr; }
                throw std::runtime_error("expected , or ] in json array");
            }
        }
        if (c == '{') {
            ++pos;
            Json obj = Json::object();
            ws();
            if (pos < s.size() && s[pos] == '}') { ++pos; return obj; }
            while (true) {
                ws();
                std::string key = string();
                ws();
                expect(":");
                Json item = value();
                obj.keys.push_back(key);
                obj.values.push_back(item);
                ws();
                if (pos < s.size() && s[pos] == ',') { ++pos; continue; }
                if (pos < s.size() && s[pos] == '}') { ++pos; return obj; }
                throw std::runtime_error("expected , or } in json object");
            }
        }
        const char* start = s.c_str() + pos;
        char* end = nullptr;
        double number = std::strtod(start, &end);
        if (end == start) throw std::runtime_error("invalid json value");
        std::string token(start, static_cast<const char*>(end));
        pos += static_cast<std::size_t>(end - start);
        if (token.find_first_of(".eE") == std::string::npos) {
            errno = 0;
            long long integer = std::strtoll(token.c_str(), nullptr, 10);
            if (errno != ERANGE) return Json(integer);
        }
        return Json(number);
    }
};

Json Json::parse(const std::string& text) {
    JsonParser parser(text);
    Json result = parser.value();
    parser.ws();
    if (parser.pos != text.size()) throw std::runtime_error("trailing characters after json");
    return result;
}

bool operator==(const Json& a, const Json& b) {
    if (a.kind != b.kind) return false;
    switch (a.kind) {
        case Json::Null: return true;
        case Json::Bool: return a.boolean == b.boolean;
        case Json::Number:
            if (a.integral && b.integral) return a.integer == b.integer;
            return a.number == b.number;
        case Json::String: return a.text == b.text;
        case Json::Array: return a.items == b.items;
        case Json::Object: return a.keys == b.keys && a.values == b.values;
    }
    return false;
}

bool operator!=(const Json& a, const Json& b) { return !(a == b); }

{{CODE}}

int main() {
    static const char bench_input_text[] = "{{INPUT}}";
    Json bench_input = Json::parse(std::string(bench_input_text, sizeof(bench_input_text) - 1));

    std::string bench_line;
    try {
        Json bench_result = solution(bench_input);
        bench_line = "{\"success\":true,\"result\":" + bench_result.dump() + "}";
    } catch (const std::exception& e) {
        bench_line = "{\"success\":false,\"error\":" + Json(std::string(e.what())).dump() + "}";
    } catch (...) {
        bench_line = "{\"success\":false,\"error\":\"unknown exception\"}";
    }

    std::printf("\n%s\n", bench_line.c_str());
    return 0;
}
"##;

impl LanguageProfile for Cpp {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn extension(&self) -> &'static str {
        "cpp"
    }

    fn source_file(&self) -> &'static str {
        "main.cpp"
    }

    fn output_file(&self) -> &'static str {
        "main"
    }

    fn compile(&self, source: &str, output: &str) -> Option<Vec<String>> {
        Some(command_line(&["g++", "-std=c++17", "-O2", "-o", output, source]))
    }

    fn run(&self, executable: &str) -> Vec<String> {
        vec![format!("./{}", executable)]
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let input = literal::cpp(serialized_input);
        render(TEMPLATE, &[("{{CODE}}", code), ("{{INPUT}}", input.as_str())])
    }
}
