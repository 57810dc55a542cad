use super::{literal, command_line, render, Language, LanguageProfile};

/// Profile of C# on Mono. The candidate defines `class Solution` with a static method
/// `object Solve(object input)`.
pub struct CSharp;

const TEMPLATE: &str = r##"{{CODE}}

static class BenchJson
{
    public static object Parse(string text)
    {
        int pos = 0;
        object value = ParseValue(text, ref pos);
        SkipWhitespace(text, ref pos);
        if (pos != text.Length)
        {
            throw new System.FormatException("trailing characters after json");
        }
        return value;
    }

    static void SkipWhitespace(string s, ref int pos)
    {
        while (pos < s.Length && " \t\r\n".IndexOf(s[pos]) >= 0)
        {
            pos++;
        }
    }

    static void Expect(string s, ref int pos, string literal)
    {
        if (string.CompareOrdinal(s, pos, literal, 0, literal.Length) != 0)
        {
            throw new System.FormatException("expected " + literal + " at offset " + pos);
        }
        pos += literal.Length;
    }

    static object ParseValue(string s, ref int pos)
    {
        SkipWhitespace(s, ref pos);
        if (pos >= s.Length)
        {
            throw new System.FormatException("unexpected end of json");
        }
        char c = s[pos];
        if (c == 'n') { Expect(s, ref pos, "null"); return null; }
        if (c == 't') { Expect(s, ref pos, "true"); return true; }
        if (c == 'f') { Expect(s, ref pos, "false"); return false; }
        if (c == '"') return ParseString(s, ref pos);
        if (c == '[')
        {
            pos++;
            var items = new System.Collections.Generic.List<object>();
            SkipWhitespace(s, ref pos);
            if (pos < s.Length && s[pos] == ']') { pos++; return items; }
            while (true)
            {
                items.Add(ParseValue(s, ref pos));
                SkipWhitespace(s, ref pos);
                char d = pos < s.Length ? s[pos] : '\0';
                pos++;
                if (d == ',') continue;
                if (d == ']') return items;
                throw new System.FormatException("expected , or ] in json array");
            }
        }
        if (c == '{')
        {
            pos++;
            var map = new System.Collections.Generic.Dictionary<string, object>();
            SkipWhitespace(s, ref pos);
            if (pos < s.Length && s[pos] == '}') { pos++; return map; }
            while (true)
            {
                SkipWhitespace(s, ref pos);
                string key = ParseString(s, ref pos);
                SkipWhitespace(s, ref pos);
                Expect(s, ref pos, ":");
                map[key] = ParseValue(s, ref pos);
                SkipWhitespace(s, ref pos);
                char d = pos < s.Length ? s[pos] : '\0';
                pos++;
                if (d == ',') continue;
                if (d == '}') return map;
                throw new System.FormatException("expected , or } in json object");
            }
        }
        return ParseNumber(s, ref pos);
    }

    static object ParseNumber(string s, ref int pos)
    {
        int start = pos;
        bool integral = true;
        while (pos < s.Length && "+-0123456789.eE".IndexOf(s[pos]) >= 0)
        {
            if (s[pos] == '.' || s[pos] == 'e' || s[pos] == 'E') integral = false;
            pos++;
        }
        string text = s.Substring(start, pos - start);
        var culture = System.Globalization.CultureInfo.InvariantCulture;
        long l;
        if (integral && long.TryParse(text, System.Globalization.NumberStyles.Integer, culture, out l))
        {
            return l;
        }
        return double.Parse(text, System.Globalization.NumberStyles.Float, culture);
    }

    static string ParseString(string s, ref int pos)
    {
        Expect(s, ref pos, "\"");
        var sb = new System.Text.StringBuilder();
        while (true)
        {
            if (pos >= s.Length)
            {
                throw new System.FormatException("unterminated json string");
            }
            char c = s[pos++];
            if (c == '"') break;
            if (c != '\\') { sb.Append(c); continue; }
            char e = s[pos++];
            switch (e)
            {
                case '"': sb.Append('"'); break;
                case '\\': sb.Append('\\'); break;
                case '/': sb.Append('/'); break;
                case 'b': sb.Append('\b'); break;
                case 'f': sb.Append('\f'); break;
                case 'n': sb.Append('\n'); break;
                case 'r': sb.Append('\r'); break;
                case 't': sb.Append('\t'); break;
                case 'u':
                    sb.Append((char) System.Convert.ToInt32(s.Substring(pos, 4), 16));
                    pos += 4;
                    break;
                default:
                    throw new System.FormatException("bad json escape");
            }
        }
        return sb.ToString();
    }

    public static string Write(object value)
    {
        var sb = new System.Text.StringBuilder();
        Write(sb, value);
        return sb.ToString();
    }

    static void WriteString(System.Text.StringBuilder sb, string s)
    {
        sb.Append('"');
        foreach (char c in s)
        {
            switch (c)
            {
                case '"': sb.Append("\\\""); break;
                case '\\': sb.Append("\\\\"); break;
                case '\n': sb.Append("\\n"); break;
                case '\r': sb.Append("\\r"); break;
                case '\t': sb.Append("\\t"); break;
                default:
                    if (c < 0x20 || c > 0x7e) sb.Append("\\u").Append(((int) c).ToString("x4"));
                    else sb.Append(c);
                    break;
            }
        }
        sb.Append('"');
    }

    static void Write(System.Text.StringBuilder sb, object value)
    {
        var culture = System.Globalization.CultureInfo.InvariantCulture;
        if (value == null)
        {
            sb.Append("null");
        }
        else if (value is bool)
        {
            sb.Append((bool) value ? "true" : "false");
        }
        else if (value is string || value is char)
        {
            WriteString(sb, value.ToString());
        }
        else if (value is double || value is float || value is decimal)
        {
            double d = System.Convert.ToDouble(value, culture);
            if (double.IsNaN(d) || double.IsInfinity(d)) sb.Append("null");
            else if (d == System.Math.Floor(d) && System.Math.Abs(d) < 1e15) sb.Append(((long) d).ToString(culture));
            else sb.Append(d.ToString("R", culture));
        }
        else if (value is int || value is long || value is short || value is byte
            || value is sbyte || value is uint || value is ulong || value is ushort)
        {
            sb.Append(System.Convert.ToString(value, culture));
        }
        else if (value is System.Collections.IDictionary)
        {
            sb.Append('{');
            bool first = true;
            foreach (System.Collections.DictionaryEntry entry in (System.Collections.IDictionary) value)
            {
                if (!first) sb.Append(',');
                first = false;
                WriteString(sb, System.Convert.ToString(entry.Key, culture));
                sb.Append(':');
                Write(sb, entry.Value);
            }
            sb.Append('}');
        }
        else if (value is System.Collections.IEnumerable)
        {
            sb.Append('[');
            bool first = true;
            foreach (object item in (System.Collections.IEnumerable) value)
            {
                if (!first) sb.Append(',');
                first = false;
                Write(sb, item);
            }
            sb.Append(']');
        }
        else
        {
            WriteString(sb, value.ToString());
        }
    }
}

static class BenchMain
{
    static int Main()
    {
        object benchInput = BenchJson.Parse("{{INPUT}}");

        string benchLine;
        try
        {
            object benchResult = Solution.Solve(benchInput);
            benchLine = "{\"success\":true,\"result\":" + BenchJson.Write(benchResult) + "}";
        }
        catch (System.Exception e)
        {
            string message = e.GetType().Name + ": " + e.Message;
            benchLine = "{\"success\":false,\"error\":" + BenchJson.Write(message) + "}";
        }

        System.Console.WriteLine();
        System.Console.WriteLine(benchLine);
        return 0;
    }
}
"##;

impl LanguageProfile for CSharp {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn extension(&self) -> &'static str {
        "cs"
    }

    fn source_file(&self) -> &'static str {
        "main.cs"
    }

    fn output_file(&self) -> &'static str {
        "main.exe"
    }

    fn compile(&self, source: &str, output: &str) -> Option<Vec<String>> {
        let out = format!("-out:{}", output);
        Some(command_line(&["mcs", "-optimize+", out.as_str(), source]))
    }

    fn run(&self, executable: &str) -> Vec<String> {
        command_line(&["mono", executable])
    }

    fn harness(&self, code: &str, serialized_input: &str) -> String {
        let input = literal::csharp(serialized_input);
        render(TEMPLATE, &[("{{CODE}}", code), ("{{INPUT}}", input.as_str())])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_command_names_the_output() {
        assert_eq!(Some(vec![
            String::from("mcs"),
            String::from("-optimize+"),
            String::from("-out:main.exe"),
            String::from("main.cs"),
        ]), CSharp.compile("main.cs", "main.exe"));
    }

    #[test]
    fn non_ascii_input_is_escaped() {
        let program = CSharp.harness(
            "class Solution { public static object Solve(object i) { return i; } }", r#"["é"]"#);
        assert!(program.contains(r#"BenchJson.Parse("[\"\u00e9\"]")"#));
    }
}
