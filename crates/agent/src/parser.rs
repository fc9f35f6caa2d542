//! Tool-call grammar for model output.
//!
//! ```text
//! call    := "Tool:" ws* "`"? name ws* ( "(" args? ")" )?
//! args    := arg ( "," arg )* ","?
//! arg     := ( name ws* "=" ws* )? value
//! value   := string | number | "True" | "False" | "None" | "null"
//! string  := '"' … '"' | "'" … "'"      (backslash escapes)
//! ```
//!
//! The marker counts only at the start of a line, so prose such as
//! "the calendar tool: nobody is on shift" stays an answer. Only the first
//! marker in a response is considered. An argument
//! list made only of bare words is taken as one string argument, the way
//! small models tend to write `recall_notes(door code)`.

use localecho_core::tool::{ArgValue, ToolInvocation};

/// What one model response amounts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    ToolCall(ToolInvocation),
    /// A `Tool:` marker whose call could not be read. Fed back to the model.
    Malformed { reason: String },
    PlainText(String),
}

const MARKER: &str = "tool:";

pub fn parse_output(text: &str) -> ParsedOutput {
    let Some(start) = find_marker(text) else {
        return ParsedOutput::PlainText(text.to_string());
    };
    match parse_call(&text[start + MARKER.len()..]) {
        Ok(call) => ParsedOutput::ToolCall(call),
        Err(reason) => ParsedOutput::Malformed { reason },
    }
}

/// The user-facing answer: text after the first `Answer:` label, else the whole text.
pub fn final_answer(text: &str) -> String {
    match text.split_once("Answer:") {
        Some((_, answer)) => answer.trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Model text preceding the tool call, without a `Thought:` label.
pub fn text_before_call(text: &str) -> &str {
    let head = match find_marker(text) {
        Some(start) => &text[..start],
        None => text,
    };
    let head = head.trim();
    head.strip_prefix("Thought:").unwrap_or(head).trim()
}

/// Byte offset of the first line-leading `Tool:` marker.
fn find_marker(text: &str) -> Option<usize> {
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let at = line_start + indent;
        if text
            .get(at..at + MARKER.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(MARKER))
        {
            return Some(at);
        }
        line_start += line.len();
    }
    None
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return None,
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        Some(&self.src[start..self.pos])
    }
}

fn parse_call(rest: &str) -> Result<ToolInvocation, String> {
    let mut cur = Cursor { src: rest, pos: 0 };
    cur.skip_ws();
    cur.eat('`');
    let name = cur
        .ident()
        .ok_or_else(|| "expected a tool name after 'Tool:'".to_string())?;
    let mut call = ToolInvocation::new(name);

    cur.skip_ws();
    if !cur.eat('(') {
        return Ok(call);
    }

    let args_start = cur.pos;
    let args_end = matching_paren(rest, args_start)
        .ok_or_else(|| format!("unclosed '(' in call to {name}"))?;
    let raw = &rest[args_start..args_end];

    match parse_args(raw) {
        Ok(args) => {
            for (key, value) in args {
                call = match key {
                    Some(key) => call.kwarg(key, value),
                    None => call.arg(value),
                };
            }
            Ok(call)
        }
        Err(_) if is_bare_text(raw) => Ok(call.arg(raw.trim())),
        Err(reason) => Err(format!("could not read arguments of {name}: {reason}")),
    }
}

/// Byte offset of the `)` closing the list that starts at `from`, quote-aware.
fn matching_paren(src: &str, from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in src[from..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth == 0 => return Some(from + i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn is_bare_text(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.is_empty() && !raw.contains(['"', '\'', '='])
}

fn parse_args(raw: &str) -> Result<Vec<(Option<String>, ArgValue)>, String> {
    let mut cur = Cursor { src: raw, pos: 0 };
    let mut args = Vec::new();

    loop {
        cur.skip_ws();
        if cur.peek().is_none() {
            break;
        }

        let checkpoint = cur.pos;
        let key = match cur.ident() {
            Some(ident) => {
                cur.skip_ws();
                if cur.eat('=') {
                    cur.skip_ws();
                    Some(ident.to_string())
                } else {
                    cur.pos = checkpoint;
                    None
                }
            }
            None => None,
        };

        args.push((key, parse_value(&mut cur)?));

        cur.skip_ws();
        match cur.bump() {
            None => break,
            Some(',') => continue,
            Some(c) => return Err(format!("unexpected '{c}' after argument")),
        }
    }

    Ok(args)
}

fn parse_value(cur: &mut Cursor<'_>) -> Result<ArgValue, String> {
    match cur.peek() {
        Some(q @ ('"' | '\'')) => {
            cur.bump();
            parse_string(cur, q).map(ArgValue::Str)
        }
        Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => parse_number(cur),
        Some(c) if c.is_ascii_alphabetic() => {
            let word = cur.ident().unwrap_or_default();
            match word {
                "True" | "true" => Ok(ArgValue::Bool(true)),
                "False" | "false" => Ok(ArgValue::Bool(false)),
                "None" | "null" => Ok(ArgValue::None),
                other => Err(format!("unquoted text '{other}'")),
            }
        }
        Some(c) => Err(format!("unexpected '{c}'")),
        None => Err("missing value".into()),
    }
}

fn parse_string(cur: &mut Cursor<'_>, quote: char) -> Result<String, String> {
    let mut out = String::new();
    loop {
        match cur.bump() {
            None => return Err("unterminated string".into()),
            Some('\\') => match cur.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => return Err("unterminated string".into()),
            },
            Some(c) if c == quote => return Ok(out),
            Some(c) => out.push(c),
        }
    }
}

fn parse_number(cur: &mut Cursor<'_>) -> Result<ArgValue, String> {
    let start = cur.pos;
    while cur
        .peek()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_'))
    {
        cur.bump();
    }
    let text = cur.src[start..cur.pos].replace('_', "");
    if let Ok(i) = text.parse::<i64>() {
        return Ok(ArgValue::Int(i));
    }
    text.parse::<f64>()
        .map(ArgValue::Float)
        .map_err(|_| format!("bad number '{text}'"))
}
