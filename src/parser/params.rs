//! Normalization of pipe parameters.
//!
//! Parameters reach the pipe either as a structured map or as text written the
//! way templates tend to write objects: `{n: 1}`, `{'n': 'v'}`, `{"n": {"m": 2}}`.
//! The text form is read by a small recursive-descent parser instead of being
//! massaged into JSON.

use serde_json::{
    Map,
    Number,
    Value,
};
use thiserror::Error;

use crate::types::{
    Params,
    RawParams,
};

/// Textual parameters that are not a well-formed object literal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Wrong parameter in TranslatePipe. Expected a valid Object, received: {raw}")]
pub struct InvalidParameterError {
    /// The offending input, verbatim.
    pub raw: String,
}

impl InvalidParameterError {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Converts raw pipe parameters into an interpolation map.
///
/// Maps are returned as they are; text is parsed as a loose object literal.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use translate_runtime::parser::normalize;
/// use translate_runtime::types::RawParams;
///
/// let params = normalize(&RawParams::Text("{param: 'with param'}".into())).unwrap();
/// assert_eq!(params.get("param"), Some(&json!("with param")));
/// ```
pub fn normalize(raw: &RawParams) -> Result<Params, InvalidParameterError> {
    match raw {
        RawParams::Map(map) => Ok(map.clone()),
        RawParams::Text(text) => parse_loose_object(text),
    }
}

/// Parses a loose object literal.
///
/// Keys may be bare identifiers or single/double quoted strings, values may be
/// quoted strings, numbers, `true`/`false`/`null`, arrays or nested objects.
///
/// Objects and arrays nest up to [`MAX_NESTING`] levels. Numbers must fit the
/// range of `serde_json::Number` (`i64`, `u64` or finite `f64`), so `1e400` is
/// rejected.
pub fn parse_loose_object(text: &str) -> Result<Params, InvalidParameterError> {
    let mut parser = LooseParser::new(text);
    parser
        .document()
        .ok_or_else(|| InvalidParameterError::new(text))
}

/// 受け付けるオブジェクト・配列の最大ネスト（外側のオブジェクトを含む）
///
/// `serde_json` のデシリアライザーと同じ上限
pub const MAX_NESTING: usize = 128;

/// 緩いオブジェクトリテラルの文字カーソル
///
/// 各規則は想定外の文字で `None` を返し、呼び出し元が入力全体を持つ
/// [`InvalidParameterError`] に変換します。
struct LooseParser<'a> {
    /// 入力全体（数値の切り出しに使う）
    source: &'a str,
    /// 残りの文字とバイトオフセット
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// 現在開いているオブジェクト・配列の数
    depth: usize,
}

impl<'a> LooseParser<'a> {
    /// `source` の先頭から開始
    fn new(source: &'a str) -> Self {
        Self { source, chars: source.char_indices().peekable(), depth: 0 }
    }

    /// 入力全体: オブジェクト 1 つで、後続なし
    fn document(&mut self) -> Option<Params> {
        self.skip_whitespace();
        let object = self.nested(Self::object)?;
        self.skip_whitespace();
        self.chars.peek().is_none().then_some(object)
    }

    /// 次の文字（消費しない）
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// 次の文字のバイトオフセット
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    /// 空白を読み飛ばす
    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    /// 空白の後の `expected` を消費
    fn expect(&mut self, expected: char) -> Option<()> {
        self.skip_whitespace();
        (self.chars.next()?.1 == expected).then_some(())
    }

    /// ネストを 1 段深くして `parse` を実行（[`MAX_NESTING`] を超えたら失敗）
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.depth >= MAX_NESTING {
            return None;
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// `{ key: value, ... }`
    fn object(&mut self) -> Option<Params> {
        self.expect('{')?;
        let mut map = Map::new();

        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.chars.next();
            return Some(map);
        }

        loop {
            let key = self.key()?;
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.chars.next()?.1 {
                ',' => {}
                '}' => return Some(map),
                _ => return None,
            }
        }
    }

    /// `[ value, ... ]`
    fn array(&mut self) -> Option<Vec<Value>> {
        self.expect('[')?;
        let mut items = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.chars.next();
            return Some(items);
        }

        loop {
            items.push(self.value()?);

            self.skip_whitespace();
            match self.chars.next()?.1 {
                ',' => {}
                ']' => return Some(items),
                _ => return None,
            }
        }
    }

    /// 裸の識別子または引用符付き文字列
    fn key(&mut self) -> Option<String> {
        self.skip_whitespace();
        match self.peek()? {
            quote @ ('"' | '\'') => self.quoted(quote),
            _ => {
                let ident = self.word();
                (!ident.is_empty()).then_some(ident)
            }
        }
    }

    /// オブジェクト・配列・文字列・数値・リテラル
    fn value(&mut self) -> Option<Value> {
        self.skip_whitespace();
        match self.peek()? {
            '{' => self.nested(Self::object).map(Value::Object),
            '[' => self.nested(Self::array).map(Value::Array),
            quote @ ('"' | '\'') => self.quoted(quote).map(Value::String),
            '-' | '0'..='9' => self.number().map(Value::Number),
            _ => match self.word().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                "null" => Some(Value::Null),
                _ => None,
            },
        }
    }

    /// 識別子の文字: `[A-Za-z0-9_$]`
    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_' || c == '$') {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        word
    }

    /// JSON の数値（切り出した部分を `serde_json` で検証）
    fn number(&mut self) -> Option<Number> {
        let start = self.offset();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.chars.next();
        }
        let end = self.offset();
        serde_json::from_str(self.source.get(start..end)?).ok()
    }

    /// 次の文字 `quote` で囲まれた文字列
    fn quoted(&mut self, quote: char) -> Option<String> {
        self.chars.next();
        let mut text = String::new();
        loop {
            let (_, c) = self.chars.next()?;
            match c {
                c if c == quote => return Some(text),
                '\\' => text.push(self.escape()?),
                c => text.push(c),
            }
        }
    }

    /// バックスラッシュに続く文字
    fn escape(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        match c {
            '"' | '\'' | '\\' | '/' => Some(c),
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    code = code * 16 + self.chars.next()?.1.to_digit(16)?;
                }
                char::from_u32(code)
            }
            _ => None,
        }
    }
}
