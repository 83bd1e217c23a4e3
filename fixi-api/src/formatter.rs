use crate::error::{BoxError, Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// レスポンス本文のデシリアライザ
///
/// 本文を一旦 `serde_json::Value` に読み込み、呼び出し側の型への変換は
/// `read_as` が共通で行う。
pub trait ResponseFormatter: Send + Sync + fmt::Debug {
    /// ログ用の名前
    fn name(&self) -> &'static str;

    /// `Accept` ヘッダーに載せるメディアタイプ
    fn media_types(&self) -> &'static [&'static str] {
        &[]
    }

    /// 指定されたメディアタイプ（パラメータなし・小文字）を読めるかどうか
    fn can_read(&self, media_type: &str) -> bool;

    fn read(&self, body: &[u8]) -> std::result::Result<Value, BoxError>;
}

/// `application/json`、`text/json` と `+json` サフィックスのメディアタイプ
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl ResponseFormatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/json", "text/json"]
    }

    fn can_read(&self, media_type: &str) -> bool {
        media_type == "application/json" || media_type == "text/json" || media_type.ends_with("+json")
    }

    fn read(&self, body: &[u8]) -> std::result::Result<Value, BoxError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// `application/x-www-form-urlencoded`
///
/// 同じキーが複数回現れた場合は配列にまとめる。値はすべて文字列として読むため、
/// 数値や真偽値のフィールドを持つ型（`ListPage` など）はこの形式からは読めず
/// `InvalidResponse` になる。
#[derive(Debug, Clone, Copy, Default)]
pub struct FormUrlEncodedFormatter;

impl ResponseFormatter for FormUrlEncodedFormatter {
    fn name(&self) -> &'static str {
        "form-urlencoded"
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/x-www-form-urlencoded"]
    }

    fn can_read(&self, media_type: &str) -> bool {
        media_type == "application/x-www-form-urlencoded"
    }

    fn read(&self, body: &[u8]) -> std::result::Result<Value, BoxError> {
        let mut map = Map::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            append_value(&mut map, key.into_owned(), Value::String(value.into_owned()));
        }
        Ok(Value::Object(map))
    }
}

/// `application/xml`、`text/xml` と `+xml` サフィックスのメディアタイプ
///
/// ルート要素の中身を1つのオブジェクトとして読む。子要素と属性はキーになり、
/// 同じ名前の子要素が複数ある場合は配列にまとめる。名前空間の接頭辞は無視する。
/// 値はフォーム形式と同じくすべて文字列で、空の要素と `nil="true"` は null になる。
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormatter;

impl ResponseFormatter for XmlFormatter {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/xml", "text/xml"]
    }

    fn can_read(&self, media_type: &str) -> bool {
        media_type == "application/xml" || media_type == "text/xml" || media_type.ends_with("+xml")
    }

    fn read(&self, body: &[u8]) -> std::result::Result<Value, BoxError> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut open: Vec<XmlElement> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => open.push(XmlElement::open(&start)?),
                Event::Empty(start) => {
                    let element = XmlElement::open(&start)?;
                    close_element(element, &mut open, &mut root)?;
                }
                Event::End(_) => {
                    let element = open.pop().ok_or("unexpected closing tag")?;
                    close_element(element, &mut open, &mut root)?;
                }
                Event::Text(text) => push_text(&mut open, &text.unescape()?)?,
                Event::CData(data) => push_text(&mut open, std::str::from_utf8(&data)?)?,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !open.is_empty() {
            return Err("unexpected end of XML document".into());
        }
        root.ok_or_else(|| "XML document has no root element".into())
    }
}

struct XmlElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
    nil: bool,
}

impl XmlElement {
    fn open(start: &BytesStart<'_>) -> std::result::Result<Self, BoxError> {
        let mut element = Self {
            name: std::str::from_utf8(start.local_name().as_ref())?.to_string(),
            fields: Map::new(),
            text: String::new(),
            nil: false,
        };

        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = attribute.key;
            if key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let local = std::str::from_utf8(key.local_name().as_ref())?.to_string();
            let value = attribute.unescape_value()?;
            // 接頭辞付きの属性は xsi:nil だけ見る
            if key.prefix().is_some() {
                if local == "nil" && value == "true" {
                    element.nil = true;
                }
                continue;
            }
            append_value(&mut element.fields, local, Value::String(value.into_owned()));
        }
        Ok(element)
    }

    fn finish(mut self) -> (String, Value) {
        let value = if self.nil {
            Value::Null
        } else if self.fields.is_empty() {
            if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            }
        } else {
            if !self.text.is_empty() {
                self.fields.insert("$text".to_string(), Value::String(self.text));
            }
            Value::Object(self.fields)
        };
        (self.name, value)
    }
}

fn push_text(open: &mut [XmlElement], text: &str) -> std::result::Result<(), BoxError> {
    match open.last_mut() {
        Some(element) => element.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err("text outside the root element".into()),
    }
    Ok(())
}

fn close_element(
    element: XmlElement,
    open: &mut [XmlElement],
    root: &mut Option<Value>,
) -> std::result::Result<(), BoxError> {
    let (name, value) = element.finish();
    match open.last_mut() {
        Some(parent) => append_value(&mut parent.fields, name, value),
        None if root.is_none() => *root = Some(value),
        None => return Err("more than one root element".into()),
    }
    Ok(())
}

/// 同じキーが既にあれば配列にまとめる
fn append_value(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// `text/plain`: 本文全体を1つの文字列として読む
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextFormatter;

impl ResponseFormatter for PlainTextFormatter {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["text/plain"]
    }

    fn can_read(&self, media_type: &str) -> bool {
        media_type == "text/plain"
    }

    fn read(&self, body: &[u8]) -> std::result::Result<Value, BoxError> {
        Ok(Value::String(String::from_utf8(body.to_vec())?))
    }
}

/// 優先順位付きのフォーマッター一覧
///
/// 構築後は読み取り専用。同じメディアタイプを読めるフォーマッターが複数ある場合は
/// 先に登録されたものが使われる。
#[derive(Debug, Clone)]
pub struct FormatterCollection {
    formatters: Vec<Arc<dyn ResponseFormatter>>,
}

impl FormatterCollection {
    pub fn new(formatters: Vec<Arc<dyn ResponseFormatter>>) -> Self {
        Self { formatters }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// 末尾（最も低い優先順位）に追加する
    pub fn with(mut self, formatter: impl ResponseFormatter + 'static) -> Self {
        self.formatters.push(Arc::new(formatter));
        self
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ResponseFormatter> {
        self.formatters.iter().map(|f| f.as_ref())
    }

    /// 登録順に重複なく並べた `Accept` ヘッダー値。読めるメディアタイプがなければ `None`
    pub fn accept(&self) -> Option<String> {
        let mut media_types: Vec<&str> = Vec::new();
        for media_type in self.iter().flat_map(|f| f.media_types().iter().copied()) {
            if !media_types.contains(&media_type) {
                media_types.push(media_type);
            }
        }
        (!media_types.is_empty()).then(|| media_types.join(", "))
    }

    /// Content-Type ヘッダー値に最初に一致するフォーマッター
    pub fn find(&self, content_type: &str) -> Option<&dyn ResponseFormatter> {
        let media_type = media_type(content_type);
        self.iter().find(|f| f.can_read(&media_type))
    }
}

impl Default for FormatterCollection {
    fn default() -> Self {
        Self::empty()
            .with(JsonFormatter)
            .with(XmlFormatter)
            .with(FormUrlEncodedFormatter)
            .with(PlainTextFormatter)
    }
}

/// `application/json; charset=utf-8` -> `application/json`
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// レスポンス本文を型 `T` として読む
///
/// どのフォーマッターで失敗しても、型変換で失敗しても、結果は
/// `Error::InvalidResponse` 1種類にまとめる。
pub fn read_as<T>(formatters: &FormatterCollection, content_type: Option<&str>, body: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    let type_name = std::any::type_name::<T>();
    let content_type = content_type.unwrap_or("application/octet-stream");

    let formatter = formatters
        .find(content_type)
        .ok_or_else(|| Error::UnsupportedMediaType {
            content_type: content_type.to_string(),
            type_name,
        })?;

    let invalid = |source: BoxError| {
        tracing::warn!(
            formatter = formatter.name(),
            type_name,
            error = %source,
            "Failed to deserialize response body"
        );
        Error::InvalidResponse { type_name, source }
    };

    let value = formatter.read(body).map_err(invalid)?;
    serde_json::from_value(value).map_err(|e| invalid(e.into()))
}
