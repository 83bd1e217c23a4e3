//! 構造化されたパラメータオブジェクトをクエリ文字列のキー/値ペアに変換する
//!
//! `serde::Serializer` として実装しているため、`#[derive(Serialize)]` された任意の
//! 構造体をそのまま渡せる。フィールドの宣言順がそのままペアの順序になる。
//!
//! 対応している値の種類:
//! - bool（`true` / `false`）、整数、浮動小数点数、文字、文字列
//! - 値を持たない enum バリアント（serde のワイヤ名、序数ではない）
//! - newtype 構造体
//! - `Timestamp`（ミリ秒精度のUTC RFC 3339）
//! - 上記の `Option`（`None` はペアを生成しない）
//! - 上記のシーケンス（要素ごとに同じキーのペアを生成する）
//!
//! それ以外（マップ、ネストした構造体、ネストしたシーケンス、タプル、バイト列、
//! データを持つ enum バリアント）は `Error::UnsupportedParameterType` になる。

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::ser::{self, Impossible, Serialize};
use std::fmt;

const ROOT_FIELD: &str = "<root>";

/// クエリ文字列の1組のキーと値
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPair {
    pub key: String,
    pub value: String,
}

impl QueryPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// パラメータオブジェクトをクエリペアの列に変換する
pub fn to_query_pairs<T>(params: &T) -> Result<Vec<QueryPair>>
where
    T: Serialize + ?Sized,
{
    let mut pairs = Vec::new();
    params.serialize(RootSerializer { pairs: &mut pairs })?;
    Ok(pairs)
}

/// クエリペアをURLエンコードされたクエリ文字列にする（先頭の `?` は含まない）
pub fn encode_pairs(pairs: &[QueryPair]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for pair in pairs {
        serializer.append_pair(&pair.key, &pair.value);
    }
    serializer.finish()
}

/// クエリパラメータ用の日時
///
/// 常にUTC・ミリ秒精度の RFC 3339（例: `2024-01-01T00:00:00.000Z`）で出力され、
/// `DateTime::parse_from_rfc3339` でそのまま読み戻せる。`Option` や `Vec` の中でも
/// 同じ形式になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self(value.with_timezone(&Utc))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

fn unsupported(field: &str, kind: &'static str) -> Error {
    Error::UnsupportedParameterType {
        field: field.to_string(),
        kind,
    }
}

macro_rules! reject {
    ($($method:ident($($arg:ty),*) => $kind:expr;)*) => {
        $(
            fn $method(self, $(_: $arg),*) -> Result<()> {
                Err(self.unsupported($kind))
            }
        )*
    };
}

/// トップレベル: 構造体（または `None`）だけを受け付ける
struct RootSerializer<'a> {
    pairs: &'a mut Vec<QueryPair>,
}

impl RootSerializer<'_> {
    fn unsupported(&self, kind: &'static str) -> Error {
        unsupported(ROOT_FIELD, kind)
    }
}

impl<'a> ser::Serializer for RootSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = StructSerializer<'a>;
    type SerializeStructVariant = Impossible<(), Error>;

    reject! {
        serialize_bool(bool) => "bool";
        serialize_i8(i8) => "integer";
        serialize_i16(i16) => "integer";
        serialize_i32(i32) => "integer";
        serialize_i64(i64) => "integer";
        serialize_i128(i128) => "integer";
        serialize_u8(u8) => "integer";
        serialize_u16(u16) => "integer";
        serialize_u32(u32) => "integer";
        serialize_u64(u64) => "integer";
        serialize_u128(u128) => "integer";
        serialize_f32(f32) => "float";
        serialize_f64(f64) => "float";
        serialize_char(char) => "char";
        serialize_str(&str) => "string";
        serialize_bytes(&[u8]) => "bytes";
        serialize_unit() => "unit";
        serialize_unit_struct(&'static str) => "unit struct";
        serialize_unit_variant(&'static str, u32, &'static str) => "enum";
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        Err(self.unsupported("enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(self.unsupported("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(self.unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(self.unsupported("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(self.unsupported("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(self.unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(StructSerializer { pairs: self.pairs })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(self.unsupported("enum variant with data"))
    }
}

struct StructSerializer<'a> {
    pairs: &'a mut Vec<QueryPair>,
}

impl ser::SerializeStruct for StructSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(ValueSerializer {
            key,
            pairs: &mut *self.pairs,
            in_sequence: false,
        })
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// フィールド（またはシーケンス要素）1つ分の値
struct ValueSerializer<'a> {
    key: &'static str,
    pairs: &'a mut Vec<QueryPair>,
    in_sequence: bool,
}

impl ValueSerializer<'_> {
    fn push(self, value: String) -> Result<()> {
        // 空文字は省略扱い
        if !value.is_empty() {
            self.pairs.push(QueryPair::new(self.key, value));
        }
        Ok(())
    }

    fn unsupported(&self, kind: &'static str) -> Error {
        unsupported(self.key, kind)
    }
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.push(if v { "true" } else { "false" }.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.push(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.push(v.to_owned())
    }

    reject! {
        serialize_bytes(&[u8]) => "bytes";
        serialize_unit() => "unit";
        serialize_unit_struct(&'static str) => "unit struct";
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.push(variant.to_owned())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        Err(self.unsupported("enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        if self.in_sequence {
            return Err(self.unsupported("nested sequence"));
        }
        Ok(SeqSerializer {
            key: self.key,
            pairs: self.pairs,
        })
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(self.unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(self.unsupported("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(self.unsupported("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(self.unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(self.unsupported("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(self.unsupported("enum variant with data"))
    }
}

/// 配列フィールド: 要素ごとに同じキーのペアを入力順で生成する
struct SeqSerializer<'a> {
    key: &'static str,
    pairs: &'a mut Vec<QueryPair>,
}

impl ser::SerializeSeq for SeqSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(ValueSerializer {
            key: self.key,
            pairs: &mut *self.pairs,
            in_sequence: true,
        })
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
