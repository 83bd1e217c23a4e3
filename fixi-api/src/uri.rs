use crate::error::{Error, Result};
use crate::query::{QueryPair, encode_pairs};

/// Path placeholder for the public issue ID.
pub const ID_PLACEHOLDER: &str = "{id}";

/// ベースURIにクエリペアを追加する
///
/// 既存のクエリ文字列（`?api-version=2.0` など）は並べ替えも重複排除もせずに残し、
/// 新しいペアはその後ろに追加する。フラグメントは末尾に残る。
pub fn add_query(base: &str, pairs: &[QueryPair]) -> String {
    if pairs.is_empty() {
        return base.to_string();
    }

    let (without_fragment, fragment) = match base.find('#') {
        Some(index) => base.split_at(index),
        None => (base, ""),
    };

    let separator = match without_fragment.find('?') {
        None => "?",
        Some(_) if without_fragment.ends_with('?') || without_fragment.ends_with('&') => "",
        Some(_) => "&",
    };

    format!(
        "{}{}{}{}",
        without_fragment,
        separator,
        encode_pairs(pairs),
        fragment
    )
}

/// パステンプレートの `{id}` を公開IDで置き換える
///
/// IDは中身を解釈しない不透明な値として扱い、1つのパスセグメントとして
/// パーセントエンコードする。
pub fn expand_path(template: &str, id: &str) -> Result<String> {
    if id.is_empty() {
        return Err(Error::InvalidInput("Issue ID must not be empty".to_string()));
    }
    Ok(template.replace(ID_PLACEHOLDER, &urlencoding::encode(id)))
}
