use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Issueの処理状況
///
/// クエリ文字列でもJSONでもバリアント名がそのままワイヤ上の値になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Open,
    InProgress,
    Closed,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Open,
        Status::InProgress,
        Status::Closed,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "Open",
            Status::InProgress => "InProgress",
            Status::Closed => "Closed",
            Status::Rejected => "Rejected",
        }
    }

    /// 対応が終わっている状態かどうか
    pub fn is_final(&self) -> bool {
        matches!(self, Status::Closed | Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown status: {}", s)))
    }
}

/// 近隣検索の並び順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// サーバー側の既定（作成日時の降順）
    #[default]
    Default,
    /// 指定地点から近い順
    Distance,
    /// 作成日時の降順
    Date,
}
