//! Issues API のエンドポイント定義
//!
//! 各操作の HTTP メソッド・パステンプレート・既定のページングを1つの表にまとめ、
//! `RestApi::dispatch` がこの表を引いてリクエストを組み立てる。
//! パスはリモートサービスとの互換性のため文字単位でこのまま保つこと。

use reqwest::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Find,
    Get,
    Nearby,
    MapBounds,
    TeamIssues,
    Export,
    ExportTeamIssues,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Patch,
}

impl HttpVerb {
    pub fn method(self) -> Method {
        match self {
            HttpVerb::Get => Method::GET,
            HttpVerb::Patch => Method::PATCH,
        }
    }
}

/// ページングの既定値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub count: u32,
}

impl Paging {
    pub const fn new(page: u32, count: u32) -> Self {
        Self { page, count }
    }
}

pub const DEFAULT_PAGING: Paging = Paging::new(1, 20);
pub const MAP_PAGING: Paging = Paging::new(1, 200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub operation: Operation,
    pub verb: HttpVerb,
    /// ベースURLからの相対パス。`{id}` は公開IDに置き換えられる
    pub path: &'static str,
    pub paging: Option<Paging>,
}

pub static ENDPOINTS: [Endpoint; 8] = [
    Endpoint {
        operation: Operation::Find,
        verb: HttpVerb::Get,
        path: "/issues?api-version=2.0",
        paging: Some(DEFAULT_PAGING),
    },
    Endpoint {
        operation: Operation::Get,
        verb: HttpVerb::Get,
        path: "/issues/{id}",
        paging: None,
    },
    Endpoint {
        operation: Operation::Nearby,
        verb: HttpVerb::Get,
        path: "/issues/nearby?api-version=2.0",
        paging: Some(DEFAULT_PAGING),
    },
    Endpoint {
        operation: Operation::MapBounds,
        verb: HttpVerb::Get,
        path: "/issues/map?api-version=2.0",
        paging: Some(MAP_PAGING),
    },
    Endpoint {
        operation: Operation::TeamIssues,
        verb: HttpVerb::Get,
        path: "/issues/team?api-version=2.0",
        paging: Some(DEFAULT_PAGING),
    },
    Endpoint {
        operation: Operation::Export,
        verb: HttpVerb::Get,
        path: "/issues/export?api-version=2.0",
        paging: None,
    },
    Endpoint {
        operation: Operation::ExportTeamIssues,
        verb: HttpVerb::Get,
        path: "/issues/team/export?api-version=2.0",
        paging: None,
    },
    Endpoint {
        operation: Operation::Update,
        verb: HttpVerb::Patch,
        path: "/issues/{id}",
        paging: None,
    },
];

impl Operation {
    pub fn endpoint(self) -> &'static Endpoint {
        // 表は Operation の宣言順に並んでいる
        &ENDPOINTS[self as usize]
    }

    /// ページングを持たない操作では `DEFAULT_PAGING`
    pub fn default_paging(self) -> Paging {
        self.endpoint().paging.unwrap_or(DEFAULT_PAGING)
    }
}

impl Endpoint {
    pub fn requires_id(&self) -> bool {
        self.path.contains(crate::uri::ID_PLACEHOLDER)
    }
}
