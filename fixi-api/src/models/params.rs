//! 各操作のクエリパラメータ
//!
//! フィールドの宣言順がそのままクエリ文字列の順序になる。ページングの既定値は
//! `endpoints` の表から取る。

use serde::Serialize;

use super::{SortOrder, Status};
use crate::endpoints::Operation;
use crate::error::{Error, Result};
use crate::query::Timestamp;

/// `q` / `reportedBy` / `assignedTo`
macro_rules! search_setters {
    () => {
        /// 検索文字列
        pub fn q(mut self, q: impl Into<String>) -> Self {
            self.q = Some(q.into());
            self
        }

        /// 報告者のメールアドレスで絞り込む
        pub fn reported_by(mut self, email: impl Into<String>) -> Self {
            self.reported_by = Some(email.into());
            self
        }

        /// 担当者のメールアドレスまたはチームの短縮名で絞り込む
        pub fn assigned_to(mut self, assignee: impl Into<String>) -> Self {
            self.assigned_to = Some(assignee.into());
            self
        }
    };
}

/// `category` / `status` / `from` / `to`
macro_rules! filter_setters {
    () => {
        pub fn categories(mut self, categories: Vec<String>) -> Self {
            self.category = categories;
            self
        }

        pub fn add_category(mut self, category: impl Into<String>) -> Self {
            self.category.push(category.into());
            self
        }

        pub fn statuses(mut self, statuses: Vec<Status>) -> Self {
            self.status = statuses;
            self
        }

        pub fn add_status(mut self, status: Status) -> Self {
            self.status.push(status);
            self
        }

        /// この日時以降に作成されたIssue
        pub fn from(mut self, from: impl Into<Timestamp>) -> Self {
            self.from = Some(from.into());
            self
        }

        /// この日時以前に作成されたIssue
        pub fn to(mut self, to: impl Into<Timestamp>) -> Self {
            self.to = Some(to.into());
            self
        }
    };
}

macro_rules! paging_setters {
    () => {
        pub fn page(mut self, page: u32) -> Self {
            self.page = page;
            self
        }

        pub fn count(mut self, count: u32) -> Self {
            self.count = count;
            self
        }
    };
}

fn validate_paging(page: u32, count: u32) -> Result<()> {
    if page == 0 {
        return Err(Error::InvalidInput("page must be a positive integer".to_string()));
    }
    if count == 0 {
        return Err(Error::InvalidInput("count must be a positive integer".to_string()));
    }
    Ok(())
}

fn validate_range(from: Option<Timestamp>, to: Option<Timestamp>) -> Result<()> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(Error::InvalidInput(
            "from must not be later than to".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_coordinate(name: &str, value: f64, limit: f64) -> Result<()> {
    if !value.is_finite() || value.abs() > limit {
        return Err(Error::InvalidInput(format!(
            "{} must be between -{} and {}",
            name, limit, limit
        )));
    }
    Ok(())
}

/// `find` のパラメータ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindIssuesParams {
    pub q: Option<String>,
    /// 非公開情報を含むフィールドも検索する
    pub search_private_info: bool,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Vec<String>,
    pub status: Vec<Status>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub page: u32,
    pub count: u32,
}

impl Default for FindIssuesParams {
    fn default() -> Self {
        let paging = Operation::Find.default_paging();
        Self {
            q: None,
            search_private_info: false,
            reported_by: None,
            assigned_to: None,
            category: Vec::new(),
            status: Vec::new(),
            from: None,
            to: None,
            page: paging.page,
            count: paging.count,
        }
    }
}

impl FindIssuesParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_private_info(mut self, enabled: bool) -> Self {
        self.search_private_info = enabled;
        self
    }

    search_setters!();
    filter_setters!();
    paging_setters!();

    pub fn validate(&self) -> Result<()> {
        validate_paging(self.page, self.count)?;
        validate_range(self.from, self.to)
    }
}

/// `nearby` のパラメータ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyIssuesParams {
    pub latitude: f64,
    pub longitude: f64,
    /// 半径（メートル）
    pub radius: f64,
    pub q: Option<String>,
    pub search_private_info: bool,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Vec<String>,
    pub status: Vec<Status>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub sort: SortOrder,
    pub page: u32,
    pub count: u32,
}

impl NearbyIssuesParams {
    pub fn new(latitude: f64, longitude: f64, radius: f64) -> Self {
        let paging = Operation::Nearby.default_paging();
        Self {
            latitude,
            longitude,
            radius,
            q: None,
            search_private_info: false,
            reported_by: None,
            assigned_to: None,
            category: Vec::new(),
            status: Vec::new(),
            from: None,
            to: None,
            sort: SortOrder::Default,
            page: paging.page,
            count: paging.count,
        }
    }

    pub fn search_private_info(mut self, enabled: bool) -> Self {
        self.search_private_info = enabled;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    search_setters!();
    filter_setters!();
    paging_setters!();

    pub fn validate(&self) -> Result<()> {
        validate_coordinate("latitude", self.latitude, 90.0)?;
        validate_coordinate("longitude", self.longitude, 180.0)?;
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(Error::InvalidInput(
                "radius must be a positive number of meters".to_string(),
            ));
        }
        validate_paging(self.page, self.count)?;
        validate_range(self.from, self.to)
    }
}

/// 地図の表示範囲による検索のパラメータ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapIssuesParams {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
    pub category: Vec<String>,
    pub status: Vec<Status>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub page: u32,
    pub count: u32,
}

impl MapIssuesParams {
    pub fn new(north: f64, east: f64, south: f64, west: f64) -> Self {
        let paging = Operation::MapBounds.default_paging();
        Self {
            north,
            east,
            south,
            west,
            category: Vec::new(),
            status: Vec::new(),
            from: None,
            to: None,
            page: paging.page,
            count: paging.count,
        }
    }

    filter_setters!();
    paging_setters!();

    pub fn validate(&self) -> Result<()> {
        validate_coordinate("north", self.north, 90.0)?;
        validate_coordinate("south", self.south, 90.0)?;
        validate_coordinate("east", self.east, 180.0)?;
        validate_coordinate("west", self.west, 180.0)?;
        // 東西は日付変更線をまたげるので南北だけ確認する
        if self.south > self.north {
            return Err(Error::InvalidInput(
                "south border must not be north of the north border".to_string(),
            ));
        }
        validate_paging(self.page, self.count)?;
        validate_range(self.from, self.to)
    }
}

/// ログインユーザーのチームに割り当てられたIssueの検索パラメータ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamIssuesParams {
    pub q: Option<String>,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Vec<String>,
    pub status: Vec<Status>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub page: u32,
    pub count: u32,
}

impl Default for TeamIssuesParams {
    fn default() -> Self {
        let paging = Operation::TeamIssues.default_paging();
        Self {
            q: None,
            reported_by: None,
            assigned_to: None,
            category: Vec::new(),
            status: Vec::new(),
            from: None,
            to: None,
            page: paging.page,
            count: paging.count,
        }
    }
}

impl TeamIssuesParams {
    pub fn new() -> Self {
        Self::default()
    }

    search_setters!();
    filter_setters!();
    paging_setters!();

    pub fn validate(&self) -> Result<()> {
        validate_paging(self.page, self.count)?;
        validate_range(self.from, self.to)
    }
}

/// エクスポートのパラメータ（ページングなし）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportIssuesParams {
    pub q: Option<String>,
    pub search_private_info: bool,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Vec<String>,
    pub status: Vec<Status>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl ExportIssuesParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_private_info(mut self, enabled: bool) -> Self {
        self.search_private_info = enabled;
        self
    }

    search_setters!();
    filter_setters!();

    pub fn validate(&self) -> Result<()> {
        validate_range(self.from, self.to)
    }
}

/// チームのIssueのエクスポートのパラメータ
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamExportParams {
    pub q: Option<String>,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Vec<String>,
    pub status: Vec<Status>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl TeamExportParams {
    pub fn new() -> Self {
        Self::default()
    }

    search_setters!();
    filter_setters!();

    pub fn validate(&self) -> Result<()> {
        validate_range(self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{encode_pairs, to_query_pairs};
    use chrono::{TimeZone, Utc};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_find_defaults() {
        let params = FindIssuesParams::new();

        let query = encode_pairs(&to_query_pairs(&params).unwrap());

        assert_eq!(query, "searchPrivateInfo=false&page=1&count=20");
    }

    #[test]
    fn test_map_defaults_to_200() {
        let params = MapIssuesParams::new(52.1, 5.2, 52.0, 5.0);

        let query = encode_pairs(&to_query_pairs(&params).unwrap());

        assert_eq!(
            query,
            "north=52.1&east=5.2&south=52&west=5&page=1&count=200"
        );
    }

    #[test]
    fn test_find_full_query() {
        // Given: すべてのフィルターを指定
        let params = FindIssuesParams::new()
            .q("lamp")
            .search_private_info(true)
            .reported_by("jan@example.com")
            .assigned_to("public-works")
            .add_category("roads")
            .add_category("lighting")
            .add_status(Status::Open)
            .add_status(Status::InProgress)
            .from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .to(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
            .page(3)
            .count(50);

        // When: クエリ文字列に変換
        let query = encode_pairs(&to_query_pairs(&params).unwrap());

        // Then: 宣言順に並び、配列は同名キーの繰り返しになる
        assert_eq!(
            query,
            "q=lamp&searchPrivateInfo=true&reportedBy=jan%40example.com&assignedTo=public-works\
             &category=roads&category=lighting&status=Open&status=InProgress\
             &from=2024-01-01T00%3A00%3A00.000Z&to=2024-02-01T00%3A00%3A00.000Z&page=3&count=50"
        );
    }

    #[test]
    fn test_nearby_includes_sort() {
        let params = NearbyIssuesParams::new(52.09, 5.12, 250.0).sort(SortOrder::Distance);

        let pairs = to_query_pairs(&params).unwrap();
        let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();

        assert_eq!(
            keys,
            vec!["latitude", "longitude", "radius", "searchPrivateInfo", "sort", "page", "count"]
        );
        assert_eq!(pairs[4].value, "Distance");
    }

    #[test]
    fn test_team_params_have_no_private_flag() {
        let query = encode_pairs(&to_query_pairs(&TeamIssuesParams::new().q("x")).unwrap());
        assert_eq!(query, "q=x&page=1&count=20");

        let export = encode_pairs(&to_query_pairs(&TeamExportParams::new()).unwrap());
        assert_eq!(export, "");
    }

    #[test]
    fn test_paging_validation() {
        assert!(FindIssuesParams::new().validate().is_ok());
        assert!(matches!(
            FindIssuesParams::new().page(0).validate(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            TeamIssuesParams::new().count(0).validate(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_date_range_validation() {
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(ExportIssuesParams::new().from(later).to(earlier).validate().is_err());
        assert!(ExportIssuesParams::new().from(earlier).to(later).validate().is_ok());
    }

    #[test]
    fn test_offset_dates_are_sent_as_utc() {
        let to = chrono::DateTime::parse_from_rfc3339("2024-06-01T02:00:00.5+02:00").unwrap();

        let query = encode_pairs(&to_query_pairs(&TeamExportParams::new().to(to)).unwrap());

        assert_eq!(query, "to=2024-06-01T00%3A00%3A00.500Z");
    }

    #[test]
    fn test_geo_validation() {
        assert_ok!(NearbyIssuesParams::new(52.0, 5.0, 100.0).validate());
        assert_err!(NearbyIssuesParams::new(91.0, 5.0, 100.0).validate());
        assert_err!(NearbyIssuesParams::new(52.0, 5.0, 0.0).validate());
        // 南端が北端より北
        assert_err!(MapIssuesParams::new(52.0, 5.0, 53.0, 4.0).validate());
        // 日付変更線をまたぐ範囲は有効
        assert_ok!(MapIssuesParams::new(10.0, -170.0, 0.0, 170.0).validate());
    }
}
