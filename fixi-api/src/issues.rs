use crate::client::FixiClient;
use crate::endpoints::Operation;
use crate::error::Result;
use crate::models::{
    ExportIssuesParams, FindIssuesParams, Issue, IssueChanges, IssueListItem, IssueMapListItem,
    ListPage, MapIssuesParams, NearbyIssuesParams, TeamExportParams, TeamIssuesParams,
};
use crate::rest::EndpointCall;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// エクスポートの書き込み先
pub type ExportDestination<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

/// Issues API
///
/// すべての操作はキャンセルトークンを受け取り、送信前・応答待ち・本文の読み取り中に
/// キャンセルを確認する。
#[async_trait]
pub trait IssuesApi: Send + Sync {
    /// Issueを作成日時の降順で検索する
    async fn find(
        &self,
        params: &FindIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueListItem>>;

    /// 公開IDでIssueを取得する
    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<Issue>;

    /// 指定地点の周辺のIssueを取得する
    async fn nearby(
        &self,
        params: &NearbyIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueListItem>>;

    /// 地図の表示範囲内のIssueを取得する
    async fn map_issues(
        &self,
        params: &MapIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueMapListItem>>;

    /// ログインユーザーのチームに割り当てられたIssueを取得する
    async fn team_issues(
        &self,
        params: &TeamIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueListItem>>;

    /// Issue一覧のエクスポートを書き込み先にコピーし、書き込んだバイト数を返す
    ///
    /// 本文をすべて受信してから書き込むため、失敗やキャンセル時には何も書き込まれない。
    async fn export(
        &self,
        params: &ExportIssuesParams,
        destination: ExportDestination<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64>;

    /// チームのIssue一覧のエクスポートを書き込み先にコピーする
    async fn export_team_issues(
        &self,
        params: &TeamExportParams,
        destination: ExportDestination<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64>;

    /// Issueを部分更新し、更新後のIssueを返す
    async fn update(
        &self,
        id: &str,
        changes: &IssueChanges,
        cancel: &CancellationToken,
    ) -> Result<Issue>;
}

impl FixiClient {
    async fn export_to(
        &self,
        call: EndpointCall<'_>,
        destination: ExportDestination<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let body = self.rest.dispatch_raw(call, cancel).await?;

        destination.write_all(&body.bytes).await?;
        destination.flush().await?;

        tracing::debug!(bytes = body.bytes.len(), content_type = ?body.content_type, "Export written");
        Ok(body.bytes.len() as u64)
    }
}

#[async_trait]
impl IssuesApi for FixiClient {
    async fn find(
        &self,
        params: &FindIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueListItem>> {
        params.validate()?;
        let call = EndpointCall::new(Operation::Find).params(params)?;
        self.rest.dispatch(call, cancel).await
    }

    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<Issue> {
        let call = EndpointCall::new(Operation::Get).id(id);
        self.rest.dispatch(call, cancel).await
    }

    async fn nearby(
        &self,
        params: &NearbyIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueListItem>> {
        params.validate()?;
        let call = EndpointCall::new(Operation::Nearby).params(params)?;
        self.rest.dispatch(call, cancel).await
    }

    async fn map_issues(
        &self,
        params: &MapIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueMapListItem>> {
        params.validate()?;
        let call = EndpointCall::new(Operation::MapBounds).params(params)?;
        self.rest.dispatch(call, cancel).await
    }

    async fn team_issues(
        &self,
        params: &TeamIssuesParams,
        cancel: &CancellationToken,
    ) -> Result<ListPage<IssueListItem>> {
        params.validate()?;
        let call = EndpointCall::new(Operation::TeamIssues).params(params)?;
        self.rest.dispatch(call, cancel).await
    }

    async fn export(
        &self,
        params: &ExportIssuesParams,
        destination: ExportDestination<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        params.validate()?;
        let call = EndpointCall::new(Operation::Export).params(params)?;
        self.export_to(call, destination, cancel).await
    }

    async fn export_team_issues(
        &self,
        params: &TeamExportParams,
        destination: ExportDestination<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        params.validate()?;
        let call = EndpointCall::new(Operation::ExportTeamIssues).params(params)?;
        self.export_to(call, destination, cancel).await
    }

    async fn update(
        &self,
        id: &str,
        changes: &IssueChanges,
        cancel: &CancellationToken,
    ) -> Result<Issue> {
        let call = EndpointCall::new(Operation::Update).id(id).json(changes)?;
        self.rest.dispatch(call, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FixiConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FixiClient {
        let config = FixiConfig::new(server.uri(), None).unwrap();
        FixiClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_get_uses_opaque_id_segment() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/FX%201"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "FX 1",
                "description": "Pothole",
                "category": "roads",
                "status": "Open",
                "created": "2024-01-01T00:00:00Z"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let issue = client.get("FX 1", &CancellationToken::new()).await.unwrap();

        assert_eq!(issue.id, "FX 1");
    }

    #[tokio::test]
    async fn test_update_sends_patch_with_changes_only() {
        // Given: 変更されたフィールドだけのPATCHを期待するモック
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/issues/FX-7"))
            .and(body_json(json!({ "status": "Closed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "FX-7",
                "description": "Graffiti on wall",
                "category": "graffiti",
                "status": "Closed",
                "created": "2024-01-01T00:00:00Z",
                "lastModified": "2024-01-05T12:00:00Z"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // When: ステータスだけを更新
        let changes = IssueChanges::new().status(crate::Status::Closed);
        let issue = client
            .update("FX-7", &changes, &CancellationToken::new())
            .await
            .unwrap();

        // Then: 更新後のIssue全体が返る
        assert_eq!(issue.status, crate::Status::Closed);
        assert!(issue.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_invalid_params_are_rejected_locally() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let result = client
            .find(&FindIssuesParams::new().page(0), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_export_writes_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/export"))
            .and(query_param("api-version", "2.0"))
            .and(query_param("q", "lamp"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                b"PK\x03\x04sheet".to_vec(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let mut destination: Vec<u8> = Vec::new();

        let written = client
            .export(
                &ExportIssuesParams::new().q("lamp"),
                &mut destination,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(written, 9);
        assert_eq!(destination, b"PK\x03\x04sheet");
    }
}
