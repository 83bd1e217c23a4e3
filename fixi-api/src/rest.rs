//! RESTful API 呼び出しの共通部分
//!
//! クエリ文字列の組み立て、送信、本文の読み取り、型付きデシリアライズと
//! エラー変換を担う。リトライは行わない。

use crate::endpoints::Operation;
use crate::error::{Error, Result};
use crate::formatter::{FormatterCollection, read_as};
use crate::query::{QueryPair, to_query_pairs};
use crate::uri::{add_query, expand_path};
use reqwest::{Client, RequestBuilder, Response, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 受信したレスポンス本文
#[derive(Debug, Clone)]
pub struct ResponseBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// エンドポイント表に基づく1回分の呼び出し
#[derive(Debug, Clone)]
pub struct EndpointCall<'a> {
    pub operation: Operation,
    pub id: Option<&'a str>,
    pub query: Vec<QueryPair>,
    pub body: Option<serde_json::Value>,
}

impl<'a> EndpointCall<'a> {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            id: None,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    pub fn params<P>(mut self, params: &P) -> Result<Self>
    where
        P: Serialize + ?Sized,
    {
        self.query = to_query_pairs(params)?;
        Ok(self)
    }

    pub fn json<B>(mut self, body: &B) -> Result<Self>
    where
        B: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(body).map_err(|e| Error::SerializationError(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// ベースURLからの相対URI
    pub fn request_uri(&self) -> Result<String> {
        let endpoint = self.operation.endpoint();
        let path = match (endpoint.requires_id(), self.id) {
            (true, Some(id)) => expand_path(endpoint.path, id)?,
            (true, None) => {
                return Err(Error::InvalidInput(format!(
                    "{:?} requires an issue ID",
                    self.operation
                )));
            }
            (false, _) => endpoint.path.to_string(),
        };
        Ok(add_query(&path, &self.query))
    }
}

#[derive(Debug, Clone)]
pub struct RestApi {
    client: Client,
    base_url: String,
    formatters: Arc<FormatterCollection>,
}

impl RestApi {
    pub fn new(client: Client, base_url: impl Into<String>, formatters: FormatterCollection) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            formatters: Arc::new(formatters),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// レスポンスのデシリアライズに使うフォーマッター
    pub fn formatters(&self) -> &FormatterCollection {
        &self.formatters
    }

    fn url(&self, request_uri: &str) -> String {
        format!("{}{}", self.base_url, request_uri)
    }

    /// GETリクエストを送り、本文を `T` として読む
    pub async fn get<T>(&self, request_uri: &str, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = self.client.get(self.url(request_uri));
        let body = self.execute(request, cancel).await?;
        self.read(body)
    }

    /// `params` の公開フィールドをクエリ文字列として付けてGETリクエストを送る
    pub async fn get_with<T, P>(
        &self,
        request_uri: &str,
        params: &P,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let query = to_query_pairs(params)?;
        self.get(&add_query(request_uri, &query), cancel).await
    }

    pub async fn patch<T, B>(
        &self,
        request_uri: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.client.patch(self.url(request_uri)).json(body);
        let body = self.execute(request, cancel).await?;
        self.read(body)
    }

    /// 本文をデシリアライズせずにそのまま取得する
    pub async fn download(&self, request_uri: &str, cancel: &CancellationToken) -> Result<ResponseBody> {
        let request = self.client.get(self.url(request_uri));
        self.execute(request, cancel).await
    }

    /// エンドポイント表に従ってリクエストを送り、本文を `T` として読む
    pub async fn dispatch<T>(&self, call: EndpointCall<'_>, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.dispatch_raw(call, cancel).await?;
        self.read(body)
    }

    /// エンドポイント表に従ってリクエストを送り、本文をそのまま返す
    pub async fn dispatch_raw(
        &self,
        call: EndpointCall<'_>,
        cancel: &CancellationToken,
    ) -> Result<ResponseBody> {
        let endpoint = call.operation.endpoint();
        let url = self.url(&call.request_uri()?);

        let mut request = self.client.request(endpoint.verb.method(), url);
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        self.execute(request, cancel).await
    }

    fn read<T>(&self, body: ResponseBody) -> Result<T>
    where
        T: DeserializeOwned,
    {
        read_as(&self.formatters, body.content_type.as_deref(), &body.bytes)
    }

    async fn execute(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<ResponseBody> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(%method, %url, "Sending request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%method, %url, "Request cancelled before response");
                return Err(Error::Cancelled);
            }
            response = self.client.execute(request) => response?,
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = read_body(response, cancel).await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            tracing::debug!(%method, %url, status = status.as_u16(), "Request failed");
            return Err(Error::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(%method, %url, status = status.as_u16(), bytes = bytes.len(), "Response received");
        Ok(ResponseBody {
            content_type,
            bytes,
        })
    }
}

/// 本文をチャンクごとに読み取る。キャンセルされた場合は読み取り途中のデータを捨てる
async fn read_body(mut response: Response, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(read = body.len(), "Request cancelled while reading body");
                return Err(Error::Cancelled);
            }
            chunk = response.chunk() => chunk?,
        };

        match chunk {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => return Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindIssuesParams;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rest_api(base_url: &str) -> RestApi {
        RestApi::new(Client::new(), base_url, FormatterCollection::default())
    }

    #[test]
    fn test_request_uri_for_find() {
        let call = EndpointCall::new(Operation::Find)
            .params(&FindIssuesParams::new().add_category("roads"))
            .unwrap();

        assert_eq!(
            call.request_uri().unwrap(),
            "/issues?api-version=2.0&searchPrivateInfo=false&category=roads&page=1&count=20"
        );
    }

    #[test]
    fn test_request_uri_requires_id() {
        let missing = EndpointCall::new(Operation::Get).request_uri();
        assert!(matches!(missing, Err(Error::InvalidInput(_))));

        let uri = EndpointCall::new(Operation::Get).id("FX/1").request_uri().unwrap();
        assert_eq!(uri, "/issues/FX%2F1");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = rest_api("https://fixi.example.com/api/");
        assert_eq!(api.base_url(), "https://fixi.example.com/api");
        assert_eq!(api.url("/issues/1"), "https://fixi.example.com/api/issues/1");
    }

    #[tokio::test]
    async fn test_get_with_merges_query() {
        #[derive(Serialize)]
        struct Params {
            category: Vec<&'static str>,
        }

        // Given: api-version とカテゴリを確認するモック
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues"))
            .and(query_param("api-version", "2.0"))
            .and(query_param("category", "roads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());

        // When: パラメータ付きでGET
        let value: serde_json::Value = api
            .get_with(
                "/issues?api-version=2.0",
                &Params {
                    category: vec!["roads"],
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // Then: 型付きで読める
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_patch_sends_json_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/issues/FX-3"))
            .and(body_json(json!({ "category": "lighting" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "FX-3" })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());
        let value: serde_json::Value = api
            .patch(
                "/issues/FX-3",
                &json!({ "category": "lighting" }),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(value["id"], "FX-3");
    }

    #[tokio::test]
    async fn test_download_returns_raw_body() {
        // Given: どのフォーマッターも読めないメディアタイプ
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/export"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"a;b\n1;2".to_vec(), "text/csv"))
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());

        // When: デシリアライズせずに取得
        let body = api
            .download("/issues/export", &CancellationToken::new())
            .await
            .unwrap();

        // Then: 本文とContent-Typeがそのまま返る
        assert_eq!(body.bytes, b"a;b\n1;2");
        assert_eq!(body.content_type.as_deref(), Some("text/csv"));
    }

    #[tokio::test]
    async fn test_non_success_is_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Issue not found"))
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());
        let result: Result<serde_json::Value> = api.get("/issues/missing", &CancellationToken::new()).await;

        match result.unwrap_err() {
            Error::ApiError { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Issue not found");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{\"id\": [", "application/json"))
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());
        let result: Result<crate::models::Issue> = api.get("/issues/broken", &CancellationToken::new()).await;

        match result.unwrap_err() {
            Error::InvalidResponse { type_name, .. } => {
                assert_eq!(type_name, "fixi_api::models::issue::Issue");
            }
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_already_cancelled_token_sends_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<serde_json::Value> = api.get("/issues", &cancel).await;

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_response() {
        // Given: 応答が遅いサーバー
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let api = rest_api(&mock_server.uri());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        // When: 応答待ちの間にキャンセル
        let started = std::time::Instant::now();
        let result: Result<serde_json::Value> = api.get("/issues", &cancel).await;

        // Then: 遅延を待たずに Cancelled が返る
        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
