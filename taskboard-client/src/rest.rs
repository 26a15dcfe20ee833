//! reqwest implementation of [`PersistenceApi`] against the JSON backend.
use std::sync::RwLock;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, ACCEPT, SET_COOKIE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use taskboard_core::{
    Column, ColumnId, ColumnRequest, MoveTaskRequest, PersistenceApi, PersistenceError, SavedTask,
    TaskDraft, TaskId,
};

use crate::config::ClientConfig;
use crate::dto::{ColumnBody, MoveTaskBody, TaskBody, WireColumn, WireTask};

const XSRF_COOKIE: &str = "XSRF-TOKEN";
const XSRF_HEADER: &str = "X-XSRF-TOKEN";
/// Laravel-style "CSRF token mismatch".
const STATUS_TOKEN_EXPIRED: u16 = 419;
const MAX_ERROR_BODY: usize = 200;

pub struct RestApi {
    client: reqwest::Client,
    base_url: String,
    xsrf_token: RwLock<Option<String>>,
}

impl RestApi {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        xsrf_token: Option<String>,
    ) -> Result<Self, PersistenceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            xsrf_token: RwLock::new(xsrf_token),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, PersistenceError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.xsrf_token.clone(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token sent with the next request.
    pub fn xsrf_token(&self) -> Option<String> {
        self.xsrf_token
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn set_xsrf_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.xsrf_token.write() {
            *guard = token;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request. HTTP 419 refreshes the CSRF token and retries once.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, PersistenceError> {
        let mut retried = false;
        loop {
            let mut request = self
                .client
                .request(method.clone(), self.url(path))
                .header(ACCEPT, "application/json")
                .header("X-Requested-With", "XMLHttpRequest");
            if let Some(token) = self.xsrf_token() {
                request = request.header(XSRF_HEADER, token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            log::debug!("[taskboard.client] {} {}", method, path);
            let response = request.send().await.map_err(map_error)?;
            let status = response.status();

            if status.as_u16() == STATUS_TOKEN_EXPIRED && !retried {
                log::info!("[taskboard.client] CSRF token rejected, refreshing");
                retried = true;
                self.refresh_xsrf_token().await?;
                continue;
            }
            if !status.is_success() {
                return Err(status_error(status, response).await);
            }
            return Ok(response);
        }
    }

    async fn refresh_xsrf_token(&self) -> Result<(), PersistenceError> {
        self.set_xsrf_token(None);
        let response = self
            .client
            .get(self.url("/api/csrf-token"))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), response).await);
        }
        match xsrf_from_headers(response.headers()) {
            Some(token) => {
                self.set_xsrf_token(Some(token));
                Ok(())
            }
            None => Err(PersistenceError::Decode(format!(
                "no {} cookie in csrf-token response",
                XSRF_COOKIE
            ))),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, PersistenceError> {
        let response = self.send(method, path, body).await?;
        response.json::<T>().await.map_err(map_error)
    }
}

fn to_body(value: impl Serialize) -> Result<Option<serde_json::Value>, PersistenceError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| PersistenceError::Decode(e.to_string()))
}

fn map_error(e: reqwest::Error) -> PersistenceError {
    if e.is_timeout() {
        PersistenceError::Timeout
    } else if e.is_decode() {
        PersistenceError::Decode(e.to_string())
    } else {
        PersistenceError::Transport(e.to_string())
    }
}

async fn status_error(status: StatusCode, response: Response) -> PersistenceError {
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    PersistenceError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Pull the `XSRF-TOKEN` value out of `Set-Cookie` headers.
pub fn xsrf_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            if name.trim() != XSRF_COOKIE || value.is_empty() {
                return None;
            }
            Some(percent_decode_str(value.trim()).decode_utf8_lossy().into_owned())
        })
}

impl PersistenceApi for RestApi {
    async fn fetch_columns(&self, project_id: i64) -> Result<Vec<Column>, PersistenceError> {
        let path = format!("/api/columns?projectId={}", project_id);
        let columns: Vec<WireColumn> = self.send_json(Method::GET, &path, None).await?;
        columns.into_iter().map(WireColumn::into_column).collect()
    }

    async fn move_task(&self, request: MoveTaskRequest) -> Result<(), PersistenceError> {
        let body = to_body(MoveTaskBody::from(&request))?;
        self.send(Method::POST, "/api/tasks/move", body).await?;
        Ok(())
    }

    async fn create_column(
        &self,
        project_id: i64,
        request: ColumnRequest,
    ) -> Result<Column, PersistenceError> {
        let path = format!("/api/columns?projectId={}", project_id);
        let body = to_body(ColumnBody::from(&request))?;
        let column: WireColumn = self.send_json(Method::POST, &path, body).await?;
        column.into_column()
    }

    async fn update_column(
        &self,
        column_id: ColumnId,
        request: ColumnRequest,
    ) -> Result<Column, PersistenceError> {
        let path = format!("/api/columns/{}", column_id.0);
        let body = to_body(ColumnBody::from(&request))?;
        let column: WireColumn = self.send_json(Method::POST, &path, body).await?;
        column.into_column()
    }

    async fn delete_column(&self, column_id: ColumnId) -> Result<(), PersistenceError> {
        let path = format!("/api/columns/{}", column_id.0);
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn create_task(
        &self,
        project_id: i64,
        draft: TaskDraft,
    ) -> Result<SavedTask, PersistenceError> {
        let body = to_body(TaskBody::new(project_id, &draft))?;
        let task: WireTask = self.send_json(Method::POST, "/api/tasks", body).await?;
        task.into_saved()
    }

    async fn update_task(
        &self,
        task_id: TaskId,
        project_id: i64,
        draft: TaskDraft,
    ) -> Result<SavedTask, PersistenceError> {
        let path = format!("/api/tasks/{}", task_id.0);
        let body = to_body(TaskBody::new(project_id, &draft))?;
        let task: WireTask = self.send_json(Method::POST, &path, body).await?;
        task.into_saved()
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), PersistenceError> {
        let path = format!("/api/tasks/{}", task_id.0);
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer, token: Option<&str>) -> RestApi {
        RestApi::new(
            &server.uri(),
            Duration::from_secs(5),
            token.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_xsrf_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("PHPSESSID=abc; path=/"));
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("XSRF-TOKEN=a%3Db; path=/; samesite=lax"),
        );
        assert_eq!(xsrf_from_headers(&headers), Some("a=b".to_string()));
        assert_eq!(xsrf_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_fetch_columns_sends_ajax_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/columns"))
            .and(query_param("projectId", "4"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .and(header("Accept", "application/json"))
            .and(header("X-XSRF-TOKEN", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "Todo", "score": 100, "tasks": [
                    {"id": 10, "name": "A", "score": 200, "relatedColumn": {"id": 1}}
                ]}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let columns = api(&server, Some("tok")).fetch_columns(4).await.unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].tasks[0].id, TaskId(10));
    }

    #[tokio::test]
    async fn test_move_task_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tasks/move"))
            .and(body_json(json!({"id": 10, "columnId": 2, "score": 300})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        api(&server, None)
            .move_task(MoveTaskRequest {
                task_id: TaskId(10),
                column_id: ColumnId(2),
                score: 300.0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/tasks/10"))
            .and(header("X-XSRF-TOKEN", "fresh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/tasks/10"))
            .respond_with(ResponseTemplate::new(419))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/csrf-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "XSRF-TOKEN=fresh; path=/")
                    .set_body_json(json!({})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server, Some("stale"));
        api.delete_task(TaskId(10)).await.unwrap();
        assert_eq!(api.xsrf_token(), Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn test_second_419_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/columns/3"))
            .respond_with(ResponseTemplate::new(419))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/csrf-token"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "XSRF-TOKEN=again"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = api(&server, None).delete_column(ColumnId(3)).await;
        assert!(matches!(
            result,
            Err(PersistenceError::Status { status: 419, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/columns/3"))
            .respond_with(ResponseTemplate::new(422).set_body_string("name is blank"))
            .mount(&server)
            .await;

        let result = api(&server, None)
            .update_column(
                ColumnId(3),
                ColumnRequest {
                    name: "x".into(),
                    score: None,
                },
            )
            .await;
        assert_eq!(
            result,
            Err(PersistenceError::Status {
                status: 422,
                message: "name is blank".into()
            })
        );
    }

    #[tokio::test]
    async fn test_engine_rolls_back_when_backend_refuses_move() {
        use taskboard_core::{BoardEngine, ScoringConfig};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/columns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "Todo", "score": 100, "tasks": [
                    {"id": 10, "name": "A", "score": 200},
                    {"id": 11, "name": "B", "score": 100}
                ]}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tasks/move"))
            .and(body_json(json!({"id": 11, "columnId": 1, "score": 300})))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let engine = BoardEngine::new(api(&server, None), ScoringConfig::default());
        engine.load(1).await.unwrap();
        let before = engine.board();
        let result = engine.move_task(TaskId(11), ColumnId(1), 0).await;
        assert!(result.is_err());
        assert_eq!(engine.board(), before);
    }

    #[tokio::test]
    async fn test_create_task_reads_related_column() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .and(body_json(json!({
                "name": "New",
                "description": "",
                "priority": "medium",
                "projectId": 4,
                "assigneesIds": [],
                "labelsIds": [],
                "dueAt": null
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 55, "name": "New", "score": 900, "relatedColumn": {"id": 1}
            })))
            .mount(&server)
            .await;

        let task = api(&server, None)
            .create_task(4, TaskDraft::named("New"))
            .await
            .unwrap();
        assert_eq!(task.id, TaskId(55));
        assert_eq!(task.related_column, Some(ColumnId(1)));
        assert_eq!(task.score, Some(900.0));
    }

    #[tokio::test]
    async fn test_engine_keeps_task_created_without_placement() {
        use taskboard_core::{BoardEngine, ScoringConfig};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/columns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "Todo", "score": 100, "tasks": []},
                {"id": 2, "name": "Doing", "score": 200, "tasks": [
                    {"id": 20, "name": "A", "score": 100}
                ]}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 56,
                "name": "New",
                "description": "",
                "priority": "medium",
                "assignees": [],
                "tags": [],
                "dueAt": null,
                "relatedColumn": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let engine = BoardEngine::new(api(&server, None), ScoringConfig::default());
        engine.load(1).await.unwrap();
        let id = engine
            .create_task(ColumnId(2), TaskDraft::named("New"))
            .await
            .unwrap();
        assert_eq!(id, TaskId(56));
        let board = engine.board();
        let task = board.task(id).unwrap();
        assert_eq!(task.related_column, ColumnId(2));
        assert_eq!(task.score, 200.0);
    }
}
