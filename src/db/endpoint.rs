use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use crate::error::{Error, Result};

const USER_HEADER: &str = "X-ClickHouse-User";
const KEY_HEADER: &str = "X-ClickHouse-Key";
const EXCEPTION_HEADER: &str = "X-ClickHouse-Exception-Code";

/// Credentials and base URL of one ClickHouse HTTP interface.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    http: Client,
    base: Url,
    username: String,
    password: String,
    read_only: bool,
}

impl Endpoint {
    pub(crate) fn new(base: Url, username: &str, password: &str, read_only: bool) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base,
            username: username.to_string(),
            password: password.to_string(),
            read_only,
        })
    }

    pub(crate) fn base(&self) -> &Url {
        &self.base
    }

    fn request(&self, sql: &str, database: &str, format: &str) -> RequestBuilder {
        let mut params = vec![("database", database), ("default_format", format)];
        if self.read_only {
            params.push(("readonly", "1"));
        }
        self.http
            .post(self.base.clone())
            .header(USER_HEADER, &self.username)
            .header(KEY_HEADER, &self.password)
            .query(&params)
            .body(sql.to_string())
    }

    /// Send one statement. Non-2xx answers and answers flagged with an
    /// exception code become [`Error::Server`].
    pub(crate) async fn send(&self, sql: &str, database: &str, format: &str) -> Result<Response> {
        let response = self.request(sql, database, format).send().await?;
        let status = response.status();
        if !status.is_success() || response.headers().contains_key(EXCEPTION_HEADER) {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Server {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }

    /// `GET /ping`; a live server answers `Ok.`.
    pub(crate) async fn ping(&self) -> Result<()> {
        let url = self.base.join("ping")?;
        let failed = |reason: String| Error::Ping {
            url: url.to_string(),
            reason,
        };
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("status {}", response.status())));
        }
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if body.trim() != "Ok." {
            return Err(failed(format!("unexpected answer {:?}", body.trim())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn endpoint(server: &MockServer, read_only: bool) -> Endpoint {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        Endpoint::new(base, "alice", "pw", read_only).unwrap()
    }

    #[tokio::test]
    async fn test_send_sets_credentials_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("X-ClickHouse-User", "alice"))
            .and(header("X-ClickHouse-Key", "pw"))
            .and(query_param("database", "d"))
            .and(query_param("default_format", "JSON"))
            .and(query_param("readonly", "1"))
            .and(body_string("select 1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        endpoint(&server, true).await.send("select 1", "d", "JSON").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Code: 60. Table missing\n"))
            .mount(&server)
            .await;

        let err = endpoint(&server, false).await.send("select 1", "d", "JSON").await.unwrap_err();
        match err {
            Error::Server { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "Code: 60. Table missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exception_header_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-ClickHouse-Exception-Code", "62")
                    .set_body_string("Code: 62. Syntax error"),
            )
            .mount(&server)
            .await;

        let err = endpoint(&server, false).await.send("selec", "d", "JSON").await.unwrap_err();
        assert!(matches!(err, Error::Server { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ok.\n"))
            .mount(&server)
            .await;

        endpoint(&server, false).await.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_unexpected_answer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = endpoint(&server, false).await.ping().await.unwrap_err();
        assert!(matches!(err, Error::Ping { .. }));
    }
}
