//! テスト用の簡易 HTTP サーバーと外部サービスのフェイク。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use wxnotify_core::TemplateField;

use crate::store::{Document, DocumentStore, StoreError};
use crate::weather::{HourlyForecast, WeatherProvider};
use crate::wechat::{Messenger, SendOutcome};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// パスとクエリ
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// 接続ごとに 1 リクエストを受け取り、登録順にレスポンスを返す HTTP サーバー。
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// `(status, body)` を順に返すサーバーを起動する。使い切った後は最後のレスポンスを繰り返す。
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut index = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);

                let (status, body) = responses
                    .get(index)
                    .or(responses.last())
                    .cloned()
                    .unwrap_or((404, String::new()));
                index += 1;

                let response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    reason(status),
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// プロキシ設定の影響を受けないテスト用クライアント。
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

async fn read_request(socket: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    }
}

/// 固定の結果を返す天気プロバイダ。
#[derive(Default)]
pub struct FakeWeather {
    pub city_code: Option<String>,
    pub hourly: Option<Vec<HourlyForecast>>,
    pub lookups: Mutex<Vec<(String, String)>>,
}

impl FakeWeather {
    pub fn sunny() -> Self {
        Self {
            city_code: Some("101020100".to_string()),
            hourly: Some(vec![HourlyForecast {
                fx_time: "2026-10-18T09:00+08:00".to_string(),
                temp: "21".to_string(),
                icon: "100".to_string(),
                text: "晴".to_string(),
                humidity: "60".to_string(),
            }]),
            lookups: Mutex::default(),
        }
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn resolve_city_code(&self, city: &str, country: &str) -> Option<String> {
        self.lookups
            .lock()
            .unwrap()
            .push((city.to_string(), country.to_string()));
        self.city_code.clone()
    }

    async fn fetch_hourly_forecast(&self, _city_code: &str) -> Option<Vec<HourlyForecast>> {
        self.hourly.clone()
    }
}

/// メモリ上のドキュメントストア。更新呼び出しを記録する。
#[derive(Default)]
pub struct FakeStore {
    pub documents: Mutex<BTreeMap<String, Value>>,
    pub updates: Mutex<Vec<(String, Value)>>,
    pub fail_list: bool,
}

impl FakeStore {
    pub fn with(documents: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Self {
            documents: Mutex::new(
                documents
                    .into_iter()
                    .map(|(id, data)| (id.to_string(), data))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn updates(&self) -> Vec<(String, Value)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn list_all(&self, _collection: &str) -> Result<Vec<Document>> {
        if self.fail_list {
            anyhow::bail!("store unavailable");
        }
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn get_by_id(&self, _collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.documents.lock().unwrap().get(id).cloned())
    }

    async fn update_by_id(&self, _collection: &str, id: &str, data: &Value) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), data.clone()));

        let mut documents = self.documents.lock().unwrap();
        let Some(Value::Object(existing)) = documents.get_mut(id) else {
            return Err(StoreError::NotFound(id.to_string()).into());
        };
        if let Value::Object(fields) = data {
            for (k, v) in fields {
                existing.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}

/// 送信内容を記録し、open id ごとに決めた結果を返すメッセンジャー。
#[derive(Default)]
pub struct FakeMessenger {
    /// 未登録の open id は Delivered
    pub outcomes: BTreeMap<String, SendOutcome>,
    pub sent: Mutex<Vec<(String, String, Vec<TemplateField>)>>,
}

impl FakeMessenger {
    pub fn sent(&self) -> Vec<(String, String, Vec<TemplateField>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_templated_message(
        &self,
        open_id: &str,
        template_id: &str,
        fields: &[TemplateField],
    ) -> SendOutcome {
        self.sent.lock().unwrap().push((
            open_id.to_string(),
            template_id.to_string(),
            fields.to_vec(),
        ));
        self.outcomes
            .get(open_id)
            .cloned()
            .unwrap_or(SendOutcome::Delivered)
    }
}
