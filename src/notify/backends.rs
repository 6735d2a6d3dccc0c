use crate::error::NotifyError;
use crate::notify::{truncate_text, Notifier};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

fn http_client() -> Result<Client, NotifyError> {
    Ok(Client::builder().timeout(Duration::from_secs(15)).build()?)
}

/// Read a webhook response, failing on non-2xx statuses
async fn read_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    service: &str,
) -> Result<T, NotifyError> {
    let status = response.status();
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(NotifyError::NotificationFailed(format!(
            "{} returned error {}: {}",
            service,
            status,
            truncate_text(&text, 200)
        )));
    }

    response.json().await.map_err(|e| {
        NotifyError::NotificationFailed(format!("Failed to parse {} response: {}", service, e))
    })
}

/// ServerChan push via SendKey
///
/// The body is rendered as markdown by ServerChan, so the report table
/// shows as a real table there.
pub struct ServerChan {
    client: Client,
    send_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ServerChanRequest<'a> {
    title: &'a str,
    desp: &'a str,
}

#[derive(Debug, Deserialize)]
struct ServerChanResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

impl ServerChan {
    pub fn new(send_key: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client()?,
            send_key,
            base_url: "https://sctapi.ftqq.com".to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/{}.send",
            self.base_url.trim_end_matches('/'),
            self.send_key
        )
    }
}

impl Notifier for ServerChan {
    fn name(&self) -> &'static str {
        "ServerChan"
    }

    fn max_body_len(&self) -> usize {
        32 * 1024
    }

    fn send<'a>(&'a self, title: &'a str, body: &'a str) -> SendFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url())
                .form(&ServerChanRequest { title, desp: body })
                .send()
                .await?;

            let reply: ServerChanResponse = read_response(response, "ServerChan").await?;
            if reply.code != 0 {
                return Err(NotifyError::Rejected(format!(
                    "ServerChan code {}: {}",
                    reply.code,
                    reply.message.unwrap_or_default()
                )));
            }
            Ok(())
        })
    }
}

/// Telegram bot message
pub struct Telegram {
    client: Client,
    bot_token: String,
    chat_id: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct TelegramRequest {
    chat_id: String,
    text: String,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl Telegram {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        Self::with_api_base(bot_token, chat_id, "https://api.telegram.org".to_string())
    }

    /// Use a different Bot API host, e.g. a reverse proxy
    pub fn with_api_base(
        bot_token: String,
        chat_id: String,
        api_base: String,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client()?,
            bot_token,
            chat_id,
            api_base,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }

    fn build_request(&self, title: &str, body: &str) -> TelegramRequest {
        TelegramRequest {
            chat_id: self.chat_id.clone(),
            text: format!("{}\n\n{}", title, body),
            disable_web_page_preview: true,
        }
    }
}

impl Notifier for Telegram {
    fn name(&self) -> &'static str {
        "Telegram"
    }

    // Message limit is 4096 characters including the title
    fn max_body_len(&self) -> usize {
        3900
    }

    fn send<'a>(&'a self, title: &'a str, body: &'a str) -> SendFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url())
                .json(&self.build_request(title, body))
                .send()
                .await?;

            let reply: TelegramResponse = read_response(response, "Telegram").await?;
            if !reply.ok {
                return Err(NotifyError::Rejected(
                    reply
                        .description
                        .unwrap_or_else(|| "Telegram returned ok=false".to_string()),
                ));
            }
            Ok(())
        })
    }
}

/// WeCom group robot webhook
pub struct WeCom {
    client: Client,
    key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct WeComRequest {
    msgtype: &'static str,
    text: WeComText,
}

#[derive(Debug, Serialize)]
struct WeComText {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WeComResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
}

impl WeCom {
    pub fn new(key: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client()?,
            key,
            base_url: "https://qyapi.weixin.qq.com".to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/cgi-bin/webhook/send?key={}",
            self.base_url.trim_end_matches('/'),
            self.key
        )
    }

    fn build_request(title: &str, body: &str) -> WeComRequest {
        WeComRequest {
            msgtype: "text",
            text: WeComText {
                content: format!("{}\n\n{}", title, body),
            },
        }
    }
}

impl Notifier for WeCom {
    fn name(&self) -> &'static str {
        "WeCom"
    }

    // Text messages are capped at 2048 bytes including the title
    fn max_body_len(&self) -> usize {
        1900
    }

    fn send<'a>(&'a self, title: &'a str, body: &'a str) -> SendFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url())
                .json(&Self::build_request(title, body))
                .send()
                .await?;

            let reply: WeComResponse = read_response(response, "WeCom").await?;
            if reply.errcode != 0 {
                return Err(NotifyError::Rejected(format!(
                    "WeCom errcode {}: {}",
                    reply.errcode,
                    reply.errmsg.unwrap_or_default()
                )));
            }
            Ok(())
        })
    }
}

/// WxPusher message to a single user
pub struct WxPusher {
    client: Client,
    app_token: String,
    uid: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WxPusherRequest {
    app_token: String,
    content: String,
    summary: String,
    /// 1 = plain text
    content_type: u8,
    uids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WxPusherResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

const WXPUSHER_SUCCESS: i64 = 1000;

impl WxPusher {
    pub fn new(app_token: String, uid: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client()?,
            app_token,
            uid,
            base_url: "https://wxpusher.zjiecode.com".to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/send/message", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, title: &str, body: &str) -> WxPusherRequest {
        WxPusherRequest {
            app_token: self.app_token.clone(),
            content: format!("{}\n\n{}", title, body),
            // Summary is shown in the chat list and limited to 100 characters
            summary: title.chars().take(100).collect(),
            content_type: 1,
            uids: vec![self.uid.clone()],
        }
    }
}

impl Notifier for WxPusher {
    fn name(&self) -> &'static str {
        "WxPusher"
    }

    fn max_body_len(&self) -> usize {
        40_000
    }

    fn send<'a>(&'a self, title: &'a str, body: &'a str) -> SendFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url())
                .json(&self.build_request(title, body))
                .send()
                .await?;

            let reply: WxPusherResponse = read_response(response, "WxPusher").await?;
            if reply.code != WXPUSHER_SUCCESS {
                return Err(NotifyError::Rejected(format!(
                    "WxPusher code {}: {}",
                    reply.code,
                    reply.msg.unwrap_or_default()
                )));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serverchan_api_url() {
        let notifier = ServerChan::new("SCT123abc".to_string()).unwrap();
        assert_eq!(notifier.api_url(), "https://sctapi.ftqq.com/SCT123abc.send");
        assert_eq!(notifier.name(), "ServerChan");
    }

    #[test]
    fn test_serverchan_response_deserialization() {
        let reply: ServerChanResponse =
            serde_json::from_str(r#"{"code": 40001, "message": "bad sendkey", "data": null}"#)
                .unwrap();
        assert_eq!(reply.code, 40001);
        assert_eq!(reply.message.as_deref(), Some("bad sendkey"));
    }

    #[test]
    fn test_telegram_api_url_formatting() {
        let default = Telegram::new("123:abc".to_string(), "42".to_string()).unwrap();
        assert_eq!(
            default.api_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );

        let proxied = Telegram::with_api_base(
            "123:abc".to_string(),
            "42".to_string(),
            "https://tg.example.com/".to_string(),
        )
        .unwrap();
        assert_eq!(
            proxied.api_url(),
            "https://tg.example.com/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_telegram_request_serialization() {
        let notifier = Telegram::new("t".to_string(), "-100200".to_string()).unwrap();
        let json = serde_json::to_value(notifier.build_request("Title", "Body")).unwrap();

        assert_eq!(json["chat_id"], "-100200");
        assert_eq!(json["text"], "Title\n\nBody");
        assert_eq!(json["disable_web_page_preview"], true);
    }

    #[test]
    fn test_telegram_error_response_deserialization() {
        let reply: TelegramResponse = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
        )
        .unwrap();
        assert!(!reply.ok);
        assert_eq!(
            reply.description.as_deref(),
            Some("Bad Request: chat not found")
        );
    }

    #[test]
    fn test_wecom_request_serialization() {
        let notifier = WeCom::new("robot-key".to_string()).unwrap();
        assert_eq!(
            notifier.api_url(),
            "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=robot-key"
        );

        let json = serde_json::to_value(WeCom::build_request("Title", "Body")).unwrap();
        assert_eq!(json["msgtype"], "text");
        assert_eq!(json["text"]["content"], "Title\n\nBody");
    }

    #[test]
    fn test_wxpusher_request_serialization() {
        let notifier = WxPusher::new("AT_token".to_string(), "UID_user".to_string()).unwrap();
        assert_eq!(
            notifier.api_url(),
            "https://wxpusher.zjiecode.com/api/send/message"
        );

        let json = serde_json::to_value(notifier.build_request("Title", "Body")).unwrap();
        assert_eq!(json["appToken"], "AT_token");
        assert_eq!(json["contentType"], 1);
        assert_eq!(json["summary"], "Title");
        assert_eq!(json["uids"][0], "UID_user");
    }

    #[test]
    fn test_wxpusher_summary_is_capped() {
        let notifier = WxPusher::new("a".to_string(), "u".to_string()).unwrap();
        let long_title = "x".repeat(150);
        let request = notifier.build_request(&long_title, "Body");
        assert_eq!(request.summary.chars().count(), 100);
    }

    #[test]
    fn test_body_limits_leave_room_for_title() {
        let telegram = Telegram::new("t".to_string(), "c".to_string()).unwrap();
        let wecom = WeCom::new("k".to_string()).unwrap();
        assert!(telegram.max_body_len() < 4096);
        assert!(wecom.max_body_len() < 2048);
    }
}
