use crate::capacity::CapacitySnapshot;
use crate::cloud::auth::{
    encrypt_credential, http_date, sign_request, EncryptConf, EncryptConfResponse, LoginForm,
};
use crate::cloud::{
    ApiFuture, CloudApi, FamilyInfo, FamilyListResponse, FamilySignResponse, LotteryTask,
    PrizeResponse, UserSignResponse, UserSizeInfoResponse,
};
use crate::config::Account;
use crate::error::CloudError;
use chrono::Utc;
use log::{debug, info};
use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::Duration;

const APP_ID: &str = "8025431004";
const CLIENT_TYPE: &str = "10020";
const RETURN_URL: &str = "https://m.cloud.189.cn/zhuanti/2020/loginErrorPc/index.html";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_JSON: &str = "application/json;charset=UTF-8";

/// Hosts the client talks to
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    /// Web portal, cookie authenticated
    pub web: String,
    /// Mobile web, cookie authenticated
    pub mobile: String,
    /// Login service
    pub auth: String,
    /// Session-signed API host
    pub api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            web: "https://cloud.189.cn".to_string(),
            mobile: "https://m.cloud.189.cn".to_string(),
            auth: "https://open.e.189.cn".to_string(),
            api: "https://api.cloud.189.cn".to_string(),
        }
    }
}

impl Endpoints {
    fn join(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

/// Family session keys returned when a PC session is opened
#[derive(Debug, Clone, Deserialize)]
struct Session {
    #[serde(rename = "familySessionKey")]
    family_session_key: String,
    #[serde(rename = "familySessionSecret")]
    family_session_secret: String,
}

#[derive(Debug, Deserialize)]
struct LoginSubmitResponse {
    result: i32,
    #[serde(default)]
    msg: Option<String>,
    #[serde(rename = "toUrl", default)]
    to_url: Option<String>,
}

/// Status fields the service attaches to failed calls
#[derive(Debug, Default, Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    res_code: Option<serde_json::Value>,
    #[serde(default)]
    res_message: Option<String>,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorMsg", default)]
    error_msg: Option<String>,
}

/// Storage service client over HTTP
///
/// One client serves one account. Web calls ride on the cookies collected
/// during login; family calls are signed with the family session secret.
pub struct HttpCloudClient {
    client: Client,
    account: Account,
    endpoints: Endpoints,
    session: RwLock<Option<Session>>,
}

impl HttpCloudClient {
    /// Create a client for one account against the production hosts
    pub fn new(account: Account) -> Result<Self, CloudError> {
        Self::with_endpoints(account, Endpoints::default())
    }

    /// Create a client against custom hosts
    pub fn with_endpoints(account: Account, endpoints: Endpoints) -> Result<Self, CloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            account,
            endpoints,
            session: RwLock::new(None),
        })
    }

    fn session(&self) -> Result<Session, CloudError> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(CloudError::NotLoggedIn)
    }

    fn rand_param() -> String {
        Utc::now().timestamp_millis().to_string()
    }

    async fn fetch_encrypt_conf(&self) -> Result<EncryptConf, CloudError> {
        let response = self
            .client
            .post(Endpoints::join(
                &self.endpoints.auth,
                "/api/logbox/config/encryptConf.do",
            ))
            .form(&[("appId", "cloud")])
            .send()
            .await?;

        let conf: EncryptConfResponse = read_json(response, "encryptConf", false).await?;
        match conf {
            EncryptConfResponse {
                result: 0,
                data: Some(data),
            } => Ok(data),
            other => Err(CloudError::LoginFailed(format!(
                "encryption config unavailable (result {})",
                other.result
            ))),
        }
    }

    async fn fetch_login_form(&self) -> Result<LoginForm, CloudError> {
        let timestamp = Self::rand_param();
        let response = self
            .client
            .get(Endpoints::join(
                &self.endpoints.web,
                "/api/portal/unifyLoginForPC.action",
            ))
            .query(&[
                ("appId", APP_ID),
                ("clientType", CLIENT_TYPE),
                ("returnURL", RETURN_URL),
                ("timeStamp", timestamp.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let html = response.text().await?;
        if !status.is_success() {
            return Err(CloudError::Http(format!(
                "login page returned {}",
                status
            )));
        }

        LoginForm::parse(&html)
    }

    async fn submit_login(
        &self,
        conf: &EncryptConf,
        form: &LoginForm,
    ) -> Result<String, CloudError> {
        let user_name = encrypt_credential(conf, &self.account.username)?;
        let password = encrypt_credential(conf, &self.account.password)?;

        let response = self
            .client
            .post(Endpoints::join(
                &self.endpoints.auth,
                "/api/logbox/oauth2/loginSubmit.do",
            ))
            .header(REFERER, self.endpoints.auth.as_str())
            .header("lt", form.lt.as_str())
            .header("REQID", form.req_id.as_str())
            .form(&[
                ("appKey", APP_ID),
                ("accountType", "02"),
                ("userName", user_name.as_str()),
                ("password", password.as_str()),
                ("validateCode", ""),
                ("captchaToken", form.captcha_token.as_str()),
                ("returnUrl", RETURN_URL),
                ("mailSuffix", "@189.cn"),
                ("dynamicCheck", "FALSE"),
                ("clientType", CLIENT_TYPE),
                ("cb_SaveName", "1"),
                ("isOauth2", "false"),
                ("state", ""),
                ("paramId", form.param_id.as_str()),
            ])
            .send()
            .await?;

        let submitted: LoginSubmitResponse = read_json(response, "loginSubmit", false).await?;
        match submitted {
            LoginSubmitResponse {
                result: 0,
                to_url: Some(to_url),
                ..
            } => Ok(to_url),
            other => Err(CloudError::LoginFailed(
                other
                    .msg
                    .unwrap_or_else(|| format!("login rejected (result {})", other.result)),
            )),
        }
    }

    async fn open_session(&self, redirect_url: &str) -> Result<Session, CloudError> {
        let rand = Self::rand_param();
        let response = self
            .client
            .post(Endpoints::join(&self.endpoints.api, "/getSessionForPC.action"))
            .header(ACCEPT, ACCEPT_JSON)
            .query(&[
                ("clientType", "TELEPC"),
                ("version", "6.2"),
                ("channelId", "web_cloud.189.cn"),
                ("rand", rand.as_str()),
                ("redirectURL", redirect_url),
            ])
            .send()
            .await?;

        let session: Session = read_json(response, "getSessionForPC", false).await?;
        Ok(session)
    }

    /// Build a GET against the API host carrying the family session signature
    fn signed_get(&self, session: &Session, path: &str) -> Result<RequestBuilder, CloudError> {
        let date = http_date(Utc::now());
        let signature = sign_request(
            &session.family_session_secret,
            &session.family_session_key,
            "GET",
            path,
            &date,
        )?;

        Ok(self
            .client
            .get(Endpoints::join(&self.endpoints.api, path))
            .header(ACCEPT, ACCEPT_JSON)
            .header("Date", date)
            .header("SessionKey", session.family_session_key.as_str())
            .header("Signature", signature)
            .header("X-Request-ID", uuid::Uuid::new_v4().to_string()))
    }
}

impl CloudApi for HttpCloudClient {
    fn login(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let masked = self.account.masked();
            debug!("Logging in account {}", masked);

            let conf = self.fetch_encrypt_conf().await?;
            let form = self.fetch_login_form().await?;
            let redirect_url = self.submit_login(&conf, &form).await?;
            let session = self.open_session(&redirect_url).await?;

            // Following the redirect sets the web portal cookies
            let response = self.client.get(&redirect_url).send().await?;
            if !response.status().is_success() {
                return Err(CloudError::LoginFailed(format!(
                    "session redirect returned {}",
                    response.status()
                )));
            }

            if session.family_session_secret.is_empty() {
                return Err(CloudError::LoginFailed(
                    "empty family session secret".to_string(),
                ));
            }

            *self
                .session
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
            info!("Account {} logged in", masked);
            Ok(())
        })
    }

    fn user_sign(&self) -> ApiFuture<'_, UserSignResponse> {
        Box::pin(async move {
            self.session()?;
            let rand = Self::rand_param();
            let response = self
                .client
                .get(Endpoints::join(&self.endpoints.web, "/mkt/userSign.action"))
                .query(&[
                    ("rand", rand.as_str()),
                    ("clientType", "TELEANDROID"),
                    ("version", "8.6.3"),
                    ("model", "SM-G930K"),
                ])
                .send()
                .await?;

            let sign: UserSignResponse = read_json(response, "userSign", false).await?;
            Ok(sign)
        })
    }

    fn draw_prize(&self, task: LotteryTask) -> ApiFuture<'_, PrizeResponse> {
        Box::pin(async move {
            self.session()?;
            let response = self
                .client
                .get(Endpoints::join(
                    &self.endpoints.mobile,
                    "/v2/drawPrizeMarketDetails.action",
                ))
                .query(&[
                    ("taskId", task.task_id()),
                    ("activityId", LotteryTask::ACTIVITY_ID),
                ])
                .send()
                .await?;

            // A lottery error code is an outcome, not a failure
            let prize: PrizeResponse =
                read_json(response, "drawPrizeMarketDetails", true).await?;
            Ok(prize)
        })
    }

    fn family_list(&self) -> ApiFuture<'_, Vec<FamilyInfo>> {
        Box::pin(async move {
            let session = self.session()?;
            let response = self
                .signed_get(&session, "/open/family/manage/getFamilyList.action")?
                .send()
                .await?;

            let list: FamilyListResponse = read_json(response, "getFamilyList", false).await?;
            Ok(list.family_info_resp.unwrap_or_default())
        })
    }

    fn family_sign<'a>(&'a self, family_id: &'a str) -> ApiFuture<'a, FamilySignResponse> {
        Box::pin(async move {
            let session = self.session()?;
            let response = self
                .signed_get(&session, "/open/family/manage/exeFamilyUserSign.action")?
                .query(&[("familyId", family_id)])
                .send()
                .await?;

            let signed: FamilySignResponse =
                read_json(response, "exeFamilyUserSign", false).await?;
            Ok(signed)
        })
    }

    fn capacity(&self) -> ApiFuture<'_, CapacitySnapshot> {
        Box::pin(async move {
            self.session()?;
            let response = self
                .client
                .get(Endpoints::join(
                    &self.endpoints.web,
                    "/api/portal/getUserSizeInfo.action",
                ))
                .header(ACCEPT, ACCEPT_JSON)
                .send()
                .await?;

            let info: UserSizeInfoResponse = read_json(response, "getUserSizeInfo", false).await?;
            Ok(CapacitySnapshot::from(&info))
        })
    }
}

/// Check the status, look for a service error and decode the body
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    call: &str,
    accept_error_code: bool,
) -> Result<T, CloudError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(CloudError::Http(format!(
            "{} returned {}: {}",
            call,
            status,
            snippet(&body)
        )));
    }

    decode_body(&body, call, accept_error_code)
}

fn decode_body<T: DeserializeOwned>(
    body: &str,
    call: &str,
    accept_error_code: bool,
) -> Result<T, CloudError> {
    if let Some(error) = service_error(body, accept_error_code) {
        return Err(error);
    }

    serde_json::from_str(body).map_err(|e| {
        CloudError::InvalidResponse(format!(
            "Failed to parse {} response: {}. Response was: {}",
            call,
            e,
            snippet(body)
        ))
    })
}

/// Extract a service-level error from a response body, if there is one
fn service_error(body: &str, accept_error_code: bool) -> Option<CloudError> {
    let status: ServiceStatus = serde_json::from_str(body).unwrap_or_default();

    let res_code_failed = match status.res_code {
        Some(serde_json::Value::Number(ref code)) => code.as_i64() != Some(0),
        Some(serde_json::Value::String(ref code)) => code != "0",
        _ => false,
    };
    if res_code_failed {
        return Some(CloudError::Api {
            code: status
                .res_code
                .map(|code| code.to_string().trim_matches('"').to_string())
                .unwrap_or_default(),
            message: status.res_message.unwrap_or_default(),
        });
    }

    match status.error_code {
        Some(code) if !accept_error_code && !code.is_empty() => Some(CloudError::Api {
            code,
            message: status.error_msg.unwrap_or_default(),
        }),
        _ => None,
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
