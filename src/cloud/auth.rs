//! Login helpers: credential encryption, login form scraping and request
//! signing for the session-authenticated API host.

use crate::error::CloudError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::Deserialize;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RSA parameters handed out by the login service
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptConf {
    /// Base64 DER SubjectPublicKeyInfo
    #[serde(rename = "pubKey")]
    pub pub_key: String,
    /// Prefix prepended to every encrypted field
    pub pre: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EncryptConfResponse {
    pub result: i32,
    pub data: Option<EncryptConf>,
}

/// Hidden fields scraped from the unified login page
#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub captcha_token: String,
    pub lt: String,
    pub param_id: String,
    pub req_id: String,
}

impl LoginForm {
    /// Scrape the login form fields out of the login page HTML
    ///
    /// # Errors
    ///
    /// Returns `CloudError::InvalidResponse` naming the first field that
    /// could not be found.
    pub fn parse(html: &str) -> Result<Self, CloudError> {
        Ok(Self {
            captcha_token: capture(html, r"'captchaToken' value='(.+?)'", "captchaToken")?,
            lt: capture(html, r#"lt = "(.+?)""#, "lt")?,
            param_id: capture(html, r#"paramId = "(.+?)""#, "paramId")?,
            req_id: capture(html, r#"reqId = "(.+?)""#, "reqId")?,
        })
    }
}

fn capture(haystack: &str, pattern: &str, field: &str) -> Result<String, CloudError> {
    let re = Regex::new(pattern)
        .map_err(|e| CloudError::InvalidResponse(format!("bad pattern for {}: {}", field, e)))?;
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            CloudError::InvalidResponse(format!("login page is missing {}", field))
        })
}

/// Encrypt one credential field the way the login form expects it
///
/// The result is `pre` followed by the hex-encoded PKCS#1 v1.5 ciphertext.
pub fn encrypt_credential(conf: &EncryptConf, plain: &str) -> Result<String, CloudError> {
    let der = STANDARD
        .decode(conf.pub_key.trim())
        .map_err(|e| CloudError::Encryption(format!("public key is not base64: {}", e)))?;
    let key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CloudError::Encryption(format!("invalid public key: {}", e)))?;

    let mut rng = rand::thread_rng();
    let cipher = key
        .encrypt(&mut rng, Pkcs1v15Encrypt, plain.as_bytes())
        .map_err(|e| CloudError::Encryption(e.to_string()))?;

    Ok(format!("{}{}", conf.pre, hex::encode(cipher)))
}

/// Format a timestamp as an RFC 1123 `Date` header value
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Compute the upper-case hex HMAC-SHA1 request signature
pub fn sign_request(
    secret: &str,
    session_key: &str,
    method: &str,
    request_uri: &str,
    date: &str,
) -> Result<String, CloudError> {
    let payload = format!(
        "SessionKey={}&Operate={}&RequestURI={}&Date={}",
        session_key, method, request_uri, date
    );

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| CloudError::Encryption(e.to_string()))?;
    mac.update(payload.as_bytes());

    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}
