//! Account list parsing and username masking

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials for one storage account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username safe to print in logs and reports
    pub fn masked(&self) -> String {
        mask_username(&self.username)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.masked())
            .field("password", &"***")
            .finish()
    }
}

/// Mask characters 3..7 of a username with `*`
///
/// Indices count characters, not bytes, so multi-byte names are masked
/// without splitting a character. Names shorter than seven characters are
/// masked as far as they reach.
pub fn mask_username(name: &str) -> String {
    name.chars()
        .enumerate()
        .map(|(i, c)| if (3..7).contains(&i) { '*' } else { c })
        .collect()
}

/// Parse an account list of `username:password` entries
///
/// Entries are separated by newlines, `;` or `,`. Each entry is split on
/// its first `:` so passwords may themselves contain colons. Blank entries
/// are ignored.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for an entry without a `:` or with an
/// empty username or password.
pub fn parse_accounts(list: &str) -> Result<Vec<Account>, ConfigError> {
    let mut accounts = Vec::new();

    for (index, entry) in list
        .split(['\n', ';', ','])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
    {
        let (username, password) = entry.split_once(':').ok_or_else(|| {
            ConfigError::ParseError(format!(
                "account entry {} is not in username:password form",
                index + 1
            ))
        })?;

        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ConfigError::ParseError(format!(
                "account entry {} has an empty username or password",
                index + 1
            )));
        }

        accounts.push(Account::new(username, password));
    }

    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_phone_number() {
        assert_eq!(mask_username("13812345678"), "138****5678");
    }

    #[test]
    fn test_mask_short_names() {
        assert_eq!(mask_username("ab"), "ab");
        assert_eq!(mask_username("abcde"), "abc**");
        assert_eq!(mask_username(""), "");
    }

    #[test]
    fn test_mask_multibyte_name() {
        assert_eq!(mask_username("用户名称测试账号"), "用户名****号");
        assert_eq!(mask_username("用户名称测试账号啊"), "用户名****账号啊");
    }

    #[test]
    fn test_debug_hides_password() {
        let account = Account::new("13812345678", "hunter2");
        let debug = format!("{:?}", account);
        assert!(debug.contains("138****5678"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_accounts_with_mixed_separators() {
        let accounts =
            parse_accounts("13800000001:pass1;13800000002:pass2\n13800000003:pass3").unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[1].username, "13800000002");
        assert_eq!(accounts[2].password, "pass3");
    }

    #[test]
    fn test_parse_accounts_password_with_colon() {
        let accounts = parse_accounts("user:pa:ss").unwrap();
        assert_eq!(accounts, vec![Account::new("user", "pa:ss")]);
    }

    #[test]
    fn test_parse_accounts_skips_blank_entries() {
        let accounts = parse_accounts("\n user:pass ;;\n").unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(parse_accounts("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_accounts_rejects_malformed_entries() {
        assert!(matches!(
            parse_accounts("justaname"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(parse_accounts(":pass").is_err());
        assert!(parse_accounts("user:").is_err());
    }
}
