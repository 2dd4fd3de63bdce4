//! Environment-backed configuration. Required keys abort startup with a
//! descriptive error; optional keys fall back to defaults.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use teloxide::types::{ChatId, Recipient, UserId};
use url::Url;

const DEFAULT_AD_INTERVAL_SECS: u64 = 3600;
const DEFAULT_AD_FIRST_DELAY_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    /// Destination channel: numeric id or `@username`.
    pub channel: Recipient,
    pub source_channels: Vec<ChatId>,
    pub admins: HashSet<UserId>,
    pub promo_messages: Vec<String>,
    pub promo_buttons: Vec<PromoButton>,
    pub forward_footer: Option<String>,
    pub welcome_message: Option<String>,
    /// Lowercased keywords; a match anywhere in text or caption drops a forward.
    pub blacklist: Vec<String>,
    pub ad_interval: Duration,
    pub ad_first_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct PromoButton {
    pub label: String,
    pub url: Url,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env_required("BOT_TOKEN")?;

        let channel = parse_channel(&env_required("CHANNEL_ID")?)?;

        let source_channels: Vec<ChatId> = parse_i64_list(&env_required("SOURCE_CHANNEL_ID")?)
            .context("SOURCE_CHANNEL_ID")?
            .into_iter()
            .map(ChatId)
            .collect();
        if source_channels.is_empty() {
            return Err(anyhow!("SOURCE_CHANNEL_ID must list at least one chat id"));
        }

        let admins: HashSet<UserId> = parse_i64_list(&env_required("ADMIN_ID")?)
            .context("ADMIN_ID")?
            .into_iter()
            .map(|id| {
                u64::try_from(id)
                    .map(UserId)
                    .map_err(|_| anyhow!("ADMIN_ID entries must be positive user ids, got {id}"))
            })
            .collect::<Result<_>>()?;
        if admins.is_empty() {
            return Err(anyhow!("ADMIN_ID must list at least one user id"));
        }

        let promo_messages = env_optional("PROMO_MESSAGES")
            .map(|raw| parse_promo_messages(&raw))
            .unwrap_or_default();

        let promo_buttons = match env_optional("PROMO_BUTTONS") {
            Some(raw) => parse_promo_buttons(&raw)?,
            None => Vec::new(),
        };

        let blacklist = env_optional("BLACKLIST_KEYWORDS")
            .map(|raw| parse_blacklist(&raw))
            .unwrap_or_default();

        let ad_interval =
            Duration::from_secs(env_secs("AD_INTERVAL_SECS", DEFAULT_AD_INTERVAL_SECS)?);
        let ad_first_delay =
            Duration::from_secs(env_secs("AD_FIRST_DELAY_SECS", DEFAULT_AD_FIRST_DELAY_SECS)?);

        Ok(Self {
            token,
            channel,
            source_channels,
            admins,
            promo_messages,
            promo_buttons,
            forward_footer: env_optional("FORWARD_FOOTER"),
            welcome_message: env_optional("WELCOME_MESSAGE"),
            blacklist,
            ad_interval,
            ad_first_delay,
        })
    }

    pub fn is_admin(&self, uid: UserId) -> bool {
        self.admins.contains(&uid)
    }

    pub fn is_source(&self, chat_id: ChatId) -> bool {
        self.source_channels.contains(&chat_id)
    }
}

fn env_required(key: &str) -> Result<String> {
    env_optional(key).ok_or_else(|| anyhow!("{key} is missing or empty"))
}

fn env_optional(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn env_secs(key: &str, default: u64) -> Result<u64> {
    match env_optional(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number of seconds, got '{raw}'")),
        None => Ok(default),
    }
}

pub(crate) fn parse_channel(raw: &str) -> Result<Recipient> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if raw.starts_with('@') && raw.len() > 1 {
        return Ok(Recipient::ChannelUsername(raw.to_string()));
    }
    Err(anyhow!(
        "CHANNEL_ID must be a numeric chat id or @username, got '{raw}'"
    ))
}

pub(crate) fn parse_i64_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| anyhow!("'{part}' is not a valid id"))
        })
        .collect()
}

pub(crate) fn parse_promo_messages(raw: &str) -> Vec<String> {
    raw.split("||")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn parse_promo_buttons(raw: &str) -> Result<Vec<PromoButton>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (label, link) = part
                .split_once('|')
                .ok_or_else(|| anyhow!("PROMO_BUTTONS entry '{part}' is not 'label|url'"))?;
            let url = Url::parse(link.trim())
                .with_context(|| format!("PROMO_BUTTONS entry '{part}' has an invalid url"))?;
            Ok(PromoButton {
                label: label.trim().to_string(),
                url,
            })
        })
        .collect()
}

pub(crate) fn parse_blacklist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_accepts_numeric_id() {
        match parse_channel("-1001234567890").unwrap() {
            Recipient::Id(id) => assert_eq!(id, ChatId(-1001234567890)),
            other => panic!("unexpected recipient: {other:?}"),
        }
    }

    #[test]
    fn channel_accepts_username() {
        match parse_channel("@my_channel").unwrap() {
            Recipient::ChannelUsername(name) => assert_eq!(name, "@my_channel"),
            other => panic!("unexpected recipient: {other:?}"),
        }
    }

    #[test]
    fn channel_rejects_garbage() {
        assert!(parse_channel("not-a-channel").is_err());
        assert!(parse_channel("@").is_err());
        assert!(parse_channel("").is_err());
    }

    #[test]
    fn id_list_parses_and_trims() {
        let ids = parse_i64_list(" -100200 , 42 ,,").unwrap();
        assert_eq!(ids, vec![-100200, 42]);
    }

    #[test]
    fn id_list_rejects_non_numeric() {
        assert!(parse_i64_list("12,abc").is_err());
    }

    #[test]
    fn promo_messages_split_on_double_pipe() {
        let msgs = parse_promo_messages("first ad || second ad ||");
        assert_eq!(msgs, vec!["first ad", "second ad"]);
    }

    #[test]
    fn promo_buttons_parse_label_and_url() {
        let buttons = parse_promo_buttons("Channel|https://t.me/example, Site|https://example.com")
            .unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].label, "Channel");
        assert_eq!(buttons[0].url.as_str(), "https://t.me/example");
        assert_eq!(buttons[1].label, "Site");
    }

    #[test]
    fn promo_buttons_reject_bad_url() {
        assert!(parse_promo_buttons("Channel|not a url").is_err());
        assert!(parse_promo_buttons("just-a-label").is_err());
    }

    #[test]
    fn blacklist_is_lowercased() {
        let words = parse_blacklist("Spam, CRYPTO ,, ");
        assert_eq!(words, vec!["spam", "crypto"]);
    }
}
