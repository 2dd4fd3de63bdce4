//! Update handlers: commands, keyboard buttons, the settings callback menu,
//! source-channel forwarding, member greeting, the promo post job and
//! broadcasts. All outbound calls on background paths go through [`api_log`]:
//! failures are logged and dropped, never retried or propagated.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::requests::{HasPayload, Payload, Request};
use teloxide::types::{
    Chat, ChatId, ChatMemberUpdated, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
    KeyboardMarkup, ParseMode, Recipient, User,
};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

use crate::scheduler::Scheduler;
use crate::state::{AppState, StatsSnapshot};

const BTN_POST_AD: &str = "🚀 Post Ad Now";
const BTN_HELP: &str = "ℹ️ Help";
const BTN_SETTINGS: &str = "⚙️ Settings";
const BTN_STATS: &str = "📊 Stats";

const CB_TOGGLE_SILENT: &str = "toggle_silent_post";
const CB_CLOSE_SETTINGS: &str = "close_settings";

const SETTINGS_TITLE: &str = "⚙️ <b>Bot Settings</b>";

/// Randomized pre-send pause when the anti-ban delay is on, in seconds.
const ANTI_BAN_DELAY_RANGE: (f64, f64) = (1.0, 5.0);
/// Courtesy pacing between broadcast sends.
const BROADCAST_PACING: Duration = Duration::from_millis(100);
/// Delay before the manually triggered ad post fires.
const MANUAL_POST_DELAY: Duration = Duration::from_secs(1);
/// How long a welcome message stays up before cleanup.
const WELCOME_DELETE_AFTER: Duration = Duration::from_secs(90);

const HELP_TEXT: &str = "✅ <b>Auto-send Ads:</b> posts a random ad to the channel on a schedule.\n\
✅ <b>Auto-Forward:</b> forwards new posts from source channels (with keyword filtering).\n\
✅ <b>Welcome Message:</b> greets new members who join the channel.\n\
✅ <b>Admin Controls:</b> use the keyboard for manual posts or /settings, /stats and /broadcast.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
    Help,
    Settings,
    Stats,
    Broadcast(String),
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(on_command),
                )
                .endpoint(on_message),
        )
        // Posts in channels arrive as channel_post updates, not messages.
        .branch(Update::filter_channel_post().endpoint(on_channel_post))
        .branch(Update::filter_callback_query().endpoint(on_callback))
        .branch(Update::filter_chat_member().endpoint(on_chat_member))
}

fn ctx_hint(ctx: &str) -> &'static str {
    match ctx {
        "delete_message" => "bot needs the Delete messages admin right in the channel",
        "forward_message" | "copy_message" | "send_message" => {
            "bot must be able to post in the destination channel"
        }
        "edit_message_text" => "bot can only edit its own messages",
        _ => "check the bot's rights in the chat",
    }
}

/// Sends a request, logging and swallowing any transport error. Background
/// operations have no synchronous caller to report to.
async fn api_log<R>(ctx: &str, req: R) -> Option<<R::Payload as Payload>::Output>
where
    R: Request + HasPayload,
{
    match req.send().await {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("API call failed ({ctx}): {e}; hint: {}", ctx_hint(ctx));
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and keyboard buttons
// ---------------------------------------------------------------------------

async fn on_command(bot: Bot, msg: Message, cmd: Command, state: Arc<AppState>) -> Result<()> {
    match cmd {
        Command::Start => handle_start(&bot, &msg, &state).await,
        Command::Help => handle_help(&bot, msg.chat.id).await,
        Command::Settings => {
            if sender_is_admin(&state, &msg) {
                handle_settings_menu(&bot, msg.chat.id, &state).await;
            }
        }
        Command::Stats => {
            if sender_is_admin(&state, &msg) {
                handle_stats(&bot, msg.chat.id, &state).await;
            }
        }
        Command::Broadcast(text) => {
            if sender_is_admin(&state, &msg) {
                handle_broadcast(&bot, msg.chat.id, &state, &text).await;
            }
        }
    }
    Ok(())
}

async fn on_channel_post(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    if state.config.is_source(msg.chat.id) {
        forward_from_source(&bot, &msg, &state).await;
    }
    Ok(())
}

async fn on_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    if state.config.is_source(msg.chat.id) {
        forward_from_source(&bot, &msg, &state).await;
        return Ok(());
    }

    // The platform's own "user joined" notice; best-effort cleanup, missing
    // rights are expected in some setups. Only part of the greeter, so a
    // missing welcome template disables it too.
    if msg.new_chat_members().is_some() && should_clean_join_notice(&state, &msg.chat) {
        let _ = api_log("delete_message", bot.delete_message(msg.chat.id, msg.id)).await;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    match text {
        BTN_HELP => handle_help(&bot, msg.chat.id).await,
        BTN_POST_AD if sender_is_admin(&state, &msg) => {
            let _ = api_log(
                "send_message",
                bot.send_message(msg.chat.id, "✅ Roger that! Sending a promotional ad now..."),
            )
            .await;
            let bot = bot.clone();
            let state = state.clone();
            scheduler.schedule_once(MANUAL_POST_DELAY, async move {
                post_promo(bot, state).await;
            });
        }
        BTN_SETTINGS if sender_is_admin(&state, &msg) => {
            handle_settings_menu(&bot, msg.chat.id, &state).await;
        }
        BTN_STATS if sender_is_admin(&state, &msg) => {
            handle_stats(&bot, msg.chat.id, &state).await;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_start(bot: &Bot, msg: &Message, state: &AppState) {
    let Some(user) = msg.from.as_ref() else {
        return;
    };

    if state.register_user(msg.chat.id) {
        info!(
            "new user started the bot, total users: {}",
            state.user_count()
        );
    }

    let mut rows = vec![vec![
        KeyboardButton::new(BTN_POST_AD),
        KeyboardButton::new(BTN_HELP),
    ]];
    if state.config.is_admin(user.id) {
        rows.push(vec![
            KeyboardButton::new(BTN_SETTINGS),
            KeyboardButton::new(BTN_STATS),
        ]);
    }
    let keyboard = KeyboardMarkup::new(rows).resize_keyboard();

    let _ = api_log(
        "send_message",
        bot.send_message(
            msg.chat.id,
            format!("Hi {}! I'm your promotion bot.", mention_html(user)),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard),
    )
    .await;
}

async fn handle_help(bot: &Bot, chat_id: ChatId) {
    let _ = api_log(
        "send_message",
        bot.send_message(chat_id, HELP_TEXT).parse_mode(ParseMode::Html),
    )
    .await;
}

fn sender_is_admin(state: &AppState, msg: &Message) -> bool {
    let is_admin = msg
        .from
        .as_ref()
        .is_some_and(|user| state.config.is_admin(user.id));
    if !is_admin {
        debug!("ignoring admin-only action in chat {}", msg.chat.id);
    }
    is_admin
}

// ---------------------------------------------------------------------------
// Settings menu
// ---------------------------------------------------------------------------

fn toggle_label(on: bool) -> &'static str {
    if on {
        "✅ ON"
    } else {
        "❌ OFF"
    }
}

fn settings_keyboard(silent_post: bool) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("Silent Posts: {}", toggle_label(silent_post)),
            CB_TOGGLE_SILENT,
        )],
        vec![InlineKeyboardButton::callback("Close", CB_CLOSE_SETTINGS)],
    ])
}

async fn handle_settings_menu(bot: &Bot, chat_id: ChatId, state: &AppState) {
    let _ = api_log(
        "send_message",
        bot.send_message(chat_id, SETTINGS_TITLE)
            .parse_mode(ParseMode::Html)
            .reply_markup(settings_keyboard(state.settings.silent_post())),
    )
    .await;
}

async fn on_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let Some(data) = q.data.clone() else {
        let _ = api_log("answer_callback_query", bot.answer_callback_query(q.id)).await;
        return Ok(());
    };

    if !state.config.is_admin(q.from.id) {
        let _ = api_log(
            "answer_callback_query",
            bot.answer_callback_query(q.id).text("Not authorized."),
        )
        .await;
        return Ok(());
    }

    match data.as_str() {
        CB_TOGGLE_SILENT => {
            let silent = state.settings.toggle_silent_post();
            info!("admin {} toggled silent posts to {silent}", q.from.id);
            let _ = api_log("answer_callback_query", bot.answer_callback_query(q.id)).await;
            if let Some(msg) = q.message {
                let _ = api_log(
                    "edit_message_text",
                    bot.edit_message_text(msg.chat().id, msg.id(), SETTINGS_TITLE)
                        .parse_mode(ParseMode::Html)
                        .reply_markup(settings_keyboard(silent)),
                )
                .await;
            }
        }
        CB_CLOSE_SETTINGS => {
            let _ = api_log("answer_callback_query", bot.answer_callback_query(q.id)).await;
            if let Some(msg) = q.message {
                let _ = api_log(
                    "edit_message_text",
                    bot.edit_message_text(msg.chat().id, msg.id(), "Settings menu closed."),
                )
                .await;
            }
        }
        _ => {
            let _ = api_log("answer_callback_query", bot.answer_callback_query(q.id)).await;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Promotional post job
// ---------------------------------------------------------------------------

/// The single consumer behind both the repeating schedule and the manual
/// trigger. Failures are logged and dropped; the counter moves only on a
/// successful send.
pub async fn post_promo(bot: Bot, state: Arc<AppState>) {
    let (delay, message) = {
        let mut rng = rand::thread_rng();
        let delay = state
            .settings
            .anti_ban_delay()
            .then(|| rng.gen_range(ANTI_BAN_DELAY_RANGE.0..ANTI_BAN_DELAY_RANGE.1));
        let message = state.config.promo_messages.choose(&mut rng).cloned();
        (delay, message)
    };

    let Some(message) = message else {
        debug!("promo message list is empty, skipping ad post");
        return;
    };

    if let Some(secs) = delay {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    let mut request = bot
        .send_message(state.config.channel.clone(), message)
        // Read at send time, not snapshotted at schedule-fire.
        .disable_notification(state.settings.silent_post());
    if let Some(keyboard) = promo_keyboard(&state) {
        request = request.reply_markup(keyboard);
    }

    if api_log("send_message", request).await.is_some() {
        state.stats.record_ad();
        info!("sent promotional ad to {:?}", state.config.channel);
    }
}

fn promo_keyboard(state: &AppState) -> Option<InlineKeyboardMarkup> {
    if state.config.promo_buttons.is_empty() {
        return None;
    }
    let rows: Vec<Vec<InlineKeyboardButton>> = state
        .config
        .promo_buttons
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|b| InlineKeyboardButton::url(b.label.clone(), b.url.clone()))
                .collect()
        })
        .collect();
    Some(InlineKeyboardMarkup::new(rows))
}

// ---------------------------------------------------------------------------
// Content forwarder
// ---------------------------------------------------------------------------

async fn forward_from_source(bot: &Bot, msg: &Message, state: &AppState) {
    // Commands are never forwarded.
    if msg.text().is_some_and(|t| t.starts_with('/')) {
        return;
    }

    let text = msg.text();
    let caption = msg.caption();

    if let Some(keyword) = blacklist_hit(&state.config.blacklist, text, caption) {
        info!(
            "blocked message {} from {} (blacklisted keyword '{keyword}')",
            msg.id.0, msg.chat.id
        );
        return;
    }

    let channel = state.config.channel.clone();
    let delivered = match (&state.settings.forward_footer, text) {
        (None, _) => {
            // Native forward keeps the original-sender attribution.
            api_log(
                "forward_message",
                bot.forward_message(channel, msg.chat.id, msg.id),
            )
            .await
            .is_some()
        }
        (Some(footer), Some(text)) => api_log(
            "send_message",
            bot.send_message(channel, append_footer(text, footer))
                .parse_mode(ParseMode::Html),
        )
        .await
        .is_some(),
        (Some(footer), None) => api_log(
            "copy_message",
            bot.copy_message(channel, msg.chat.id, msg.id)
                .caption(append_footer(caption.unwrap_or(""), footer))
                .parse_mode(ParseMode::Html),
        )
        .await
        .is_some(),
    };

    if delivered {
        state.stats.record_forward();
        info!("relayed message {} from {}", msg.id.0, msg.chat.id);
    }
}

/// Returns the first blacklisted keyword found in the lowercased
/// concatenation of text and caption.
fn blacklist_hit<'a>(
    blacklist: &'a [String],
    text: Option<&str>,
    caption: Option<&str>,
) -> Option<&'a str> {
    if blacklist.is_empty() {
        return None;
    }
    let content = format!(
        "{}{}",
        text.unwrap_or_default(),
        caption.unwrap_or_default()
    )
    .to_lowercase();
    blacklist
        .iter()
        .find(|keyword| content.contains(keyword.as_str()))
        .map(String::as_str)
}

fn append_footer(body: &str, footer: &str) -> String {
    format!("{body}\n\n{footer}")
}

// ---------------------------------------------------------------------------
// Membership greeter
// ---------------------------------------------------------------------------

async fn on_chat_member(
    bot: Bot,
    upd: ChatMemberUpdated,
    state: Arc<AppState>,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    if !is_destination(&state, &upd.chat) {
        return Ok(());
    }
    let joined = !upd.old_chat_member.kind.is_present() && upd.new_chat_member.kind.is_present();
    if !joined {
        return Ok(());
    }

    let Some(template) = state.settings.welcome_message.as_deref() else {
        return Ok(());
    };

    let text = render_welcome(
        template,
        &mention_html(&upd.new_chat_member.user),
        upd.chat.title().unwrap_or_default(),
    );

    let Some(sent) = api_log(
        "send_message",
        bot.send_message(state.config.channel.clone(), text).parse_mode(ParseMode::Html),
    )
    .await
    else {
        return Ok(());
    };

    state.stats.record_welcome();

    // Transient greeting: clean it up after a while.
    let chat_id = sent.chat.id;
    let message_id = sent.id;
    scheduler.schedule_once(WELCOME_DELETE_AFTER, async move {
        let _ = api_log("delete_message", bot.delete_message(chat_id, message_id)).await;
    });

    Ok(())
}

fn render_welcome(template: &str, username: &str, chat_title: &str) -> String {
    template
        .replace("{username}", username)
        .replace("{chat_title}", chat_title)
}

fn mention_html(user: &User) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user.id,
        html::escape(&user.full_name())
    )
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

async fn handle_stats(bot: &Bot, chat_id: ChatId, state: &AppState) {
    let report = stats_report(state.stats.snapshot(), state.user_count());
    let _ = api_log(
        "send_message",
        bot.send_message(chat_id, report).parse_mode(ParseMode::Html),
    )
    .await;
}

fn stats_report(snap: StatsSnapshot, user_count: usize) -> String {
    format!(
        "📊 <b>Bot Statistics</b>\n\n\
         🕒 <b>Uptime:</b> {}\n\
         🚀 <b>Promotional Ads Sent:</b> {}\n\
         ➡️ <b>Messages Forwarded:</b> {}\n\
         👋 <b>New Members Greeted:</b> {}\n\
         👥 <b>Unique Users (for broadcast):</b> {user_count}",
        format_uptime(snap.uptime),
        snap.ads_sent,
        snap.forwards_done,
        snap.welcomes_sent,
    )
}

fn format_uptime(uptime: chrono::Duration) -> String {
    let total = uptime.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}:{seconds:02}")
    }
}

// ---------------------------------------------------------------------------
// Broadcast
// ---------------------------------------------------------------------------

async fn handle_broadcast(bot: &Bot, admin_chat: ChatId, state: &AppState, raw: &str) {
    let Some(text) = broadcast_text(raw) else {
        let _ = api_log(
            "send_message",
            bot.send_message(
                admin_chat,
                "⚠️ Please provide a message to broadcast.\nUsage: /broadcast Your message here",
            ),
        )
        .await;
        return;
    };

    let recipients = state.broadcast_recipients();
    let _ = api_log(
        "send_message",
        bot.send_message(
            admin_chat,
            format!(
                "📢 Starting broadcast to {} users... Please wait.",
                recipients.len()
            ),
        ),
    )
    .await;

    let mut success = 0u32;
    let mut failed = 0u32;
    for chat_id in recipients {
        match bot.send_message(chat_id, text).await {
            Ok(_) => success += 1,
            Err(e) if is_blocked_error(&e) => {
                warn!("broadcast to {chat_id} failed: user blocked the bot");
                failed += 1;
            }
            Err(e) => {
                warn!("broadcast to {chat_id} failed: {e}");
                failed += 1;
            }
        }
        tokio::time::sleep(BROADCAST_PACING).await;
    }

    let _ = api_log(
        "send_message",
        bot.send_message(
            admin_chat,
            format!(
                "✅ <b>Broadcast Complete!</b>\n\n\
                 Sent successfully to: <b>{success}</b> users.\n\
                 Failed to send to: <b>{failed}</b> users (they may have blocked the bot).",
            ),
        )
        .parse_mode(ParseMode::Html),
    )
    .await;
}

/// Trims the broadcast payload; `None` means the usage error is due.
fn broadcast_text(raw: &str) -> Option<&str> {
    let text = raw.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn is_blocked_error(e: &RequestError) -> bool {
    matches!(e, RequestError::Api(ApiError::BotBlocked))
}

// ---------------------------------------------------------------------------

fn is_destination(state: &AppState, chat: &Chat) -> bool {
    match &state.config.channel {
        Recipient::Id(id) => chat.id == *id,
        Recipient::ChannelUsername(name) => chat
            .username()
            .is_some_and(|u| name.strip_prefix('@') == Some(u)),
    }
}

fn should_clean_join_notice(state: &AppState, chat: &Chat) -> bool {
    state.settings.welcome_message.is_some() && is_destination(state, chat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashSet;
    use teloxide::types::UserId;

    fn state_with(blacklist: &[&str], footer: Option<&str>, welcome: Option<&str>) -> AppState {
        AppState::new(Config {
            token: "t".into(),
            channel: Recipient::Id(ChatId(-100)),
            source_channels: vec![ChatId(-200)],
            admins: HashSet::from([UserId(1)]),
            promo_messages: vec!["ad".into()],
            promo_buttons: vec![],
            forward_footer: footer.map(str::to_string),
            welcome_message: welcome.map(str::to_string),
            blacklist: blacklist.iter().map(|k| k.to_lowercase()).collect(),
            ad_interval: Duration::from_secs(3600),
            ad_first_delay: Duration::from_secs(10),
        })
    }

    fn chat_from_json(json: &str) -> Chat {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn blacklist_matches_case_insensitive_substring() {
        let words = vec!["spam".to_string(), "casino".to_string()];
        assert_eq!(
            blacklist_hit(&words, Some("Buy SPAM today"), None),
            Some("spam")
        );
        assert_eq!(
            blacklist_hit(&words, None, Some("best CaSiNo in town")),
            Some("casino")
        );
        assert_eq!(blacklist_hit(&words, Some("harmless news"), None), None);
    }

    #[test]
    fn blacklist_checks_both_text_and_caption() {
        let words = vec!["crypto".to_string()];
        assert_eq!(
            blacklist_hit(&words, Some("clean"), Some("hot CRYPTO deal")),
            Some("crypto")
        );
        assert_eq!(blacklist_hit(&words, None, None), None);
    }

    #[test]
    fn empty_blacklist_never_matches() {
        assert_eq!(blacklist_hit(&[], Some("anything"), Some("at all")), None);
    }

    #[test]
    fn footer_joins_with_exactly_two_newlines() {
        assert_eq!(append_footer("hello", "Visit us"), "hello\n\nVisit us");
        // An absent caption still gets the separator, matching the relay
        // behavior for media without caption.
        assert_eq!(append_footer("", "Visit us"), "\n\nVisit us");
        assert_eq!(append_footer("  spaced  ", "f"), "  spaced  \n\nf");
    }

    #[test]
    fn welcome_substitutes_both_placeholders() {
        let rendered = render_welcome(
            "Welcome {username} to {chat_title}!",
            "<a href=\"tg://user?id=7\">Ada</a>",
            "News Channel",
        );
        assert_eq!(
            rendered,
            "Welcome <a href=\"tg://user?id=7\">Ada</a> to News Channel!"
        );
    }

    #[test]
    fn welcome_without_placeholders_passes_through() {
        assert_eq!(render_welcome("Hi there", "x", "y"), "Hi there");
    }

    #[test]
    fn broadcast_text_rejects_empty_and_whitespace() {
        assert_eq!(broadcast_text(""), None);
        assert_eq!(broadcast_text("   \t\n"), None);
        assert_eq!(broadcast_text("  hello world "), Some("hello world"));
    }

    #[test]
    fn blocked_error_is_classified() {
        assert!(is_blocked_error(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_blocked_error(&RequestError::Api(
            ApiError::MessageNotModified
        )));
    }

    #[test]
    fn uptime_formats_like_a_clock() {
        assert_eq!(format_uptime(chrono::Duration::seconds(0)), "0:00:00");
        assert_eq!(format_uptime(chrono::Duration::seconds(3675)), "1:01:15");
        assert_eq!(
            format_uptime(chrono::Duration::seconds(90_061)),
            "1d 01:01:01"
        );
    }

    #[test]
    fn stats_report_includes_all_counters() {
        let snap = StatsSnapshot {
            ads_sent: 3,
            forwards_done: 5,
            welcomes_sent: 2,
            uptime: chrono::Duration::seconds(61),
        };
        let report = stats_report(snap, 9);
        assert!(report.contains("0:01:01"));
        assert!(report.contains("Ads Sent:</b> 3"));
        assert!(report.contains("Forwarded:</b> 5"));
        assert!(report.contains("Greeted:</b> 2"));
        assert!(report.contains("broadcast):</b> 9"));
    }

    #[test]
    fn settings_keyboard_reflects_flag() {
        let on = settings_keyboard(true);
        let off = settings_keyboard(false);
        assert!(on.inline_keyboard[0][0].text.contains("✅ ON"));
        assert!(off.inline_keyboard[0][0].text.contains("❌ OFF"));
        assert_eq!(on.inline_keyboard[1][0].text, "Close");
    }

    #[test]
    fn source_channels_are_recognized() {
        let state = state_with(&[], None, None);
        assert!(state.config.is_source(ChatId(-200)));
        assert!(!state.config.is_source(ChatId(-100)));
    }

    #[test]
    fn promo_keyboard_absent_without_buttons() {
        let state = state_with(&[], None, None);
        assert!(promo_keyboard(&state).is_none());
    }

    #[test]
    fn blacklist_does_not_bridge_text_and_caption() {
        let words = vec!["a b".to_string()];
        // "alpha a" + "b beta" must not produce a phantom "a b" across the seam.
        assert_eq!(blacklist_hit(&words, Some("alpha a"), Some("b beta")), None);
        assert_eq!(
            blacklist_hit(&words, Some("has a b inside"), None),
            Some("a b")
        );
    }

    #[test]
    fn join_notice_cleanup_needs_a_welcome_template() {
        let dest = chat_from_json(r#"{"id":-100,"type":"channel","title":"dest"}"#);
        let other = chat_from_json(r#"{"id":-300,"type":"channel","title":"elsewhere"}"#);
        let with_welcome = state_with(&[], None, Some("Welcome {username}!"));
        let without = state_with(&[], None, None);
        assert!(should_clean_join_notice(&with_welcome, &dest));
        assert!(!should_clean_join_notice(&without, &dest));
        assert!(!should_clean_join_notice(&with_welcome, &other));
    }

    #[tokio::test]
    async fn channel_posts_route_to_the_relay() {
        let state = Arc::new(state_with(&["spam"], None, None));
        let scheduler = Arc::new(Scheduler::new());
        let bot = Bot::new("123456:TESTTOKEN");
        let update: Update = serde_json::from_str(
            r#"{"update_id":1,"channel_post":{"message_id":7,"date":1700000000,
                "chat":{"id":-200,"type":"channel","title":"source"},
                "text":"totally spam offer"}}"#,
        )
        .unwrap();

        let result = schema()
            .dispatch(dptree::deps![bot, state.clone(), scheduler, update])
            .await;

        // The post must be handled, and the blacklisted keyword drops it
        // before any outbound call is attempted.
        assert!(matches!(result, std::ops::ControlFlow::Break(Ok(()))));
        assert_eq!(state.stats.snapshot().forwards_done, 0);
    }
}
