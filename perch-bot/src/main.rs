//! perch-bot — Showcase bot built with perch-client.
//!
//! Pretends to be a small device with one light: toggle it from an inline
//! keyboard, share your contact or location through a reply keyboard, or
//! just chat and get your text echoed back.
//!
//! # Setup
//! 1. `export PERCH_BOT_TOKEN=123456:ABC…` (from @BotFather)
//! 2. `cargo run -p perch-bot`

use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::Utc;
use env_logger::Env;
use perch_client::{
    CallbackQuery, Client, Config, ContactMessage, IncomingMessage, InlineKeyboard, InvocationError,
    LocationMessage, ReplyButton, ReplyKeyboard, TextMessage, User,
};

/// Pause between polls that returned nothing.
const IDLE: Duration = Duration::from_millis(250);

const HIDE_KEYBOARD: &str = "🙈 Hide keyboard";

const DEFAULT_LOG_FILTER: &str = "perch_client=info,perch_bot=info";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .format_timestamp_millis()
        .init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[perch] {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    println!("🔌 Connecting…");
    let mut client = Client::new(config)?;
    let me = client.get_me().await?;
    println!("✅ Logged in as {} (id={})", me.display_name(), me.id);
    println!("👂 Polling for updates… (Ctrl+C to quit)\n");

    let mut device = Device { light: false, started: Instant::now() };

    loop {
        let message = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n👋 Bye");
                break;
            }
            m = client.poll() => m,
        };
        if message.is_no_data() {
            tokio::time::sleep(IDLE).await;
            continue;
        }
        if let Err(e) = dispatch(&mut client, &me, &mut device, message).await {
            log::warn!("[perch] handler failed: {e}");
        }
    }

    Ok(())
}

/// State of the pretend device.
struct Device {
    light:   bool,
    started: Instant,
}

impl Device {
    fn status(&self) -> String {
        let up = self.started.elapsed().as_secs();
        format!(
            "💡 Light: {}\n⏱ Uptime: {}h {:02}m {:02}s",
            if self.light { "ON" } else { "OFF" },
            up / 3600, (up / 60) % 60, up % 60,
        )
    }
}

// ─── Central dispatcher ───────────────────────────────────────────────────────

async fn dispatch(
    client:  &mut Client,
    me:      &User,
    device:  &mut Device,
    message: IncomingMessage,
) -> Result<(), InvocationError> {
    // Ignore other bots, including our own echoes in groups
    if message.sender().is_some_and(|u| u.is_bot) {
        return Ok(());
    }
    match message {
        IncomingMessage::Text(msg)     => on_text(client, me, device, msg).await,
        IncomingMessage::Query(q)      => on_query(client, device, q).await,
        IncomingMessage::Location(msg) => on_location(client, msg).await,
        IncomingMessage::Contact(msg)  => on_contact(client, msg).await,
        IncomingMessage::NoData        => Ok(()),
    }
}

async fn on_text(client: &mut Client, me: &User, device: &mut Device, msg: TextMessage) -> Result<(), InvocationError> {
    let chat = msg.header.chat.id;
    let text = msg.text.trim();
    println!("💬 {}: {text}", msg.header.sender.display_name());

    if text == HIDE_KEYBOARD {
        return client.remove_reply_keyboard(chat, "Keyboard hidden.", false).await;
    }
    let Some((name, arg)) = parse_command(text, me.username.as_deref().unwrap_or("")) else {
        // Plain text: echo it back
        return client.send_message(chat, &msg.text, None).await;
    };

    match known_command(name).unwrap_or("") {
        "start"   => handle_start(client, chat, &msg.header.sender).await,
        "help"    => handle_help(client, chat).await,
        "light"   => handle_light(client, chat, device).await,
        "share"   => handle_share(client, chat).await,
        "hide"    => client.remove_reply_keyboard(chat, "Keyboard hidden.", false).await,
        "status"  => client.send_message(chat, &device.status(), None).await,
        "ping"    => handle_ping(client, chat).await,
        "time"    => handle_time(client, chat).await,
        "id"      => handle_id(client, chat, &msg).await,
        "echo"    => handle_transform(client, chat, arg, str::to_string).await,
        "upper"   => handle_transform(client, chat, arg, str::to_uppercase).await,
        "reverse" => handle_transform(client, chat, arg, |s| s.chars().rev().collect()).await,
        _ => client.send_message(chat, "❓ Unknown command. Use /help to see all commands.", None).await,
    }
}

async fn on_query(client: &mut Client, device: &mut Device, q: CallbackQuery) -> Result<(), InvocationError> {
    println!("🔘 {} pressed {}", q.sender.display_name(), q.data);
    match q.data.as_str() {
        "LIGHT_ON" => {
            device.light = true;
            q.answer(client, Some("💡 Light on")).await
        }
        "LIGHT_OFF" => {
            device.light = false;
            q.answer(client, Some("🌑 Light off")).await
        }
        "STATUS" => q.answer_alert(client, &device.status()).await,
        _ => q.answer(client, Some("🤷 Unknown action")).await,
    }
}

async fn on_location(client: &mut Client, msg: LocationMessage) -> Result<(), InvocationError> {
    let when = msg.header.date_time()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "(unknown time)".into());
    let text = format!(
        "📍 Location received\n\nLatitude: {:.6}\nLongitude: {:.6}\nSent: {when}",
        msg.location.latitude, msg.location.longitude,
    );
    client.send_message(msg.header.chat.id, &text, None).await
}

async fn on_contact(client: &mut Client, msg: ContactMessage) -> Result<(), InvocationError> {
    let c = &msg.contact;
    let name = match &c.last_name {
        Some(last) => format!("{} {last}", c.first_name),
        None       => c.first_name.clone(),
    };
    let mut text = format!("📇 Contact received\n\nName: {name}\nPhone: {}", c.phone_number);
    if let Some(id) = c.user_id {
        text.push_str(&format!("\nUser ID: {id}"));
    }
    client.send_message(msg.header.chat.id, &text, None).await
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

async fn handle_start(client: &mut Client, chat: i64, user: &User) -> Result<(), InvocationError> {
    let text = format!(
        "👋 Welcome, {}!\n\n\
        I'm a tiny device bot built with perch 🦀\n\
        Use the buttons below or send /help for all commands.",
        user.first_name,
    );
    client.send_with_keyboard(chat, &text, &light_keyboard()?).await
}

async fn handle_help(client: &mut Client, chat: i64) -> Result<(), InvocationError> {
    let text = "📖 Commands\n\n\
        /light — Light switch 💡\n\
        /status — Light and uptime\n\
        /share — Share contact or location\n\
        /hide — Hide the reply keyboard\n\
        /ping — Latency 🏓\n\
        /time — UTC date & time 🕐\n\
        /id — Your & chat IDs\n\
        /echo <text> — Echo text\n\
        /upper <text> — UPPERCASE\n\
        /reverse <text> — esreveR\n\n\
        Anything else is echoed back.";
    client.send_message(chat, text, None).await
}

async fn handle_light(client: &mut Client, chat: i64, device: &Device) -> Result<(), InvocationError> {
    let text = format!("💡 The light is {}.", if device.light { "on" } else { "off" });
    client.send_with_keyboard(chat, &text, &light_keyboard()?).await
}

async fn handle_share(client: &mut Client, chat: i64) -> Result<(), InvocationError> {
    let mut kb = ReplyKeyboard::new();
    kb.add_button("📇 Share contact", ReplyButton::RequestContact).map_err(keyboard_error)?
      .add_button("📍 Share location", ReplyButton::RequestLocation).map_err(keyboard_error)?;
    kb.add_row();
    kb.add_button(HIDE_KEYBOARD, ReplyButton::Text).map_err(keyboard_error)?;
    kb.enable_resize().enable_one_time();
    client.send_with_keyboard(chat, "What would you like to share?", &kb).await
}

async fn handle_ping(client: &mut Client, chat: i64) -> Result<(), InvocationError> {
    // One round trip: the send itself is what gets timed
    let start = Instant::now();
    client.send_message(chat, "🏓 …", None).await?;
    let ms = start.elapsed().as_millis();
    client.send_message(chat, &format!("🏓 Pong! {ms} ms"), None).await
}

async fn handle_time(client: &mut Client, chat: i64) -> Result<(), InvocationError> {
    let now  = Utc::now();
    let text = format!(
        "🕐 Time\n\nDate: {}\nTime: {} UTC\nUnix: {}",
        now.format("%A, %B %d %Y"),
        now.format("%H:%M:%S"),
        now.timestamp(),
    );
    client.send_message(chat, &text, None).await
}

async fn handle_id(client: &mut Client, chat: i64, msg: &TextMessage) -> Result<(), InvocationError> {
    let kind = match msg.header.chat.kind.as_str() {
        ""   => "unknown",
        kind => kind,
    };
    let text = format!("🪪 IDs\n\nUser: {}\nChat: {chat} ({kind})", msg.header.sender.id);
    client.send_message(chat, &text, None).await
}

async fn handle_transform<F: Fn(&str) -> String>(
    client: &mut Client, chat: i64, arg: &str, f: F,
) -> Result<(), InvocationError> {
    let text = if arg.is_empty() {
        "Usage: <command> <text>".to_string()
    } else {
        f(arg)
    };
    client.send_message(chat, &text, None).await
}

// ─── Keyboard helpers ─────────────────────────────────────────────────────────

fn light_keyboard() -> Result<InlineKeyboard, InvocationError> {
    let mut kb = InlineKeyboard::new();
    kb.add_callback_button("💡 On", "LIGHT_ON").map_err(keyboard_error)?
      .add_callback_button("🌑 Off", "LIGHT_OFF").map_err(keyboard_error)?;
    kb.add_row();
    kb.add_callback_button("📊 Status", "STATUS").map_err(keyboard_error)?;
    kb.add_row();
    kb.add_url_button("📚 Bot API docs", "https://core.telegram.org/bots/api").map_err(keyboard_error)?;
    Ok(kb)
}

fn keyboard_error(_: perch_client::KeyboardError) -> InvocationError {
    InvocationError::Validation("invalid keyboard button")
}

// ─── Utilities ────────────────────────────────────────────────────────────────

const COMMANDS: &[&str] = &[
    "start", "help", "light", "share", "hide", "status",
    "ping", "time", "id", "echo", "upper", "reverse",
];

/// `/name[@bot] args` → `(name, args)`. `None` for plain text.
///
/// A mention of another bot stays part of the name so it never matches.
fn parse_command<'a>(text: &'a str, bot_username: &str) -> Option<(&'a str, &'a str)> {
    let body = text.strip_prefix('/')?;
    let (head, arg) = match body.find(char::is_whitespace) {
        Some(at) => (&body[..at], body[at..].trim()),
        None     => (body, ""),
    };
    let name = match head.split_once('@') {
        Some((name, bot)) if bot.eq_ignore_ascii_case(bot_username) => name,
        _ => head,
    };
    Some((name, arg))
}

fn known_command(name: &str) -> Option<&'static str> {
    COMMANDS.iter().copied().find(|c| c.eq_ignore_ascii_case(name))
}
