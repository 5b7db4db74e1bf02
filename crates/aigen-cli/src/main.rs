use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::thread;

use aigen_contracts::chat::{parse_intent, Intent, PlaceholderTicker, CHAT_HELP_COMMANDS};
use aigen_contracts::events::EventWriter;
use aigen_contracts::store::{ChatState, ViewState};
use aigen_contracts::threads::Thread;
use aigen_engine::config::EngineConfig;
use aigen_engine::{ChatEngine, GALLERY_CLICK_DEBOUNCE};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "aigen-rs", version, about = "AIGen ad chat client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat over the sheet-backed threads.
    Chat(ChatArgs),
    /// Print the threads built from the sheet.
    Threads(ThreadsArgs),
    /// Submit one message and show the thread it produced.
    Send(SendArgs),
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    #[arg(long, default_value = ".aigen/events.jsonl")]
    events: PathBuf,
    #[arg(long)]
    sheet_url: Option<String>,
    #[arg(long)]
    status_url: Option<String>,
    #[arg(long)]
    webhook_url: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Debug, Parser)]
struct ThreadsArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct SendArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long, default_value = "")]
    text: String,
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// Attach raw image bytes read from stdin.
    #[arg(long)]
    paste: bool,
}

const READ_ONLY_NOTICE: &str = "This conversation is read-only. Use /new to start a new chat.";

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("aigen-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Threads(args) => run_threads(args),
        Command::Send(args) => run_send(args),
    }
}

fn open_engine(connection: &ConnectionArgs) -> Result<ChatEngine> {
    let mut config = EngineConfig::from_env()?;
    if let Some(url) = connection.sheet_url.clone() {
        config.sheet_csv_url = url;
    }
    if let Some(url) = connection.status_url.clone() {
        config.status_api_url = url;
    }
    if let Some(url) = connection.webhook_url.clone() {
        config.webhook_url = url;
    }
    let events = EventWriter::new(&connection.events, Uuid::new_v4().to_string());
    ChatEngine::with_http(config, events)
}

fn run_threads(args: ThreadsArgs) -> Result<i32> {
    let mut engine = open_engine(&args.connection)?;
    engine.refresh();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&engine.state().threads)?);
    } else {
        print_thread_list(engine.state());
    }
    Ok(0)
}

fn run_send(args: SendArgs) -> Result<i32> {
    let mut engine = open_engine(&args.connection)?;
    engine.refresh();
    for path in &args.images {
        engine.attach_image_path(path)?;
    }
    if args.paste {
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .context("failed reading pasted image from stdin")?;
        engine.attach_image_bytes(&bytes)?;
    }
    engine.set_input(args.text);
    if !engine.state().has_pending_input() {
        bail!("nothing to send: pass --text, --image or --paste");
    }
    if !engine.send() {
        bail!("send refused: the selected thread does not accept messages");
    }

    let alerts = engine.take_alerts();
    if !alerts.is_empty() {
        for alert in alerts {
            eprintln!("{alert}");
        }
        return Ok(1);
    }
    if let Some(thread) = engine.state().current_thread() {
        print_thread(engine.state(), thread);
    }
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut engine = open_engine(&args.connection)?;
    let stdin = io::stdin();
    let mut line = String::new();
    let mut placeholder = PlaceholderTicker::new();

    println!("Loading conversations...");
    engine.refresh();
    println!(
        "AIGen chat started. {} conversation(s) loaded. Type /help for commands.",
        engine.state().conversations.len()
    );
    render(engine.state());

    loop {
        let state = engine.state();
        if state.input.is_empty() {
            if state.view() == ViewState::EmptyNewChat && state.pending_images.is_empty() {
                if let Some(hint) = placeholder.next_hint(state.is_generating) {
                    println!("  e.g. \"{hint}\"");
                }
            }
            print!("{}> ", prompt_label(state));
        } else {
            print!("... ");
        }
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }
        let input = line.trim_end_matches(['\n', '\r']);

        // A trailing backslash is shift+enter: keep composing on a new line.
        if let Some(head) = input.strip_suffix('\\') {
            let draft = format!("{}{head}", engine.state().input);
            engine.set_input(draft);
            engine.press_enter(true);
            continue;
        }
        if !engine.state().input.is_empty() {
            let draft = format!("{}{input}", engine.state().input);
            submit(&mut engine, draft);
            print_alerts(&mut engine);
            continue;
        }

        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => {
                if !engine.state().pending_images.is_empty() {
                    submit(&mut engine, String::new());
                }
            }
            "quit" => break,
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "new_chat" => {
                engine.new_chat();
                render(engine.state());
            }
            "list_threads" => print_thread_list(engine.state()),
            "select_thread" => select_thread(&mut engine, &intent),
            "attach_images" => {
                for path in string_list(intent.command_args.get("paths")) {
                    let path = PathBuf::from(path);
                    if let Err(err) = engine.attach_image_path(&path) {
                        println!("Attach failed ({}): {err:#}", path.display());
                    }
                }
                println!(
                    "{} image(s) attached.",
                    engine.state().pending_images.len()
                );
            }
            "paste_image" => match intent.command_args.get("path").and_then(Value::as_str) {
                Some(path) => {
                    let pasted = fs::read(path)
                        .with_context(|| format!("failed reading {path}"))
                        .and_then(|bytes| engine.attach_image_bytes(&bytes));
                    match pasted {
                        Ok(()) => println!(
                            "{} image(s) attached.",
                            engine.state().pending_images.len()
                        ),
                        Err(err) => println!("Paste failed: {err:#}"),
                    }
                }
                None => println!("/paste requires a file path"),
            },
            "remove_image" => match index_arg(&intent) {
                Some(index) => {
                    engine.remove_image(index);
                    println!(
                        "{} image(s) attached.",
                        engine.state().pending_images.len()
                    );
                }
                None => println!("/detach requires an attachment number"),
            },
            "view_image" => match index_arg(&intent) {
                Some(index) => view_image(&mut engine, index),
                None => println!("/view requires an image number"),
            },
            "close_image" => {
                engine.close_image();
                render(engine.state());
            }
            "retry_image" => match index_arg(&intent) {
                Some(index) => {
                    engine.retry_image(index);
                    if engine.state().selected_image_index == Some(index) {
                        engine.probe_expanded_image();
                    }
                    render(engine.state());
                }
                None => println!("/retry requires an image number"),
            },
            "show_shots" => print_shots(engine.state()),
            "refresh" => {
                println!("Loading conversations...");
                engine.refresh();
                render(engine.state());
            }
            "unknown" => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                println!("Unknown command: /{command}. Type /help for commands.");
            }
            "send" => {
                let text = intent.text.unwrap_or_default();
                submit(&mut engine, text);
            }
            other => println!("Unhandled action: {other}"),
        }
        print_alerts(&mut engine);
    }
    Ok(())
}

fn submit(engine: &mut ChatEngine, text: String) {
    engine.set_input(text);
    let state = engine.state();
    if !state.can_send() {
        if state.current_thread().map(|thread| thread.is_frozen) == Some(true) {
            println!("{READ_ONLY_NOTICE}");
        } else if state.is_generating {
            println!("Still generating the previous ad.");
        }
        engine.set_input(String::new());
        return;
    }
    println!("Generating...");
    engine.press_enter(false);
    render(engine.state());
}

fn select_thread(engine: &mut ChatEngine, intent: &Intent) {
    let target = intent
        .command_args
        .get("target")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let thread_id = index_arg(intent)
        .and_then(|index| engine.state().threads.get(index))
        .map(|thread| thread.id.clone())
        .unwrap_or(target);
    if thread_id.is_empty() {
        println!("/open requires a thread number or id");
        return;
    }
    if engine.select_thread(&thread_id) {
        render(engine.state());
    } else {
        println!("No thread {thread_id}");
    }
}

fn view_image(engine: &mut ChatEngine, index: usize) {
    engine.click_gallery(index);
    thread::sleep(GALLERY_CLICK_DEBOUNCE);
    engine.tick();
    if engine.state().view() != (ViewState::ImageExpanded { index }) {
        println!("No image {}", index + 1);
        return;
    }
    engine.probe_expanded_image();
    render(engine.state());
}

fn render(state: &ChatState) {
    match state.view() {
        ViewState::Loading => println!("Loading conversations..."),
        ViewState::EmptyNewChat => {
            println!("-- New Chat --");
            if !state.pending_images.is_empty() {
                println!("{} image(s) attached.", state.pending_images.len());
            }
        }
        ViewState::ViewingThread { .. } => {
            if let Some(thread) = state.current_thread() {
                print_thread(state, thread);
            }
        }
        ViewState::ImageExpanded { index } => {
            let thread_id = state.selected_thread_id.as_str();
            if state.image_load_failed(thread_id, index) {
                println!(
                    "[image {}] failed to load. /retry {} to try again, /close to go back.",
                    index + 1,
                    index + 1
                );
            } else if let Some((_, url)) = state.expanded_image() {
                println!("[image {}] {url}", index + 1);
                println!("/close to go back.");
            }
        }
    }
}

fn print_thread(state: &ChatState, thread: &Thread) {
    let marker = if thread.is_frozen { " (read-only)" } else { "" };
    println!("-- {}{marker} --", thread.title);
    for message in &thread.messages {
        let who = if message.is_user { "you" } else { "aigen" };
        println!("{who}: {}", message.text);
        if !message.uploaded_images.is_empty() {
            println!("     [{} image(s)]", message.uploaded_images.len());
        }
    }
    if !thread.gallery_images.is_empty() {
        println!("Gallery:");
        for (idx, url) in thread.gallery_images.iter().enumerate() {
            if state.image_load_failed(&thread.id, idx) {
                println!("  {:>2}. (failed to load)", idx + 1);
            } else {
                println!("  {:>2}. {url}", idx + 1);
            }
        }
    }
    if thread.is_frozen {
        println!("{READ_ONLY_NOTICE}");
    }
}

fn print_thread_list(state: &ChatState) {
    for (idx, thread) in state.threads.iter().enumerate() {
        let selected = if thread.id == state.selected_thread_id {
            "*"
        } else {
            " "
        };
        println!(
            "{selected}{:>3}. {} [{}] {} image(s)",
            idx + 1,
            thread.title,
            thread.id,
            thread.gallery_images.len()
        );
    }
}

fn print_shots(state: &ChatState) {
    let Some(thread) = state.current_thread() else {
        return;
    };
    if thread.shots.is_empty() {
        println!("No shot list for this thread.");
        return;
    }
    for shot in &thread.shots {
        let name = shot.shot_name.as_deref().unwrap_or("");
        println!("Shot {}: {name}", shot.shot_number);
        if !shot.description.is_empty() {
            println!("    {}", shot.description);
        }
    }
}

fn print_alerts(engine: &mut ChatEngine) {
    for alert in engine.take_alerts() {
        println!("! {alert}");
    }
}

fn prompt_label(state: &ChatState) -> String {
    state
        .current_thread()
        .map(|thread| thread.title.clone())
        .unwrap_or_default()
}

fn index_arg(intent: &Intent) -> Option<usize> {
    intent
        .command_args
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|index| usize::try_from(index).ok())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use aigen_contracts::chat::parse_intent;
    use serde_json::json;

    use super::{index_arg, string_list};

    #[test]
    fn index_arg_reads_zero_based_positions() {
        assert_eq!(index_arg(&parse_intent("/view 3")), Some(2));
        assert_eq!(index_arg(&parse_intent("/view zero")), None);
        assert_eq!(index_arg(&parse_intent("/open sheet-2")), None);
    }

    #[test]
    fn string_list_skips_non_strings() {
        let value = json!(["a.png", 3, "b c.jpg"]);
        assert_eq!(string_list(Some(&value)), vec!["a.png", "b c.jpg"]);
        assert!(string_list(None).is_empty());
    }
}
