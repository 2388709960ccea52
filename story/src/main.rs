//! Interactive storytelling from the terminal.
//!
//! Create stories from an idea or a genre, play them with an AI narrator and
//! keep every session on this device.
//!
//! ```bash
//! cargo run -p story -- quickstart --genre mystery
//! cargo run -p story -- resume <session-id>
//! ```

mod headless;

use headless::CliNotifier;
use std::sync::Arc;
use story_core::{
    find_genre, random_genre, Backend, Config, GeminiGenerator, HistoryStore, HttpBackend, Library,
    Narrator, OAuthProvider, PlaySession, Story, GENRES,
};
use tracing::{info, warn};

const OAUTH_SUCCESS: &str = "storyteller://auth/success";
const OAUTH_FAILURE: &str = "storyteller://auth/failure";
const LOCAL_USER: &str = "local";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_help();
        return Ok(());
    };
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let rest = &args[1..];

    if config.gemini_api_key.is_none() {
        eprintln!("Warning: GEMINI_API_KEY is not set; story generation will fail.");
    }

    info!(version = env!("CARGO_PKG_VERSION"), data_dir = %config.data_dir.display(), "storyteller starting");

    let history = HistoryStore::open(&config.data_dir);
    let backend = HttpBackend::new(config.backend.clone()).with_session_store(history.kv());
    if let Err(e) = backend.restore_session().await {
        warn!(error = %e, "could not restore the saved sign-in");
    }
    let library = Library::new(backend, history.clone());

    let mut generator = GeminiGenerator::from_env();
    if let Some(model) = &config.model {
        generator = generator.with_model(model.clone());
    }
    let narrator = Narrator::new(Arc::new(generator), Arc::new(CliNotifier));

    let user = flag_value(rest, "--user").unwrap_or(LOCAL_USER);

    match command {
        "quickstart" => {
            let genre = match flag_value(rest, "--genre") {
                Some(name) => match find_genre(name) {
                    Some(genre) => genre,
                    None => {
                        eprintln!("Unknown genre: {name}. Run `story genres` for the list.");
                        std::process::exit(2);
                    }
                },
                None => random_genre(),
            };
            println!("Inventing a {} story...", genre.name);
            let Some(draft) = narrator.quick_start(genre).await else {
                std::process::exit(1);
            };
            let story = library.save_story(draft, user, None, false).await?;
            let play = PlaySession::start(history, narrator, &story, library.backend()).await?;
            headless::run_play(play).await?;
        }
        "create" => {
            let idea = positional(rest).join(" ");
            if idea.trim().is_empty() {
                eprintln!("Usage: story create <idea...> [--publish] [--user <ID>]");
                std::process::exit(2);
            }
            let Some(draft) = narrator.generate_details(&idea).await else {
                std::process::exit(1);
            };
            let publish = rest.iter().any(|a| a == "--publish");
            let story = library.save_story(draft, user, None, publish).await?;
            print_story(&story);
        }
        "play" => {
            let id = required(rest, "story play <story-id>");
            let story = library.find_story(id).await?;
            let play = PlaySession::start(history, narrator, &story, library.backend()).await?;
            headless::run_play(play).await?;
        }
        "resume" => {
            let id = required(rest, "story resume <session-id>");
            let play = PlaySession::resume(history, narrator, id).await?;
            headless::run_play(play).await?;
        }
        "sessions" => {
            let sessions = history.sessions().await?;
            if sessions.is_empty() {
                println!("No saved sessions.");
            }
            let missing = library.missing_stories(&sessions).await.unwrap_or_else(|e| {
                warn!(error = %e, "could not check published stories");
                Default::default()
            });
            for session in &sessions {
                let removed = if missing.contains(&session.story.id) {
                    "  [removed]"
                } else {
                    ""
                };
                println!(
                    "{}  {}  ({} turns, {}){removed}",
                    session.id,
                    session.story.title,
                    session.turns.len(),
                    session.updated_at.format("%Y-%m-%d %H:%M")
                );
                if let Some(text) = session.last_ai_text() {
                    println!("    {}", preview(text));
                }
            }
        }
        "stories" => {
            let stories = if user == LOCAL_USER {
                history.creations().await?
            } else {
                library.stories_for(user).await?
            };
            if stories.is_empty() {
                println!("No stories yet.");
            }
            for story in &stories {
                print_story(story);
            }
        }
        "genres" => {
            for genre in GENRES.iter() {
                println!("{:<18} {}", genre.name, genre.hints);
            }
        }
        "publish" => {
            let id = required(rest, "story publish <local-id>");
            let story = library.publish(id).await?;
            print_story(&story);
        }
        "delete-session" => {
            let id = required(rest, "story delete-session <session-id>");
            if history.delete_session(id).await? {
                println!("Deleted session {id}.");
            } else {
                println!("No session {id}.");
            }
        }
        "delete-story" => {
            let id = required(rest, "story delete-story <story-id>");
            let story = library.find_story(id).await?;
            let removed = library.delete_story(&story).await?;
            println!("Deleted {} and {removed} session(s).", story.title);
        }
        "login" => {
            let args = positional(rest);
            let (Some(email), Some(password)) = (args.first(), args.get(1)) else {
                eprintln!("Usage: story login <email> <password>");
                std::process::exit(2);
            };
            let user = library.backend().sign_in(email, password).await?;
            println!("Signed in as {} ({}). Use --user {} to see your stories.", user.name, user.email, user.id);
        }
        "logout" => {
            library.backend().sign_out().await?;
            println!("Signed out.");
        }
        "oauth" => {
            let provider = match rest.first().map(|p| p.to_lowercase()).as_deref() {
                Some("google") => OAuthProvider::Google,
                Some("facebook") => OAuthProvider::Facebook,
                _ => {
                    eprintln!("Usage: story oauth <google|facebook>");
                    std::process::exit(2);
                }
            };
            let url = library
                .backend()
                .oauth_url(provider, OAUTH_SUCCESS, OAUTH_FAILURE)?;
            println!("Open this URL to sign in:\n{url}");
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: STORY_LOG='{}' is not a valid tracing filter ({e}); falling back to 'warn'",
                    config.log_level
                );
                tracing_subscriber::EnvFilter::new("warn")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--user" | "--genre" => i += 1,
            "--publish" => {}
            arg => out.push(arg),
        }
        i += 1;
    }
    out
}

fn required<'a>(args: &'a [String], usage: &str) -> &'a str {
    match positional(args).first().copied() {
        Some(value) => value,
        None => {
            eprintln!("Usage: {usage}");
            std::process::exit(2);
        }
    }
}

/// First line of `text`, cut to a terminal-friendly width.
fn preview(text: &str) -> String {
    const WIDTH: usize = 72;
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= WIDTH {
        return line.to_string();
    }
    let cut: String = line.chars().take(WIDTH - 3).collect();
    format!("{}...", cut.trim_end())
}

fn print_story(story: &Story) {
    let location = if story.is_local { "local" } else { "published" };
    println!("{}  {}  [{location}]", story.id, story.title);
    if !story.description.is_empty() {
        println!("    {}", story.description);
    }
    if !story.tags.is_empty() {
        println!("    tags: {}", story.tags.join(", "));
    }
}

fn print_help() {
    println!("Storyteller - interactive fiction with an AI narrator");
    println!();
    println!("USAGE:");
    println!("  story <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  quickstart [--genre <NAME>]      Invent a story and start playing");
    println!("  create <idea...> [--publish]     Draft a story from an idea");
    println!("  play <story-id>                  Start a new session of a story");
    println!("  resume <session-id>              Continue a saved session");
    println!("  sessions                         List saved sessions");
    println!("  stories                          List stories (local only without --user)");
    println!("  genres                           List quick start genres");
    println!("  publish <local-id>               Publish a local story");
    println!("  delete-session <session-id>      Delete a saved session");
    println!("  delete-story <story-id>          Delete a story and all its sessions");
    println!("  login <email> <password>         Sign in; the session is kept for later runs");
    println!("  logout                           Sign out and forget the saved session");
    println!("  oauth <google|facebook>          Print a sign-in URL");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help       Show this help message");
    println!("  --user <ID>      Owner of created stories, and whose stories to list");
    println!();
    println!("ENVIRONMENT:");
    println!("  GEMINI_API_KEY           API key for story generation");
    println!("  STORY_MODEL              Gemini model to use");
    println!("  STORY_DATA_DIR           Where sessions and covers are kept");
    println!("  STORY_BACKEND_ENDPOINT   Hosted backend URL");
    println!("  STORY_LOG                Log filter (default: warn)");
}
