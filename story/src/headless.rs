//! Line-oriented play mode.
//!
//! This module provides a simple text-based interface for playing a session
//! from a terminal or a script driving stdin.

use story_core::play::{PlayError, PlaySession};
use story_core::{Notifier, TurnEntry, TurnKind};
use std::io::{self, BufRead, Write};

/// Prints alerts inline with the story output.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliNotifier;

impl Notifier for CliNotifier {
    fn alert(&self, title: &str, message: &str) {
        println!("[ALERT] {title}: {message}");
    }
}

/// Play a session until the player quits or stdin closes.
///
/// This provides a simple line-oriented protocol:
/// - Lines starting with `#` are commands (quit, status, summary, history, continue)
/// - All other lines are sent to the narrator as the player's action
pub async fn run_play(mut play: PlaySession) -> Result<(), PlayError> {
    println!("=== {} ===", play.story().title);
    if !play.story().description.is_empty() {
        println!("{}", play.story().description);
    }
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    for step in play.pending_attributes() {
        loop {
            print!("{} ", step.prompt());
            io::stdout().flush().ok();

            let Some(answer) = next_line(&mut lines) else {
                return Ok(());
            };
            match play.answer(step, &answer).await {
                Ok(()) => break,
                Err(PlayError::Validation(e)) => println!("[ERROR] {e}"),
                Err(e) => return Err(e),
            }
        }
    }

    print_turns(play.turns());
    play.acknowledge();
    print_commands();

    while let Some(line) = next_line(&mut lines) {
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            match command.trim() {
                "quit" | "exit" => {
                    println!("Goodbye!");
                    break;
                }
                "continue" => take_turn(&mut play, None).await?,
                "status" => print_status(&play),
                "summary" => {
                    if play.refresh_summary().await? {
                        println!("[SUMMARY]\n{}\n", play.story().summary);
                    } else {
                        println!("[ERROR] Summary unchanged.");
                    }
                }
                "history" => print_turns(play.turns()),
                "help" => print_commands(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            continue;
        }

        take_turn(&mut play, Some(&line)).await?;
    }

    Ok(())
}

async fn take_turn(play: &mut PlaySession, action: Option<&str>) -> Result<(), PlayError> {
    print!("[PROCESSING]");
    io::stdout().flush().ok();

    let result = play.take_turn(action).await;

    // Clear the processing indicator
    print!("\r            \r");
    io::stdout().flush().ok();

    match result? {
        Some(entries) => {
            let fresh: Vec<&TurnEntry> = entries.iter().filter(|e| e.is_new).collect();
            println!("[NARRATOR]");
            for entry in fresh {
                print_paragraphs(&entry.text);
            }
            println!();
            play.acknowledge();
        }
        None => println!("[ERROR] The narrator could not continue. Try again."),
    }
    Ok(())
}

fn next_line<B: BufRead>(lines: &mut io::Lines<B>) -> Option<String> {
    match lines.next()? {
        Ok(line) => Some(line.trim().to_string()),
        Err(e) => {
            eprintln!("Error reading input: {e}");
            None
        }
    }
}

fn print_turns(turns: &[TurnEntry]) {
    for turn in turns {
        match turn.kind {
            TurnKind::Ai => print_paragraphs(&turn.text),
            TurnKind::User => println!("> {}", turn.text),
        }
        println!();
    }
}

fn print_paragraphs(text: &str) {
    for para in text.split("\n\n") {
        println!("{para}");
    }
}

fn print_status(play: &PlaySession) {
    let session = play.session();
    println!("[STATUS]");
    println!("  Session: {}", session.id);
    println!("  Story: {} ({})", session.story.title, session.story.id);
    println!("  Turns: {}", session.turns.len());
    if let Some(name) = &session.player.name {
        println!("  Name: {name}");
    }
    if let Some(age) = session.player.age {
        println!("  Age: {age}");
    }
    if let Some(gender) = &session.player.gender {
        println!("  Gender: {gender}");
    }
    if let Some(path) = &session.image_path {
        println!("  Cover: {}", path.display());
    }
    println!("  Last played: {}", session.updated_at.format("%Y-%m-%d %H:%M"));
}

fn print_commands() {
    println!("Commands:");
    println!("  #continue    - Let the story continue without acting");
    println!("  #summary     - Refresh the story summary");
    println!("  #history     - Show the story so far");
    println!("  #status      - Show session details");
    println!("  #quit        - Stop playing (progress is saved)");
    println!("  #help        - Show this help");
    println!("  (anything else is sent as your action)");
    println!();
}
