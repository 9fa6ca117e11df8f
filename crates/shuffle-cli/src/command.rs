//! Line commands typed on stdin.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load { locator: String, refresh: bool },
    Next,
    Prev,
    /// Reload the video under the cursor.
    Play,
    NewShuffle,
    Channels,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  load <channel url> [--refresh]   load a channel (resumes saved history)
  next | n                         next video (replay or new random pick)
  prev | p                         previous video
  play                             play the current video again
  new                              start a new shuffle for this channel
  channels                         list known channels
  status                           show the current video
  help                             this text
  quit | q                         exit";

/// Parse one input line.  `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "load" | "l" => {
            let mut locator = None;
            let mut refresh = false;
            for w in words {
                match w {
                    "--refresh" | "-r" => refresh = true,
                    _ if locator.is_none() => locator = Some(w.to_string()),
                    _ => return Err(format!("unexpected argument: {}", w)),
                }
            }
            let locator = locator.ok_or_else(|| "usage: load <channel url> [--refresh]".to_string())?;
            Command::Load { locator, refresh }
        }
        "next" | "n" => Command::Next,
        "prev" | "p" | "previous" => Command::Prev,
        "play" => Command::Play,
        "new" => Command::NewShuffle,
        "channels" | "ls" => Command::Channels,
        "status" | "s" => Command::Status,
        "help" | "?" | "h" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(Some(cmd))
}
