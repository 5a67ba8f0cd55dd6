use std::io::BufRead;

use crossbeam_channel::Sender;

/// Operator commands typed on stdin while the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Reset,
    Status,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Command::Pause),
            "u" | "resume" => Some(Command::Resume),
            "r" | "reset" => Some(Command::Reset),
            "s" | "status" => Some(Command::Status),
            "q" | "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

pub const HELP: &str = "commands: p(ause)  u (resume)  r(eset)  s(tatus)  q(uit)";

/// Forwards parsed stdin lines to `tx` on a detached thread. The sender is
/// dropped at end of input, which is not a quit request.
pub fn spawn_stdin_reader(tx: Sender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        return;
                    }
                }
                None => eprintln!("unknown command {:?}; {HELP}", line.trim()),
            }
        }
        log::debug!("stdin closed");
    });
}
