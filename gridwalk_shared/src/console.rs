//! Operator console input.
//!
//! Both binaries read commands line by line on a plain thread and hand them
//! to the async frame loop over a channel. The thread ends at end of input,
//! on a read error, or when the receiver is gone.

use std::{
    io::{BufRead, BufReader, Write},
    thread::JoinHandle,
};

use tokio::sync::mpsc;

/// Prompt printed before each line is read.
pub const PROMPT: &str = "] ";

/// Spawns a thread forwarding non-empty, trimmed lines of `input` to `tx`.
pub fn spawn_line_reader<R, W>(
    mut input: R,
    mut prompt: W,
    tx: mpsc::Sender<String>,
) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    std::thread::spawn(move || loop {
        let _ = write!(prompt, "{PROMPT}");
        let _ = prompt.flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim().to_string();
        if !line.is_empty() && tx.blocking_send(line).is_err() {
            break;
        }
    })
}

/// Console on the process's stdin and stdout.
pub fn spawn_stdin_reader(tx: mpsc::Sender<String>) -> JoinHandle<()> {
    spawn_line_reader(BufReader::new(std::io::stdin()), std::io::stdout(), tx)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reader_stops_at_end_of_input() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = Cursor::new("status\n\n  kick ash#1 \nquit");
        let handle = spawn_line_reader(input, std::io::sink(), tx);
        handle.join().unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["status", "kick ash#1", "quit"]);
    }

    #[test]
    fn reader_stops_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = spawn_line_reader(Cursor::new("a\nb\nc\n"), std::io::sink(), tx);
        handle.join().unwrap();
    }
}
