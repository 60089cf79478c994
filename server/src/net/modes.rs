//! Line-fed input modes layered over the playing state: the string
//! editor builders use and the note composer. Each is a small
//! coroutine: feed one line, maybe transition, eventually finish.

use super::descriptor::{InputMode, ModeResult};

/// Multi-line string editor. `@` or `~` alone on a line finishes;
/// `.c` clears the buffer; everything else appends.
pub struct StringEditor {
    buffer: String,
    result: Option<String>,
}

impl StringEditor {
    pub fn new(initial: &str) -> Self {
        StringEditor {
            buffer: initial.to_string(),
            result: None,
        }
    }
}

impl InputMode for StringEditor {
    fn prompt(&self) -> String {
        "] ".to_string()
    }

    fn feed(&mut self, line: &str) -> ModeResult {
        match line.trim_end() {
            "@" | "~" => {
                self.result = Some(std::mem::take(&mut self.buffer));
                ModeResult::Done
            }
            ".c" => {
                self.buffer.clear();
                ModeResult::Continue
            }
            text => {
                self.buffer.push_str(&core::string_operations::smash_tilde(text));
                self.buffer.push_str("\r\n");
                ModeResult::Continue
            }
        }
    }

    fn take_result(&mut self) -> Option<String> {
        self.result.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteStage {
    To,
    Subject,
    Expire,
    Text,
    Finish,
}

/// The linear note composition flow: recipient, subject, expiry, body,
/// post-or-discard. `@` in the body advances to the finish prompt.
pub struct NoteComposer {
    stage: NoteStage,
    author: String,
    to: String,
    subject: String,
    expire_days: i64,
    text: String,
    result: Option<String>,
}

impl NoteComposer {
    pub fn new(author: &str) -> Self {
        NoteComposer {
            stage: NoteStage::To,
            author: author.to_string(),
            to: String::new(),
            subject: String::new(),
            expire_days: 14,
            text: String::new(),
            result: None,
        }
    }
}

impl InputMode for NoteComposer {
    fn prompt(&self) -> String {
        match self.stage {
            NoteStage::To => "To whom? ".to_string(),
            NoteStage::Subject => "Subject: ".to_string(),
            NoteStage::Expire => "Days until expiry [14]: ".to_string(),
            NoteStage::Text => "Enter text, '@' on its own line to finish:\r\n".to_string(),
            NoteStage::Finish => "(P)ost or (D)iscard? ".to_string(),
        }
    }

    fn feed(&mut self, line: &str) -> ModeResult {
        let line = line.trim_end();
        match self.stage {
            NoteStage::To => {
                if line.is_empty() {
                    return ModeResult::Continue;
                }
                self.to = line.to_string();
                self.stage = NoteStage::Subject;
                ModeResult::Continue
            }
            NoteStage::Subject => {
                if line.is_empty() {
                    return ModeResult::Continue;
                }
                self.subject = line.to_string();
                self.stage = NoteStage::Expire;
                ModeResult::Continue
            }
            NoteStage::Expire => {
                if !line.is_empty() {
                    match line.parse::<i64>() {
                        Ok(days) if days > 0 => self.expire_days = days,
                        _ => return ModeResult::Continue,
                    }
                }
                self.stage = NoteStage::Text;
                ModeResult::Continue
            }
            NoteStage::Text => {
                if line == "@" {
                    self.stage = NoteStage::Finish;
                } else {
                    self.text
                        .push_str(&core::string_operations::smash_tilde(line));
                    self.text.push_str("\r\n");
                }
                ModeResult::Continue
            }
            NoteStage::Finish => match line.chars().next() {
                Some('p') | Some('P') => {
                    self.result = Some(format!(
                        "From: {}\r\nTo: {}\r\nSubject: {}\r\nExpires: {} days\r\n\r\n{}",
                        self.author, self.to, self.subject, self.expire_days, self.text
                    ));
                    ModeResult::Done
                }
                Some('d') | Some('D') => ModeResult::Done,
                _ => ModeResult::Continue,
            },
        }
    }

    fn take_result(&mut self) -> Option<String> {
        self.result.take()
    }
}
