use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::account::Account;
use crate::oracle::OracleClient;

/// The pilot message every session opens with.
pub const GREETING: &str = "Genesis Node online. Welcome, Creator.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Pilot,
}

/// One entry in the conversation log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

/// A captured submission waiting for its turn on the wire. The account id is
/// read when the user submits, not when the request is finally sent.
struct Outbound {
    account_id: String,
    text: String,
}

/// Append-only conversation between the user and the remote co-pilot.
///
/// Each submission echoes the user's text into the log immediately, then
/// queues a guidance request. Requests go out one at a time in submission
/// order, so replies can never interleave out of order. A failed request
/// resolves into a visible error reply and the session stays submittable.
pub struct CoPilotSession {
    log: Vec<Message>,
    draft: String,
    cursor: usize,
    outbound: VecDeque<Outbound>,
    in_flight: Option<JoinHandle<Result<String>>>,
    client: OracleClient,

    // Log viewport bookkeeping; the renderer records the chat area size here
    // each frame so appends can keep the newest message visible.
    pub scroll: u16,
    pub viewport_height: u16,
    pub viewport_width: u16,
}

impl CoPilotSession {
    pub fn new(client: OracleClient) -> Self {
        let mut session = Self {
            log: Vec::new(),
            draft: String::new(),
            cursor: 0,
            outbound: VecDeque::new(),
            in_flight: None,
            client,
            scroll: 0,
            viewport_height: 0,
            viewport_width: 0,
        };
        session.push(Message {
            sender: Sender::Pilot,
            text: GREETING.to_string(),
        });
        session
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether a guidance request is on the wire right now.
    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replace the draft wholesale. Never touches the log.
    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.cursor = self.draft.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.draft, self.cursor);
        self.draft.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft.chars().count());
    }

    /// Anchor the current draft: clear it, echo it into the log immediately,
    /// and queue a guidance request carrying the account id as of now.
    ///
    /// A draft that trims to nothing is a no-op: no append, no request, and
    /// the draft is left as typed.
    pub fn submit(&mut self, account: &Account) {
        if self.draft.trim().is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.draft);
        self.cursor = 0;

        self.push(Message {
            sender: Sender::User,
            text: text.clone(),
        });
        self.outbound.push_back(Outbound {
            account_id: account.id.clone(),
            text,
        });
        self.dispatch_next();
    }

    /// Collect a finished reply, if any, and put the next queued request on
    /// the wire. Returns true if the log changed.
    pub async fn pump(&mut self) -> bool {
        match &self.in_flight {
            Some(task) if task.is_finished() => {}
            _ => return false,
        }
        let outcome = match self.in_flight.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|err| Err(anyhow!("guidance task failed: {err}"))),
            None => return false,
        };

        self.resolve(outcome);
        self.dispatch_next();
        true
    }

    /// One request on the wire at a time; replies therefore land in the
    /// order the submissions were made.
    fn dispatch_next(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(request) = self.outbound.pop_front() else {
            return;
        };

        debug!("dispatching insight for account {}", request.account_id);
        let client = self.client.clone();
        self.in_flight = Some(tokio::spawn(async move {
            client.analyze(&request.account_id, &request.text).await
        }));
    }

    /// Append the reply for the oldest outstanding submission. A failure is
    /// surfaced in the log rather than dropped; the user's echoed message is
    /// untouched and the session stays submittable.
    fn resolve(&mut self, outcome: Result<String>) {
        let text = match outcome {
            Ok(guidance) => guidance,
            Err(err) => {
                debug!("guidance request failed: {err:#}");
                format!("Error: the oracle did not answer ({err}).")
            }
        };
        self.push(Message {
            sender: Sender::Pilot,
            text,
        });
    }

    /// Every append funnels through here so the view always follows the log.
    fn push(&mut self, message: Message) {
        self.log.push(message);
        self.scroll_to_bottom();
    }

    /// Scroll so the newest message (and the typing indicator, if shown) is
    /// visible, using the wrap width the renderer last reported.
    pub fn scroll_to_bottom(&mut self) {
        let wrap_width = if self.viewport_width > 0 {
            self.viewport_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for message in &self.log {
            total_lines += 1; // sender line
            for line in message.text.lines() {
                let chars = line.chars().count();
                total_lines += if chars == 0 {
                    1
                } else {
                    (chars / wrap_width + 1) as u16
                };
            }
            total_lines += 1; // blank line after message
        }
        if self.is_waiting() {
            total_lines += 2; // sender line + indicator
        }

        let visible = if self.viewport_height > 0 {
            self.viewport_height
        } else {
            20
        };
        self.scroll = total_lines.saturating_sub(visible);
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }
}

/// Convert a character index to a byte index for UTF-8 safe string edits.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub;
    use std::time::Duration;

    fn session_without_network() -> CoPilotSession {
        CoPilotSession::new(OracleClient::new("http://127.0.0.1:1"))
    }

    async fn wait_for_reply(session: &mut CoPilotSession) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if session.pump().await {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("guidance reply never arrived");
    }

    #[test]
    fn opens_with_the_greeting() {
        let session = session_without_network();

        assert_eq!(
            session.log(),
            [Message {
                sender: Sender::Pilot,
                text: GREETING.to_string(),
            }]
        );
        assert_eq!(session.draft(), "");
    }

    #[test]
    fn whitespace_draft_is_a_no_op() {
        let mut session = session_without_network();
        session.update_draft("  \t  ");

        session.submit(&Account::new("A1"));

        assert_eq!(session.log().len(), 1);
        assert_eq!(session.draft(), "  \t  ");
        assert!(!session.is_waiting());
    }

    #[tokio::test]
    async fn submit_echoes_before_any_completion() {
        let mut session = session_without_network();
        session.update_draft("hello");

        session.submit(&Account::new("A1"));

        assert_eq!(session.log().len(), 2);
        assert_eq!(
            session.log().last(),
            Some(&Message {
                sender: Sender::User,
                text: "hello".to_string(),
            })
        );
        assert_eq!(session.draft(), "");
        assert!(session.is_waiting());
    }

    #[test]
    fn resolved_guidance_is_appended_as_the_pilot() {
        let mut session = session_without_network();

        session.resolve(Ok("Proceed.".to_string()));

        assert_eq!(
            session.log().last(),
            Some(&Message {
                sender: Sender::Pilot,
                text: "Proceed.".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn failed_request_surfaces_and_leaves_the_session_usable() {
        let mut session = session_without_network();
        session.update_draft("hello");
        session.submit(&Account::new("A1"));

        wait_for_reply(&mut session).await;

        let reply = session.log().last().unwrap();
        assert_eq!(reply.sender, Sender::Pilot);
        assert!(reply.text.starts_with("Error:"));
        // The echoed user message survived the failure.
        assert_eq!(session.log()[1].text, "hello");
        assert!(!session.is_waiting());

        // And the session accepts the next submission.
        session.update_draft("again");
        session.submit(&Account::new("A1"));
        assert!(session.is_waiting());
    }

    #[tokio::test]
    async fn greeting_scenario_round_trip() {
        let base_url = stub::serve_json(r#"{"status": "success", "guidance": "Proceed."}"#).await;
        let mut session = CoPilotSession::new(OracleClient::new(&base_url));
        session.update_draft("hello");

        session.submit(&Account::new("A1"));

        let senders: Vec<Sender> = session.log().iter().map(|m| m.sender).collect();
        assert_eq!(senders, [Sender::Pilot, Sender::User]);
        assert_eq!(session.draft(), "");

        wait_for_reply(&mut session).await;

        assert_eq!(
            session.log().last(),
            Some(&Message {
                sender: Sender::Pilot,
                text: "Proceed.".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn overlapping_submissions_reply_in_submission_order() {
        let base_url = stub::serve_json(r#"{"guidance": "Insight anchored."}"#).await;
        let mut session = CoPilotSession::new(OracleClient::new(&base_url));

        session.update_draft("first");
        session.submit(&Account::new("A1"));
        session.update_draft("second");
        session.submit(&Account::new("A1"));

        // Both echoes are in the log before either reply.
        let senders: Vec<Sender> = session.log().iter().map(|m| m.sender).collect();
        assert_eq!(senders, [Sender::Pilot, Sender::User, Sender::User]);

        wait_for_reply(&mut session).await;
        wait_for_reply(&mut session).await;

        let senders: Vec<Sender> = session.log().iter().map(|m| m.sender).collect();
        assert_eq!(
            senders,
            [
                Sender::Pilot,
                Sender::User,
                Sender::User,
                Sender::Pilot,
                Sender::Pilot,
            ]
        );
        assert!(!session.is_waiting());
    }

    #[test]
    fn appends_keep_the_newest_message_visible() {
        let mut session = session_without_network();
        session.viewport_height = 4;
        session.viewport_width = 20;

        session.resolve(Ok(
            "a reply long enough to wrap across several terminal lines".to_string(),
        ));

        assert!(session.scroll > 0);
    }

    #[test]
    fn draft_edits_do_not_move_the_view() {
        let mut session = session_without_network();
        session.viewport_height = 4;
        session.viewport_width = 20;
        session.scroll_to_bottom();
        let pinned = session.scroll;

        session.update_draft("typing away");
        session.insert_char('!');

        assert_eq!(session.scroll, pinned);
    }

    #[test]
    fn draft_editing_is_utf8_safe() {
        let mut session = session_without_network();
        session.update_draft("héllo");

        session.cursor_left();
        session.backspace();

        assert_eq!(session.draft(), "hélo");
    }
}
