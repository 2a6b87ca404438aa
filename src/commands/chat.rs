use crate::client::{render_message, ChatClient, RenderBlock, Transcript};
use crate::db::{Database, StoreError};
use crate::profile::LearnerProfile;
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("No learner profile found. Run `ai-tutor register` first.")]
    NotRegistered,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load the stored profile; without one the learner has to register.
pub fn open_dashboard(db: &Database) -> Result<LearnerProfile, DashboardError> {
    db.load_profile()?.ok_or(DashboardError::NotRegistered)
}

pub fn welcome_card(profile: &LearnerProfile) -> String {
    format!(
        "Welcome, {}!\n\
         Age: {}\n\
         Learning Style: {}\n\
         {}\n\
         Ask me anything. Type /quit to leave.",
        profile.name,
        profile.age,
        profile.learning_style.label(),
        profile.learning_style.description(),
    )
}

/// Chat REPL. Text is printed as it streams in. Once images arrive the
/// reply is shown again in its display form, followed by the pictures.
pub async fn run_chat(client: &mut ChatClient, input: impl BufRead, out: &mut impl Write) -> Result<Transcript> {
    let mut transcript = Transcript::new();
    writeln!(out, "{}", welcome_card(client.profile()))?;

    let mut lines = input.lines();
    loop {
        write!(out, "\nMe: ")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let text = line.trim();
        if text == "/quit" || text == "/exit" {
            break;
        }
        if text.is_empty() {
            continue;
        }

        write!(out, "AI: ")?;
        out.flush()?;
        let mut shown = String::new();
        let mut write_error: Option<io::Error> = None;
        let result = client
            .send(&mut transcript, text, |transcript, handle| {
                if write_error.is_some() {
                    return;
                }
                let Some(message) = transcript.get(handle) else {
                    return;
                };
                // Live output only ever appends; rewritten text is reprinted at the end.
                let Some(fresh) = message.content.strip_prefix(shown.as_str()) else {
                    return;
                };
                if fresh.is_empty() {
                    return;
                }
                match write!(out, "{}", fresh).and_then(|_| out.flush()) {
                    Ok(()) => shown.clone_from(&message.content),
                    Err(e) => write_error = Some(e),
                }
            })
            .await;
        if let Some(e) = write_error {
            return Err(e.into());
        }
        writeln!(out)?;

        match result {
            Ok(Some(handle)) => {
                if let Some(message) = transcript.get(handle) {
                    if message.content != shown {
                        writeln!(out, "AI: {}", message.content)?;
                    }
                    for block in render_message(message, false) {
                        if !matches!(block, RenderBlock::Text(_)) {
                            writeln!(out, "{}", block)?;
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                writeln!(out, "Sorry, something went wrong: {}", e)?;
            }
        }
    }
    Ok(transcript)
}
