//! The interactive turn loop: one line in, one tutor reply out.

use anyhow::Result;
use edugraph_core::TutorSession;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

/// Returns `true` for the words that end a session.
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Feeds lines from `input` to the session until `exit`/`quit` or end of input.
///
/// A failed turn is reported to the student and the loop carries on; the
/// session state is untouched by the failure, so the student may simply retry.
pub async fn run_turn_loop<R, W>(session: &mut TutorSession, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(b"--- TUTOR ONLINE ---\n\n").await?;

    loop {
        output.write_all(b"Student: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            info!("Input closed, ending session");
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if is_exit_command(text) {
            info!("Student ended the session");
            break;
        }

        let reply = match session.respond(text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = ?e, "Turn failed");
                format!("[error] {e}")
            }
        };
        output
            .write_all(format!("\nTutor: {reply}\n\n").as_bytes())
            .await?;
    }

    output.flush().await?;
    Ok(())
}
