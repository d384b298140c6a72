use crate::commands::{Dispatcher, Reply};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{JoinError, JoinSet};

/// Dispatch every line of `input` as a command message from `sender`.
///
/// Lines are handled concurrently on the blocking pool, so replies are
/// written in completion order. Returns the number of messages handled.
pub async fn serve_lines<R, W>(
    dispatcher: Arc<Dispatcher>,
    sender: Option<i64>,
    input: R,
    mut output: W,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut pending: JoinSet<Reply> = JoinSet::new();
    let mut handled = 0;
    let mut input_open = true;

    while input_open || !pending.is_empty() {
        tokio::select! {
            line = lines.next_line(), if input_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    pending.spawn_blocking(move || dispatcher.dispatch(sender, &line));
                }
                None => input_open = false,
            },
            Some(done) = pending.join_next(), if !pending.is_empty() => {
                write_reply(&mut output, done).await?;
                handled += 1;
            }
        }
    }
    output.flush().await?;
    Ok(handled)
}

async fn write_reply<W>(output: &mut W, done: Result<Reply, JoinError>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let reply = match done {
        Ok(reply) => reply,
        Err(err) => {
            log::error!("command task failed: {err}");
            return Ok(());
        }
    };
    if let Some(text) = reply.text() {
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n\n").await?;
    }
    Ok(())
}
