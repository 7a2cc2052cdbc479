use anyhow::Result;
use mindtrace_providers::SessionReader;
use mindtrace_types::CanonicalEvent;

use super::HandlerContext;
use super::context::print_json_lines;

pub fn handle(
    ctx: &HandlerContext,
    session: Option<&str>,
    follow: bool,
    max_polls: Option<usize>,
) -> Result<()> {
    let session = ctx.session(session)?;
    let mut reader = ctx.provider.create_reader(&session);
    tracing::debug!(
        session = %session.id,
        path = %session.path.display(),
        follow,
        "reading events"
    );

    print_json_lines(reader.read_all())?;

    if follow {
        poll(reader.as_mut(), ctx.config.poll_interval(), max_polls)?;
    }

    print_json_lines(reader.flush())
}

/// Fixed-cadence `read_new` loop; returns when `max_polls` is reached or the
/// session disappears
fn poll(
    reader: &mut dyn SessionReader,
    interval: std::time::Duration,
    max_polls: Option<usize>,
) -> Result<()> {
    let mut polls = 0;
    while max_polls.is_none_or(|max| polls < max) {
        std::thread::sleep(interval);
        polls += 1;

        let events: Vec<CanonicalEvent> = reader.read_new();
        if reader.was_truncated() {
            tracing::info!("session log was truncated, re-reading from the start");
        }
        print_json_lines(events)?;

        if !reader.exists() {
            tracing::warn!("session source disappeared, stopping");
            break;
        }
    }
    Ok(())
}
