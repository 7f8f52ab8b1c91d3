use crate::pipe::Direction;

/// Отражение трафика в лог (`relay::traffic`, уровень debug), `\n` видимы.
pub(crate) fn display(direction: Direction, data: &[u8]) {
    if data.is_empty() || !tracing::enabled!(target: "relay::traffic", tracing::Level::DEBUG) {
        return;
    }
    tracing::debug!(
        target: "relay::traffic",
        %direction,
        bytes = data.len(),
        data = %escape_newlines(data)
    );
}

fn escape_newlines(data: &[u8]) -> String {
    String::from_utf8_lossy(data).replace('\n', "\\n")
}
