use ammonia;

/// Clean an exam part label before it is handed back to the portal.
///
/// Labels are typed by teachers into the marking scheme editor and the portal
/// renders them as HTML, so the same whitelist applies as for any rich text:
/// simple formatting (<b>, <sub>, <sup>) survives, scripts and event handler
/// attributes do not. Surrounding whitespace is trimmed.
///
/// The result is HTML: plain-text characters come back entity-escaped
/// (`A & B` becomes `A &amp; B`). Apply it once, to the label being emitted,
/// never to text used as a key or sort input.
pub fn clean_label(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}
