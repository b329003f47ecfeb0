use ammonia;

/// Sanitizes text received from the upstream trivia provider.
///
/// Provider text is HTML-entity encoded and is rendered as markup by clients,
/// so anything outside ammonia's safe whitelist (scripts, event handlers) is
/// stripped. Entities are normalized on the way through: `&quot;` and `&#039;`
/// come back as plain quotes, `&amp;` stays escaped.
///
/// Options and the correct answer must go through the same function, otherwise
/// answer comparison breaks.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
