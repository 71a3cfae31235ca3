// src/utils/html.rs

use ammonia;

/// Clean HTML content using the ammonia library.
///
/// This employs a whitelist-based sanitization strategy: it preserves safe tags
/// (like <b>, <p>) while stripping dangerous tags (like <script>, <iframe>)
/// and malicious attributes (like onclick).
///
/// Note:
/// 1. This will remove the <script> tag and its entire content.
/// 2. Generated question text passes through here before it is stored on a
///    session, so upstream model output cannot smuggle markup to clients.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
