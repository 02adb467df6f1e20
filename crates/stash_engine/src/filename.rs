const MAX_FILENAME_CHARS: usize = 200;

/// Canonical filename of an asset: the last path segment of the download
/// href as written in the page (not percent-encoded), made safe to create
/// on any platform. `None` when the href has no usable segment.
pub fn asset_filename(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let segment = path.rsplit('/').find(|s| !s.trim().is_empty())?;
    sanitize_filename(segment)
}

/// Replaces forbidden characters and rejects names that cannot be files.
pub fn sanitize_filename(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&[' ', '.'][..]);
    if cleaned.is_empty() {
        return None;
    }

    let mut name: String = cleaned.chars().take(MAX_FILENAME_CHARS).collect();
    let stem = name.split('.').next().unwrap_or(&name);
    if is_reserved_windows_name(stem) {
        name.insert(0, '_');
    }
    Some(name)
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
