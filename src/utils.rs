/// Convert a company name or URL to a sanitized directory name
pub fn sanitize_filename(name: &str) -> String {
    // Remove protocol and replace invalid filename characters
    let trimmed = name
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let name: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '?' | '&' | '=' | '#' | '%' | '*' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    // Limit filename length on a char boundary
    let name: String = name.chars().take(100).collect();
    match name.as_str() {
        "" | "." | ".." => "site".to_string(),
        _ => name,
    }
}
