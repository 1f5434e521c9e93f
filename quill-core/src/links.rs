//! URL and path helpers shared by the page model, template helpers and feed.

use url::Url;

/// Whether `s` is already an absolute `http(s)` URL.
pub fn is_full_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Lexically cleans a slash-separated path: collapses repeated slashes,
/// resolves `.` and `..`, and drops any trailing slash. Rooted paths stay
/// rooted; an empty result becomes `.` (or `/` when rooted).
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Joins `path` onto the path of `base`, the way links on the site are built.
/// A `?query` or `#fragment` suffix on `path` is carried over.
pub fn join_url(base: &Url, path: &str) -> String {
    let (path, fragment) = match path.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (path, None),
    };
    let (path, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };

    let mut url = base.clone();
    url.set_path(&clean_path(&format!("{}/{}", base.path(), path)));
    url.set_query(query);
    url.set_fragment(fragment);
    url.to_string()
}

/// Checks that a permalink is a usable URI reference: either an absolute URL
/// or an absolute path, without control characters or broken escapes.
pub fn validate_permalink(permalink: &str) -> Result<(), String> {
    if let Some(c) = permalink.chars().find(|c| c.is_control()) {
        return Err(format!("invalid control character {c:?}"));
    }
    check_escapes(permalink)?;

    if permalink.starts_with('/') {
        return Ok(());
    }

    match Url::parse(permalink) {
        Ok(url) if url.cannot_be_a_base() => Err(format!("{permalink:?} is not a path")),
        Ok(_) => Ok(()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Err(format!("{permalink:?} is neither an absolute URL nor an absolute path"))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn check_escapes(s: &str) -> Result<(), String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(format!("invalid URL escape at byte {i}"));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("//blog//post/"), "/blog/post");
        assert_eq!(clean_path("/a/./b/../c"), "/a/c");
        assert_eq!(clean_path("/../a"), "/a");
        assert_eq!(clean_path("a/../../b"), "../b");
        assert_eq!(clean_path(""), ".");
    }

    #[test]
    fn test_join_url() {
        let base = Url::parse("https://example.com").unwrap();
        assert_eq!(join_url(&base, "/"), "https://example.com/");
        assert_eq!(join_url(&base, "/about/"), "https://example.com/about");
        assert_eq!(join_url(&base, "css/main.css"), "https://example.com/css/main.css");
        assert_eq!(
            join_url(&base, "/icons/sprite.svg#icon-home"),
            "https://example.com/icons/sprite.svg#icon-home"
        );

        let nested = Url::parse("https://example.com/docs/").unwrap();
        assert_eq!(join_url(&nested, "/intro"), "https://example.com/docs/intro");
    }

    #[test]
    fn test_validate_permalink() {
        assert!(validate_permalink("/").is_ok());
        assert!(validate_permalink("/hello-world").is_ok());
        assert!(validate_permalink("/blog/2021/post.html").is_ok());
        assert!(validate_permalink("https://example.com/x").is_ok());
        assert!(validate_permalink("/caf%C3%A9").is_ok());

        assert!(validate_permalink("hello").is_err());
        assert!(validate_permalink("/bad%zzescape").is_err());
        assert!(validate_permalink("/bad%2").is_err());
        assert!(validate_permalink("/new\nline").is_err());
        assert!(validate_permalink("mailto:me@example.com").is_err());
    }
}
