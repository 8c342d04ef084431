//! Shareable student links.
//!
//! The front end routes on the URL fragment: `#student?batch=<id>`. The part
//! after the first `?` inside the fragment is an ordinary query string.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Teacher,
    Student,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Home => "home",
            View::Teacher => "teacher",
            View::Student => "student",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRoute {
    pub view: View,
    pub batch_id: Option<String>,
}

pub fn share_link(base_url: &str, batch_id: &str) -> String {
    let base = base_url.split('#').next().unwrap_or(base_url);
    format!("{}#student?batch={}", base, encode_component(batch_id))
}

/// Accepts a full URL or a bare fragment (`#student?batch=x` or
/// `student?batch=x`).
pub fn parse_fragment(input: &str) -> LinkRoute {
    let input = input.trim();
    let fragment = match input.split_once('#') {
        Some((_, frag)) => frag,
        None if input.contains("://") => "",
        None => input,
    };
    let (route, query) = match fragment.split_once('?') {
        Some((route, query)) => (route, Some(query)),
        None => (fragment, None),
    };
    let view = match route {
        "student" => View::Student,
        "teacher" => View::Teacher,
        _ => View::Home,
    };
    let batch_id = query
        .and_then(|q| query_param(q, "batch"))
        .filter(|b| !b.is_empty());
    LinkRoute { view, batch_id }
}

/// First value for `key`, decoded.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push(h * 16 + l);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_link_targets_student_route() {
        assert_eq!(
            share_link("https://notas.example.edu/app/", "1a2b3c4d"),
            "https://notas.example.edu/app/#student?batch=1a2b3c4d"
        );
        assert_eq!(
            share_link("https://notas.example.edu/#teacher", "ab"),
            "https://notas.example.edu/#student?batch=ab"
        );
    }

    #[test]
    fn parses_full_url_and_bare_fragment() {
        let full = parse_fragment("https://x.test/app/#student?batch=1a2b3c4d");
        assert_eq!(full.view, View::Student);
        assert_eq!(full.batch_id.as_deref(), Some("1a2b3c4d"));

        let bare = parse_fragment("#student?batch=zz");
        assert_eq!(bare.view, View::Student);
        assert_eq!(bare.batch_id.as_deref(), Some("zz"));

        let no_hash = parse_fragment("student?batch=yy");
        assert_eq!(no_hash.batch_id.as_deref(), Some("yy"));
    }

    #[test]
    fn splits_on_first_question_mark_only() {
        let r = parse_fragment("#student?batch=a?b&x=1");
        assert_eq!(r.batch_id.as_deref(), Some("a?b"));
    }

    #[test]
    fn decodes_query_encoding() {
        let r = parse_fragment("#student?other=1&batch=a%20b+c&batch=second");
        assert_eq!(r.batch_id.as_deref(), Some("a b c"));
        assert_eq!(query_param("k=100%", "k").as_deref(), Some("100%"));
        assert_eq!(query_param("k=%zz", "k").as_deref(), Some("%zz"));
    }

    #[test]
    fn routes_and_missing_batch() {
        assert_eq!(parse_fragment("#teacher").view, View::Teacher);
        assert_eq!(parse_fragment("https://x.test/").view, View::Home);
        assert_eq!(parse_fragment("").view, View::Home);
        assert_eq!(parse_fragment("#student").batch_id, None);
        assert_eq!(parse_fragment("#student?batch=").batch_id, None);
    }

    #[test]
    fn encoded_batch_survives_roundtrip() {
        let link = share_link("http://localhost:3000/", "a b/c");
        assert_eq!(parse_fragment(&link).batch_id.as_deref(), Some("a b/c"));
    }
}
