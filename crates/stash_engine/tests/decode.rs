use pretty_assertions::assert_eq;
use stash_engine::decode_text;

#[test]
fn decode_respects_charset_header() {
    let bytes = b"caf\xe9";
    let decoded = decode_text(bytes, Some("text/plain; charset=ISO-8859-1")).unwrap();
    assert_eq!(decoded.text, "café");
    assert!(
        decoded.encoding_label.eq_ignore_ascii_case("ISO-8859-1")
            || decoded.encoding_label.eq_ignore_ascii_case("windows-1252")
    );
}

#[test]
fn decode_handles_utf8_bom() {
    let bytes = b"\xEF\xBB\xBFhello";
    let decoded = decode_text(bytes, Some("text/html")).unwrap();
    assert_eq!(decoded.text, "hello");
    assert_eq!(decoded.encoding_label, "UTF-8");
}

#[test]
fn decode_detects_utf8_without_hints() {
    let decoded = decode_text("naïve résumé".as_bytes(), None).unwrap();
    assert_eq!(decoded.text, "naïve résumé");
}
