//! Package payload extraction from `multipart/form-data` push requests.
//!
//! This is not a multipart parser. Push requests built by the client under
//! test carry a single file part, so the payload is located by scanning for
//! the blank line that ends the part headers and the boundary delimiter that
//! follows the file bytes. Part headers are never decoded.

use std::ops::Range;

const MULTIPART_PREFIX: &str = "multipart/form-data; boundary=";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const DELIMITER_PREFIX: &[u8] = b"\r\n--";

/// Extract the raw bytes of the uploaded file part.
///
/// Returns an empty slice when the content type is not multipart or the
/// expected delimiters cannot be found.
pub fn extract_package<'a>(content_type: Option<&str>, body: &'a [u8]) -> &'a [u8] {
    match package_range(content_type, body) {
        Some(range) => &body[range],
        None => &[],
    }
}

/// Locate the file part payload within `body`.
pub(crate) fn package_range(content_type: Option<&str>, body: &[u8]) -> Option<Range<usize>> {
    let boundary = boundary(content_type?)?;

    let mut delimiter = Vec::with_capacity(DELIMITER_PREFIX.len() + boundary.len());
    delimiter.extend_from_slice(DELIMITER_PREFIX);
    delimiter.extend_from_slice(boundary.as_bytes());

    let start = find_bytes(body, HEADER_TERMINATOR, 0)? + HEADER_TERMINATOR.len();

    // Some client encodings close the part without repeating the boundary.
    let end = find_bytes(body, &delimiter, start).or_else(|| find_bytes(body, DELIMITER_PREFIX, start))?;

    Some(start..end)
}

/// Pull the boundary token out of a `multipart/form-data` content type.
fn boundary(content_type: &str) -> Option<&str> {
    let prefix = content_type.get(..MULTIPART_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(MULTIPART_PREFIX) {
        return None;
    }

    let token = content_type[MULTIPART_PREFIX.len()..]
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');

    (!token.is_empty()).then_some(token)
}

/// Find the leftmost occurrence of `needle` in `haystack` at or after `from`.
pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }

    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| offset + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"package\"; filename=\"package.nupkg\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[test]
    fn test_extracts_binary_payload() {
        let payload = [0x50, 0x4b, 0x03, 0x04, 0x00, 0x0d, 0x0a, 0xff];
        let body = upload("xyz123", &payload);

        let extracted = extract_package(Some("multipart/form-data; boundary=xyz123"), &body);

        assert_eq!(extracted, payload);
    }

    #[test]
    fn test_payload_containing_dashes_is_not_truncated() {
        // "\r\n--" inside the payload only ends it when followed by the boundary.
        let payload = b"before\r\n--not-the-boundary\r\nafter";
        let body = upload("real", payload);

        let extracted = extract_package(Some("multipart/form-data; boundary=real"), &body);

        assert_eq!(extracted, payload);
    }

    #[test]
    fn test_non_multipart_content_type_is_empty() {
        let body = upload("b", b"payload");

        assert!(extract_package(Some("application/octet-stream"), &body).is_empty());
        assert!(extract_package(None, &body).is_empty());
    }

    #[test]
    fn test_missing_header_terminator_is_empty() {
        let body = b"--b\r\nContent-Type: application/octet-stream\r\npayload\r\n--b--";

        assert!(extract_package(Some("multipart/form-data; boundary=b"), body).is_empty());
    }

    #[test]
    fn test_falls_back_to_bare_delimiter() {
        let body = b"--b\r\nContent-Type: x\r\n\r\npayload\r\n--\r\n";

        let extracted = extract_package(Some("multipart/form-data; boundary=b"), body);

        assert_eq!(extracted, b"payload");
    }

    #[test]
    fn test_no_delimiter_at_all_is_empty() {
        let body = b"--b\r\nContent-Type: x\r\n\r\npayload";

        assert!(extract_package(Some("multipart/form-data; boundary=b"), body).is_empty());
    }

    #[test]
    fn test_content_type_prefix_is_case_insensitive_and_quotes_stripped() {
        let body = upload("q", b"data");

        let extracted = extract_package(Some("Multipart/Form-Data; boundary=\"q\""), &body);

        assert_eq!(extracted, b"data");
    }

    #[test]
    fn test_find_bytes_leftmost_match() {
        assert_eq!(find_bytes(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(find_bytes(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(find_bytes(b"abcabc", b"cd", 0), None);
        assert_eq!(find_bytes(b"ab", b"abc", 0), None);
        assert_eq!(find_bytes(b"ab", b"", 1), Some(1));
        assert_eq!(find_bytes(b"ab", b"a", 3), None);
    }
}
