//! `Content-Disposition` filename extraction.

use std::path::Path;

use chunkup_protocol::constants::DEFAULT_DOWNLOAD_NAME;
use percent_encoding::percent_decode_str;

/// Returns the filename suggested by a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*=` form over plain `filename=`. The
/// result is reduced to its last path component, so a hostile header
/// cannot point outside the download directory. Falls back to
/// [`DEFAULT_DOWNLOAD_NAME`].
pub fn filename_from_disposition(header: Option<&str>) -> String {
    let Some(header) = header else {
        return DEFAULT_DOWNLOAD_NAME.to_string();
    };

    let mut plain = None;
    let mut extended = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(value.trim().trim_matches('"').to_string()),
            "filename*" => extended = decode_extended(value.trim()),
            _ => {}
        }
    }

    extended
        .or(plain)
        .and_then(|name| sanitize(&name))
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

/// Decodes `charset'lang'percent-encoded`.
fn decode_extended(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let _charset = parts.next()?;
    let _lang = parts.next()?;
    let encoded = parts.next()?;
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

fn sanitize(name: &str) -> Option<String> {
    let name = name.replace('\\', "/");
    let base = Path::new(&name).file_name()?.to_str()?;
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename() {
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="report.pdf""#)),
            "report.pdf"
        );
    }

    #[test]
    fn bare_filename() {
        assert_eq!(
            filename_from_disposition(Some("attachment; filename=photo.png")),
            "photo.png"
        );
    }

    #[test]
    fn extended_filename_wins() {
        let header = r#"attachment; filename="fallback.txt"; filename*=UTF-8''r%C3%A9sum%C3%A9.txt"#;
        assert_eq!(filename_from_disposition(Some(header)), "résumé.txt");
    }

    #[test]
    fn missing_header_uses_default() {
        assert_eq!(filename_from_disposition(None), "downloaded_file");
        assert_eq!(filename_from_disposition(Some("attachment")), "downloaded_file");
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="""#)),
            "downloaded_file"
        );
    }

    #[test]
    fn strips_directories() {
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="../../etc/passwd""#)),
            "passwd"
        );
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="C:\temp\a.txt""#)),
            "a.txt"
        );
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="..""#)),
            "downloaded_file"
        );
    }
}
