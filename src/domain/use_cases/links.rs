use url::Url;
use uuid::Uuid;

use crate::{entities::{asset::Asset, links::Links}, errors::AppError};

/// Renders embed snippets for an asset's public identifier.
pub struct LinkFormatter;

impl LinkFormatter {
    /// `base_url` is chosen by the caller: the owner's custom domain or the
    /// scheme and host of the current request.
    pub fn format(asset: &Asset, base_url: &str) -> Result<Links, AppError> {
        Self::format_uuid(&asset.uuid, &asset.original_name, base_url)
    }

    pub fn format_uuid(uuid: &Uuid, alt: &str, base_url: &str) -> Result<Links, AppError> {
        if uuid.is_nil() {
            return Err(AppError::invalid("uuid", "Image identifier is empty"));
        }

        let base = normalize_base_url(base_url)?;
        let url = format!("{}/i/{}", base, uuid);
        let html_alt = escape_html_attribute(alt);
        let md_alt = escape_markdown_text(alt);

        Ok(Links {
            html: format!(r#"<img src="{}" alt="{}" />"#, url, html_alt),
            markdown: format!("![{}]({})", md_alt, url),
            bbcode: format!("[img]{}[/img]", url),
            markdown_with_link: format!("[![{}]({})]({})", md_alt, url, url),
            url,
        })
    }
}

/// Base for links of an owner: their custom domain when configured,
/// otherwise the request origin. Bare domains get `https://`.
pub fn link_base(custom_domain: Option<&str>, request_base: &str) -> String {
    match custom_domain {
        Some(domain) if domain.contains("://") => domain.to_string(),
        Some(domain) => format!("https://{}", domain),
        None => request_base.to_string(),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, AppError> {
    let invalid = || AppError::invalid("base_url", format!("Invalid base URL: {}", raw));

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    let is_web = matches!(url.scheme(), "http" | "https");
    if !is_web || url.host_str().is_none() || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid());
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn escape_html_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_markdown_text(value: &str) -> String {
    value.replace('\\', "\\\\").replace('[', "\\[").replace(']', "\\]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::asset::AssetInsert;
    use chrono::Utc;
    use regex::Regex;

    fn asset(name: &str) -> Asset {
        AssetInsert {
            uuid: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_path: "2025/03/04/0b8a2d2e-secret.png".into(),
            original_name: name.into(),
            file_size: 1,
            mime_type: "image/png".into(),
            width: 1,
            height: 1,
            content_hash: "h".into(),
            is_public: true,
            created_at: Utc::now(),
        }
        .into_asset(1)
    }

    #[test]
    fn url_uses_public_identifier_and_html_src_round_trips() {
        let asset = asset("cat.png");
        let links = LinkFormatter::format(&asset, "https://example.com").unwrap();

        assert_eq!(links.url, format!("https://example.com/i/{}", asset.uuid));
        assert!(!links.url.contains(&asset.file_path));
        assert!(!links.html.contains("secret"));

        let src = Regex::new(r#"src="([^"]+)""#).unwrap();
        let parsed = src.captures(&links.html).unwrap().get(1).unwrap().as_str();
        assert_eq!(parsed, links.url);

        assert_eq!(links.markdown, format!("![cat.png]({})", links.url));
        assert_eq!(links.bbcode, format!("[img]{}[/img]", links.url));
        assert_eq!(links.markdown_with_link, format!("[![cat.png]({0})]({0})", links.url));
    }

    #[test]
    fn trailing_slash_is_dropped_and_alt_text_escaped() {
        let asset = asset(r#"a "b" <c> [d].png"#);
        let links = LinkFormatter::format(&asset, "http://localhost:8080/").unwrap();

        assert!(links.url.starts_with("http://localhost:8080/i/"));
        assert!(links.html.contains(r#"alt="a &quot;b&quot; &lt;c&gt; [d].png""#));
        assert!(links.markdown.starts_with(r#"![a "b" <c> \[d\].png]("#));
    }

    #[test]
    fn rejects_nil_identifiers_and_malformed_bases() {
        let mut nil = asset("x.png");
        nil.uuid = Uuid::nil();
        assert!(LinkFormatter::format(&nil, "https://example.com").is_err());

        let asset = asset("x.png");
        for base in ["", "example.com", "ftp://example.com", "https://example.com/?a=b"] {
            assert!(LinkFormatter::format(&asset, base).is_err(), "{base}");
        }
    }

    #[test]
    fn custom_domain_wins_over_request_origin() {
        assert_eq!(link_base(Some("img.example.com"), "http://host"), "https://img.example.com");
        assert_eq!(link_base(Some("http://cdn.test"), "http://host"), "http://cdn.test");
        assert_eq!(link_base(None, "http://host"), "http://host");
    }
}
