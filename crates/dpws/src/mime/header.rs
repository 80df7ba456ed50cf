// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Part header blocks and `Content-Type` parameters.

use super::MimeError;

/// Header fields of one multipart section, keyed by lower-cased name.
///
/// Order of first appearance is preserved; a repeated field keeps the last
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeBodyHeader {
    fields: Vec<(String, String)>,
}

impl MimeBodyHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        let key = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    /// `Content-ID` without the surrounding angle brackets.
    pub fn content_id(&self) -> Option<&str> {
        self.get("content-id")
            .map(|id| id.trim_start_matches('<').trim_end_matches('>'))
    }

    pub fn content_transfer_encoding(&self) -> Option<&str> {
        self.get("content-transfer-encoding")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse `name: value` lines (without the terminating empty line).
    /// Lines starting with whitespace continue the previous field.
    pub fn parse_lines<'a, I>(lines: I) -> Result<Self, MimeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut header = Self::new();
        let mut last: Option<(String, String)> = None;
        for line in lines {
            if line.starts_with(' ') || line.starts_with('\t') {
                match last.as_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => {
                        return Err(MimeError::Malformed(
                            "continuation line without a field".into(),
                        ))
                    }
                }
                continue;
            }
            if let Some((name, value)) = last.take() {
                header.insert(&name, &value);
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| MimeError::Malformed(format!("bad header line: {:?}", line)))?;
            if name.trim().is_empty() {
                return Err(MimeError::Malformed("empty header name".into()));
            }
            last = Some((name.to_string(), value.to_string()));
        }
        if let Some((name, value)) = last {
            header.insert(&name, &value);
        }
        Ok(header)
    }
}

/// Parsed `Content-Type` value: lower-cased media type plus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Parse `type/subtype; name=value; name="quoted value"`.
    pub fn parse(value: &str) -> Self {
        let mut parts = split_params(value).into_iter();
        let media_type = parts
            .next()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let params = parts
            .filter_map(|p| {
                let (name, value) = p.split_once('=')?;
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                Some((name.trim().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        Self { media_type, params }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        let key = name.to_ascii_lowercase();
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary").filter(|b| !b.is_empty())
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }
}

/// Split on `;` outside double quotes.
fn split_params(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let h = MimeBodyHeader::parse_lines(["Content-Type: text/xml", "Content-ID: <part1>"])
            .unwrap();
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/xml"));
        assert_eq!(h.content_id(), Some("part1"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_continuation_lines() {
        let h = MimeBodyHeader::parse_lines(["X-Long: first", "\tsecond"]).unwrap();
        assert_eq!(h.get("x-long"), Some("first second"));
    }

    #[test]
    fn test_malformed_line() {
        assert!(MimeBodyHeader::parse_lines(["no colon here"]).is_err());
        assert!(MimeBodyHeader::parse_lines([" leading continuation"]).is_err());
    }

    #[test]
    fn test_content_type_params() {
        let ct = ContentType::parse(
            "Multipart/Related; type=\"application/xop+xml\"; boundary=\"a;b\"; start=\"<root>\"",
        );
        assert_eq!(ct.media_type(), "multipart/related");
        assert_eq!(ct.boundary(), Some("a;b"));
        assert_eq!(ct.param("TYPE"), Some("application/xop+xml"));
        assert!(ct.is_multipart());
    }

    #[test]
    fn test_plain_content_type() {
        let ct = ContentType::parse("application/soap+xml");
        assert_eq!(ct.media_type(), "application/soap+xml");
        assert_eq!(ct.boundary(), None);
    }
}
