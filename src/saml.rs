use std::fmt;
use std::io::Write;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Local, SecondsFormat};
use flate2::{write::DeflateEncoder, Compression};
use uuid::Uuid;

use crate::error::AuthError;

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Assertion consumer service of AWS sign-in. The browser POSTs the SAML response here.
pub const AWS_SAML_ENDPOINT: &str = "https://signin.aws.amazon.com/saml";

pub const ROLE_ATTRIBUTE_NAME: &str = "https://aws.amazon.com/SAML/Attributes/Role";

const HTTP_POST_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";
const EMAIL_NAME_ID_FORMAT: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";

pub struct SAMLRequest {
    pub issuer: String,
}

impl SAMLRequest {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Renders the AuthnRequest with a fresh ID and the current instant.
    pub fn to_xml(&self) -> String {
        // xs:ID values may not start with a digit.
        let id = format!("id_{}", Uuid::new_v4());
        let instant = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        self.render(&id, &instant)
    }

    fn render(&self, id: &str, instant: &str) -> String {
        format!(
            r#"<samlp:AuthnRequest
  AssertionConsumerServiceURL="{acs}"
  ID="{id}"
  IssueInstant="{instant}"
  ProtocolBinding="{binding}"
  Version="2.0"
  xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">
  <saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">{issuer}</saml:Issuer>
  <samlp:NameIDPolicy Format="{format}" />
</samlp:AuthnRequest>
"#,
            acs = AWS_SAML_ENDPOINT,
            binding = HTTP_POST_BINDING,
            issuer = escape_xml(&self.issuer),
            format = EMAIL_NAME_ID_FORMAT,
        )
    }

    /// Deflates the request XML and encodes it as base64, ready for the HTTP-Redirect query.
    pub fn encode(&self) -> anyhow::Result<String> {
        let xml = self.to_xml();
        log::debug!("SAML request: {}", xml);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(xml.as_bytes())
            .context("failed to compress SAML request")?;
        let deflated = encoder
            .finish()
            .context("failed to compress SAML request")?;

        Ok(STANDARD.encode(deflated))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

/// Attribute statements of a SAML response, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assertion {
    pub attributes: Vec<Attribute>,
}

impl Assertion {
    pub fn from_base64(encoded: &str) -> anyhow::Result<Self> {
        // Form posts may wrap the value at 76 columns.
        let compact: String = encoded.split_ascii_whitespace().collect();
        let decoded = STANDARD
            .decode(compact)
            .context("failed to decode SAML response: invalid base64")?;
        let xml = String::from_utf8(decoded)
            .context("failed to decode SAML response: invalid UTF-8")?;
        Self::from_xml(&xml)
    }

    pub fn from_xml(xml: &str) -> anyhow::Result<Self> {
        let doc = roxmltree::Document::parse(xml)
            .context("failed to decode SAML response: malformed XML")?;

        let attributes = doc
            .descendants()
            .filter(|n| {
                n.tag_name().name() == "Attribute"
                    && n.parent_element()
                        .map_or(false, |p| p.tag_name().name() == "AttributeStatement")
            })
            .map(|n| Attribute {
                name: n.attribute("Name").unwrap_or_default().to_string(),
                values: n
                    .children()
                    .filter(|c| c.tag_name().name() == "AttributeValue")
                    .map(|c| {
                        c.descendants()
                            .filter_map(|t| if t.is_text() { t.text() } else { None })
                            .collect::<String>()
                            .trim()
                            .to_string()
                    })
                    .collect(),
            })
            .collect();

        Ok(Self { attributes })
    }

    /// Picks the role to assume.
    ///
    /// Without a role name the first value of the role attribute wins. With one, the first
    /// value whose role name matches is returned, searching every role attribute.
    pub fn select_role(&self, role_name: Option<&str>) -> anyhow::Result<AwsRole> {
        let role_name = role_name.filter(|name| !name.is_empty());
        let mut has_role_attribute = false;

        for attribute in self
            .attributes
            .iter()
            .filter(|a| a.name == ROLE_ATTRIBUTE_NAME)
        {
            has_role_attribute = true;

            for value in &attribute.values {
                let role = AwsRole::parse(value)?;
                match role_name {
                    Some(name) if role.role_name() != Some(name) => continue,
                    _ => return Ok(role),
                }
            }
        }

        match role_name {
            Some(name) if has_role_attribute => Err(AuthError::NoSuchRole(name.to_string()).into()),
            _ => Err(AuthError::NoSuchAttribute(ROLE_ATTRIBUTE_NAME.to_string()).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsRole {
    pub role_arn: String,
    pub principal_arn: String,
}

impl AwsRole {
    pub fn new(role_arn: String, principal_arn: String) -> Self {
        Self {
            role_arn,
            principal_arn,
        }
    }

    /// Splits a `<role arn>,<principal arn>` attribute value.
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        let mut split = value.split(',');
        match (split.next(), split.next(), split.next()) {
            (Some(role_arn), Some(principal_arn), None) => Ok(Self::new(
                role_arn.trim().to_string(),
                principal_arn.trim().to_string(),
            )),
            _ => Err(AuthError::MalformedRoleValue(value.to_string()).into()),
        }
    }

    /// `TestRole` for `arn:aws:iam::123456789012:role/TestRole`.
    ///
    /// Only the segment right after the first `/` is taken, so path-qualified roles yield the
    /// first path element.
    pub fn role_name(&self) -> Option<&str> {
        self.role_arn.split('/').nth(1)
    }
}

impl fmt::Display for AwsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.role_arn, self.principal_arn)
    }
}
