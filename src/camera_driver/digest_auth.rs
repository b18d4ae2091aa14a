//! HTTP Digest authentication (RFC 2617, MD5 / qop=auth)
//!
//! reqwest has no digest support, so the challenge round trip is done here:
//! send once, and on 401 answer the `WWW-Authenticate` challenge.

use crate::error::{Error, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode};

/// Parsed `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parse a challenge header value; `None` when it is not a digest challenge
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim();
        let params = rest
            .strip_prefix("Digest ")
            .or_else(|| rest.strip_prefix("digest "))?;

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop = None;
        let mut algorithm = None;

        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop = Some(value),
                "algorithm" => algorithm = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            nonce: nonce?,
            opaque,
            qop,
            algorithm,
        })
    }

    /// Build the `Authorization` header value for one request
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
        nc: u32,
    ) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let nc = format!("{:08x}", nc);

        // only "auth" is offered by the cameras we drive
        let qop_auth = self
            .qop
            .as_deref()
            .map(|q| q.split(',').any(|v| v.trim() == "auth"))
            .unwrap_or(false);

        let response = if qop_auth {
            md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        };

        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
            username, self.realm, self.nonce, uri, response
        );
        if let Some(algorithm) = &self.algorithm {
            header.push_str(&format!(", algorithm={}", algorithm));
        }
        if qop_auth {
            header.push_str(&format!(r#", qop=auth, nc={}, cnonce="{}""#, nc, cnonce));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{}""#, opaque));
        }
        header
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Split `k=v, k="v, w"` pairs, honouring quotes
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in params.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push_param(&mut out, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    push_param(&mut out, &current);
    out
}

fn push_param(out: &mut Vec<(String, String)>, raw: &str) {
    if let Some((key, value)) = raw.split_once('=') {
        out.push((
            key.trim().to_string(),
            value.trim().trim_matches('"').to_string(),
        ));
    }
}

/// reqwest client that answers digest challenges
pub struct DigestClient {
    client: Client,
    username: String,
    password: String,
}

impl DigestClient {
    pub fn new(client: Client, username: &str, password: &str) -> Self {
        Self {
            client,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Send a request, retrying once with credentials if challenged
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<(&str, &str)>,
    ) -> Result<Response> {
        let first = self.request(method.clone(), url, body, None).send().await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(first);
        }

        let challenge = first
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(DigestChallenge::parse)
            .ok_or_else(|| Error::Network(format!("{} answered 401 without digest challenge", url)))?;

        let uri = request_uri(url);
        let cnonce = format!("{:016x}", rand::random::<u64>());
        let authorization = challenge.authorization(
            &self.username,
            &self.password,
            method.as_str(),
            &uri,
            &cnonce,
            1,
        );

        Ok(self
            .request(method, url, body, Some(authorization))
            .send()
            .await?)
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<(&str, &str)>,
        authorization: Option<String>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some((content, content_type)) = body {
            builder = builder
                .header(CONTENT_TYPE, content_type)
                .body(content.to_string());
        }
        if let Some(auth) = authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder
    }
}

/// Path and query of `url`, as used in the digest `uri` field
fn request_uri(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    match without_scheme.find('/') {
        Some(idx) => without_scheme[idx..].to_string(),
        None => "/".to_string(),
    }
}
