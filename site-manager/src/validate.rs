//! Check that a deployed site sees traffic: send tagged test requests to the
//! protected host and look for them in the site's request log.
use crate::error::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sigsci_platform::{RequestLogEntry, SigSciClient};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Header carrying each test request's nonce
pub const TEST_ID_HEADER: &str = "X-SigSci-Site-Manager-Test-Id";

/// How long the agent usually needs to upload request logs
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Request log window searched for test requests
const SEARCH_QUERY: &str = "from:-1min";

const USER_AGENT: &str = concat!("sigsci-site-manager/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

/// One request to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub verb: Verb,
    /// Path and query, appended to the hostname as-is
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// A reflected XSS probe every WAF should flag
#[must_use]
pub fn default_test_cases() -> Vec<TestCase> {
    vec![TestCase {
        verb: Verb::Get,
        path: "/?<script>alert('test');</script>".to_string(),
        body: None,
    }]
}

/// Read test cases from a JSON array of `{verb, path, body}`.
///
/// # Errors
///
/// I/O or JSON errors, including unknown verbs.
pub fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Options for one validation run
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub site: String,
    /// Scheme and host of the protected application, e.g. `https://www.example.com`
    pub hostname: String,
    pub test_cases: Vec<TestCase>,
    pub dry_run: bool,
    pub wait: Duration,
}

/// Which nonces showed up in the request log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// `(nonce, request id)`
    pub matched: Vec<(String, String)>,
    pub missing: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Pair each nonce with the first logged request carrying it.
#[must_use]
pub fn match_nonces(entries: &[RequestLogEntry], nonces: &[String]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for nonce in nonces {
        println!(" {nonce}...");
        match entries
            .iter()
            .find(|entry| entry.has_header(TEST_ID_HEADER, nonce))
        {
            Some(entry) => {
                println!(" Matched test case {nonce} with request {}", entry.id);
                report.matched.push((nonce.clone(), entry.id.clone()));
            }
            None => {
                println!(" Failed to find test case {nonce} in request log");
                report.missing.push(nonce.clone());
            }
        }
    }
    report
}

/// Send one tagged test request. The response status is irrelevant: a
/// blocked request is logged like any other.
///
/// # Errors
///
/// Connection-level failures.
pub async fn send_test_case(
    http: &reqwest::Client,
    hostname: &str,
    test_case: &TestCase,
    nonce: &str,
) -> Result<()> {
    let url = format!("{hostname}{}", test_case.path);
    let request = match test_case.verb {
        Verb::Get => http.get(&url),
        Verb::Post => http
            .post(&url)
            .body(test_case.body.clone().unwrap_or_default()),
    };
    let response = request.header(TEST_ID_HEADER, nonce).send().await?;
    debug!("{} {url} -> {}", test_case.verb.as_str(), response.status());
    Ok(())
}

/// Run the test cases against the site.
///
/// Returns `None` on a dry run, which only prints the plan.
///
/// # Errors
///
/// Failure to build the HTTP client or to search the request log. Test
/// requests that cannot be sent are reported and do not abort the run.
pub async fn validate(
    client: &SigSciClient,
    options: &ValidateOptions,
) -> Result<Option<ValidationReport>> {
    println!("Validating deployment of site '{}'", options.site);

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(!client.config().validate_certificates)
        .build()?;

    let mut nonces = Vec::with_capacity(options.test_cases.len());
    println!("Running test cases...");
    for test_case in &options.test_cases {
        let nonce = uuid::Uuid::new_v4().to_string();
        println!(" {nonce}: {} {}", test_case.verb.as_str(), test_case.path);
        if !options.dry_run {
            if let Err(e) = send_test_case(&http, &options.hostname, test_case, &nonce).await {
                warn!("Test request failed: {e}");
                println!("  Error sending request");
            }
        }
        nonces.push(nonce);
    }

    if options.dry_run {
        return Ok(None);
    }

    println!("Waiting for SigSci agent to upload request logs...");
    tokio::time::sleep(options.wait).await;

    println!("Searching request log...");
    let entries = client
        .requests_api(&options.site)
        .search(SEARCH_QUERY)
        .await?;
    let report = match_nonces(&entries, &nonces);
    println!("{}", if report.success() { "Success" } else { "Failed" });
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::NamedTempFile;

    fn entry(id: &str, headers: &[(&str, &str)]) -> RequestLogEntry {
        RequestLogEntry {
            id: id.to_string(),
            headers_in: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_match_nonces() {
        let entries = vec![
            entry("r1", &[("Host", "www.example.com")]),
            entry("r2", &[("x-sigsci-site-manager-test-id", "nonce-a")]),
        ];
        let report = match_nonces(&entries, &["nonce-a".to_string(), "nonce-b".to_string()]);
        assert_eq!(
            report.matched,
            vec![("nonce-a".to_string(), "r2".to_string())]
        );
        assert_eq!(report.missing, vec!["nonce-b".to_string()]);
        assert!(!report.success());
    }

    #[test]
    fn test_load_test_cases() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"[{"verb": "GET", "path": "/a"}, {"verb": "POST", "path": "/b", "body": "x=1"}]"#,
        )
        .unwrap();
        let cases = load_test_cases(file.path()).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].verb, Verb::Get);
        assert_eq!(cases[0].body, None);
        assert_eq!(cases[1].body.as_deref(), Some("x=1"));

        fs::write(file.path(), r#"[{"verb": "DELETE", "path": "/"}]"#).unwrap();
        assert!(load_test_cases(file.path()).is_err());
    }

    #[test]
    fn test_default_test_case() {
        let cases = default_test_cases();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].verb, Verb::Get);
        assert!(cases[0].path.contains("<script>"));
    }

    #[tokio::test]
    async fn test_send_test_case_sets_nonce_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/login")
                    .header(TEST_ID_HEADER, "nonce-1")
                    .body("user=admin'--");
                then.status(406);
            })
            .await;

        let http = reqwest::Client::new();
        let case = TestCase {
            verb: Verb::Post,
            path: "/login".to_string(),
            body: Some("user=admin'--".to_string()),
        };
        send_test_case(&http, &server.base_url(), &case, "nonce-1")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
