use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::OnceCell;

use crate::{
    constants::{
        CREATE_SUBMISSION, GET_LANGUAGES, GET_SUBMISSION_DETAILS, GET_SUBMISSION_STATUS,
        TEST_FUNCTION,
    },
    core::{
        domain::{Credentials, DetailFlags, JudgeRequest},
        errors::JudgeError,
        text::unescape,
        traits::judge::{
            ConnectivityProbe, CreatedSubmission, JudgeService, LanguageList, StatusReport,
            SubmissionDetails,
        },
    },
    soap::{
        coerce::{CoerceError, RawResponse},
        envelope::{DecodedResponse, SoapCall, SoapValue, decode_response, encode_call},
        wsdl::{ServiceDescription, parse_wsdl},
    },
};

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub struct SoapClientConfig {
    /// Service description to discover the endpoint from.
    pub wsdl_url: Option<String>,
    /// Fixed endpoint; skips discovery when set.
    pub endpoint: Option<String>,
    /// Namespace of the call wrapper when the WSDL names none.
    pub namespace: String,
    pub request_timeout: Duration,
}

/// Judge service reached through SOAP over HTTP. Every call carries the
/// credentials; nothing is kept between calls except the discovered
/// service description.
#[derive(Debug)]
pub struct SoapJudgeClient {
    http: reqwest::Client,
    config: SoapClientConfig,
    service: OnceCell<ServiceDescription>,
}

impl SoapJudgeClient {
    pub fn new(config: SoapClientConfig) -> Result<Self, JudgeError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| JudgeError::Transport {
                endpoint: config.endpoint.clone().unwrap_or_default(),
                method: "connect".to_string(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            config,
            service: OnceCell::new(),
        })
    }

    async fn service(&self) -> Result<&ServiceDescription, JudgeError> {
        self.service.get_or_try_init(|| self.discover()).await
    }

    async fn discover(&self) -> Result<ServiceDescription, JudgeError> {
        if let Some(endpoint) = &self.config.endpoint {
            return Ok(ServiceDescription {
                location: endpoint.clone(),
                ..ServiceDescription::default()
            });
        }
        let wsdl_url = self.config.wsdl_url.as_deref().unwrap_or_default();
        let transport = |message: String| JudgeError::Transport {
            endpoint: wsdl_url.to_string(),
            method: "wsdl".to_string(),
            message,
        };

        tracing::debug!(url = %wsdl_url, "Fetching service description");
        let response = self
            .http
            .get(wsdl_url)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(transport(format!("HTTP {}", response.status())));
        }
        let document = response.text().await.map_err(|e| transport(e.to_string()))?;

        let description = parse_wsdl(&document).map_err(|e| JudgeError::InvalidResponse {
            method: "wsdl".to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(location = %description.location, "Discovered judge endpoint");
        Ok(description)
    }

    async fn call(
        &self,
        method: &str,
        params: Vec<(&str, SoapValue)>,
    ) -> Result<RawResponse, JudgeError> {
        let service = self.service().await?;
        let namespace = service
            .namespace
            .clone()
            .unwrap_or_else(|| self.config.namespace.clone());
        let action = service
            .action(method)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{namespace}#{method}"));

        let call = params
            .into_iter()
            .fold(SoapCall::new(method, &namespace), |call, (name, value)| {
                call.param(name, value)
            });
        let transport = |message: String| JudgeError::Transport {
            endpoint: service.location.clone(),
            method: method.to_string(),
            message,
        };
        let body = encode_call(&call).map_err(|e| transport(e.to_string()))?;

        let response = self
            .http
            .post(&service.location)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header("SOAPAction", format!("\"{action}\""))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %service.location, method, "Judge unreachable: {}", e);
                transport(e.to_string())
            })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport(e.to_string()))?;

        match (decode_response(&text), status.is_success()) {
            (Ok(DecodedResponse::Fault { code, message }), _) => {
                tracing::warn!(method, %code, "Judge answered with a fault: {}", message);
                Err(JudgeError::Fault {
                    method: method.to_string(),
                    code,
                    message,
                })
            }
            (Ok(DecodedResponse::Response(raw)), true) => Ok(raw),
            (_, false) => Err(transport(format!("HTTP {status}"))),
            (Err(e), true) => Err(JudgeError::InvalidResponse {
                method: method.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

fn invalid(method: &str) -> impl Fn(CoerceError) -> JudgeError + '_ {
    move |e| JudgeError::InvalidResponse {
        method: method.to_string(),
        message: e.to_string(),
    }
}

fn create_submission_params(request: &JudgeRequest) -> Vec<(&'static str, SoapValue)> {
    vec![
        ("user", SoapValue::from(request.credentials.user.as_str())),
        ("password", SoapValue::from(request.credentials.password.as_str())),
        ("sourceCode", SoapValue::from(unescape(&request.source_code))),
        ("language", SoapValue::from(request.language.0)),
        ("input", SoapValue::from(request.input.as_str())),
        ("run", SoapValue::from(request.run)),
        ("private", SoapValue::from(request.private)),
    ]
}

fn credential_params(credentials: &Credentials) -> Vec<(&'static str, SoapValue)> {
    vec![
        ("user", credentials.user.as_str().into()),
        ("password", credentials.password.as_str().into()),
    ]
}

#[async_trait::async_trait]
impl JudgeService for SoapJudgeClient {
    #[tracing::instrument(skip(self))]
    async fn test_connectivity(
        &self,
        credentials: &Credentials,
    ) -> Result<ConnectivityProbe, JudgeError> {
        let raw = self
            .call(TEST_FUNCTION, credential_params(credentials))
            .await?;
        ConnectivityProbe::try_from(raw).map_err(invalid(TEST_FUNCTION))
    }

    #[tracing::instrument(skip(self, request), fields(language = %request.language, run = request.run))]
    async fn create_submission(
        &self,
        request: &JudgeRequest,
    ) -> Result<CreatedSubmission, JudgeError> {
        let raw = self
            .call(CREATE_SUBMISSION, create_submission_params(request))
            .await?;
        Ok(CreatedSubmission::from(raw))
    }

    #[tracing::instrument(skip(self, credentials))]
    async fn get_submission_status(
        &self,
        credentials: &Credentials,
        link: &str,
    ) -> Result<StatusReport, JudgeError> {
        let mut params = credential_params(credentials);
        params.push(("link", link.into()));
        let raw = self.call(GET_SUBMISSION_STATUS, params).await?;
        StatusReport::try_from(raw).map_err(invalid(GET_SUBMISSION_STATUS))
    }

    #[tracing::instrument(skip(self, credentials))]
    async fn get_submission_details(
        &self,
        credentials: &Credentials,
        link: &str,
        flags: &DetailFlags,
    ) -> Result<SubmissionDetails, JudgeError> {
        let mut params = credential_params(credentials);
        params.extend([
            ("link", link.into()),
            ("withSource", flags.source.into()),
            ("withInput", flags.input.into()),
            ("withOutput", flags.output.into()),
            ("withStderr", flags.stderr.into()),
            ("withCmpinfo", flags.compile_info.into()),
        ]);
        let raw = self.call(GET_SUBMISSION_DETAILS, params).await?;
        SubmissionDetails::try_from(raw).map_err(invalid(GET_SUBMISSION_DETAILS))
    }

    #[tracing::instrument(skip(self, credentials))]
    async fn get_languages(&self, credentials: &Credentials) -> Result<LanguageList, JudgeError> {
        let raw = self
            .call(GET_LANGUAGES, credential_params(credentials))
            .await?;
        LanguageList::try_from(raw).map_err(invalid(GET_LANGUAGES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        domain::{LanguageId, ResultCode, SubgradeWeight, Submission, SubmissionStatus, TestCase},
        pipeline::{
            judging::{JudgeSettings, RunMode, judge_test_cases},
            polling::{PollPolicy, wait_for_completion},
        },
        traits::judge::ServiceStatus,
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn envelope(method: &str, fields: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
<SOAP-ENV:Body><ns1:{method}Response xmlns:ns1="urn:judgex"><Response>{fields}</Response></ns1:{method}Response></SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#
        )
    }

    fn create_test_client(endpoint: &str) -> SoapJudgeClient {
        SoapJudgeClient::new(SoapClientConfig {
            wsdl_url: None,
            endpoint: Some(endpoint.to_string()),
            namespace: "urn:judgex".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn credentials() -> Credentials {
        Credentials::new("judge", "secret")
    }

    #[tokio::test]
    async fn test_create_submission_sends_unescaped_source() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(header("SOAPAction", "\"urn:judgex#createSubmission\""))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
                "createSubmission",
                "<error>OK</error><link>abc123</link>",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&format!("{}/api", mock_server.uri()));
        let request = JudgeRequest {
            credentials: credentials(),
            source_code: "if (x &lt; 1) { y = 2; }".to_string(),
            language: LanguageId(1),
            input: "5\n".to_string(),
            run: true,
            private: true,
        };

        let created = client.create_submission(&request).await.unwrap();

        assert_eq!(created.error, ServiceStatus::Ok);
        assert_eq!(created.link, "abc123");

        let received = mock_server.received_requests().await.unwrap();
        let body = String::from_utf8(received[0].body.clone()).unwrap();
        let DecodedResponse::Response(sent) = decode_response(&body).unwrap() else {
            panic!("request is not an envelope");
        };
        assert_eq!(sent.text("sourceCode"), "if (x < 1) { y = 2; }");
        assert_eq!(sent.text("user"), "judge");
        assert_eq!(sent.text("language"), "1");
        assert_eq!(sent.text("run"), "true");
        assert_eq!(sent.text("input"), "5\n");
    }

    #[tokio::test]
    async fn test_status_with_auth_error_is_not_a_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
                "getSubmissionStatus",
                "<error>AUTH_ERROR</error><status>0</status><result>0</result>",
            )))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let report = client
            .get_submission_status(&credentials(), "abc123")
            .await
            .unwrap();

        assert!(report.error.is_auth_error());
    }

    #[tokio::test]
    async fn test_details_are_coerced() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
                "getSubmissionDetails",
                "<error>OK</error><langId>1</langId><time>0.5</time><status>0</status>\
                 <result>15</result><memory>3072</memory><signal>0</signal>\
                 <public>false</public><output>3\n</output><cmpinfo></cmpinfo>",
            )))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let details = client
            .get_submission_details(&credentials(), "abc123", &DetailFlags::VERDICT)
            .await
            .unwrap();

        assert_eq!(details.status, SubmissionStatus::Done);
        assert_eq!(details.result, ResultCode::Success);
        assert_eq!(details.elapsed_time, 0.5);
        assert_eq!(details.memory_used, 3072);
        assert!(!details.is_public);
        assert_eq!(details.output.as_deref(), Some("3\n"));
    }

    #[tokio::test]
    async fn test_ok_reply_without_run_state_is_invalid() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("SOAPAction", "\"urn:judgex#getSubmissionStatus\""))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
                "getSubmissionStatus",
                r#"<error>OK</error><status xsi:nil="true" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/>"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(header("SOAPAction", "\"urn:judgex#getSubmissionDetails\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(envelope("getSubmissionDetails", "<error>OK</error>")),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let policy = PollPolicy {
            initial_delay: Duration::ZERO,
            ..PollPolicy::default()
        };

        let error = wait_for_completion(
            &client,
            &credentials(),
            "abc123",
            &policy,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            error,
            JudgeError::InvalidResponse { ref method, ref message }
                if method == GET_SUBMISSION_STATUS && message.contains("status")
        ));

        let error = client
            .get_submission_details(&credentials(), "abc123", &DetailFlags::VERDICT)
            .await
            .unwrap_err();
        assert!(matches!(error, JudgeError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_empty_replies_are_not_graded_as_compiled() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("SOAPAction", "\"urn:judgex#createSubmission\""))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
                "createSubmission",
                "<error>OK</error><link>abc123</link>",
            )))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(envelope("getSubmissionStatus", "<error>OK</error>")),
            )
            .mount(&mock_server)
            .await;

        let client = Arc::new(create_test_client(&mock_server.uri()));
        let test_case = TestCase {
            id: uuid::Uuid::new_v4(),
            assignment_id: 1,
            index: 0,
            input: String::new(),
            expected_output: String::new(),
            weight: SubgradeWeight::percent(100.0).unwrap(),
            feedback: String::new(),
        };
        let submission = Submission::new(1, 42, "int main() {}".to_string(), LanguageId(1));
        let settings = JudgeSettings {
            credentials: credentials(),
            run_mode: RunMode::CompileOnly,
            private: true,
            max_concurrency: 1,
            poll: PollPolicy {
                initial_delay: Duration::from_millis(10),
                ..PollPolicy::default()
            },
        };

        let report = judge_test_cases(
            client,
            &submission,
            &[test_case],
            &settings,
            &CancellationToken::new(),
        )
        .await;

        assert!(report.results.is_empty());
        assert!(matches!(
            report.failures.as_slice(),
            [(0, JudgeError::InvalidResponse { .. })]
        ));
    }

    #[tokio::test]
    async fn test_fault_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
                   <soap:Fault><faultcode>soap:Server</faultcode><faultstring>Boom</faultstring></soap:Fault>
                   </soap:Body></soap:Envelope>"#,
            ))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let error = client.get_languages(&credentials()).await.unwrap_err();

        assert_eq!(
            error,
            JudgeError::Fault {
                method: GET_LANGUAGES.to_string(),
                code: "soap:Server".to_string(),
                message: "Boom".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_http_error_is_transport() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let error = client.test_connectivity(&credentials()).await.unwrap_err();

        assert!(matches!(error, JudgeError::Transport { ref message, .. } if message.starts_with("HTTP 502")));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not xml at all"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let error = client.test_connectivity(&credentials()).await.unwrap_err();

        assert!(matches!(error, JudgeError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let client = create_test_client("http://127.0.0.1:1/api");
        let error = client.test_connectivity(&credentials()).await.unwrap_err();

        assert!(matches!(error, JudgeError::Transport { ref endpoint, .. } if endpoint == "http://127.0.0.1:1/api"));
    }

    #[tokio::test]
    async fn test_endpoint_is_discovered_once_from_wsdl() {
        let mock_server = MockServer::start().await;
        let wsdl = format!(
            r#"<definitions targetNamespace="urn:remote" xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/">
  <binding name="B">
    <operation name="getLanguages"><soap:operation soapAction="urn:remote#langs"/></operation>
  </binding>
  <service name="S"><port name="P"><soap:address location="{}/soap"/></port></service>
</definitions>"#,
            mock_server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/service.wsdl"))
            .respond_with(ResponseTemplate::new(200).set_body_string(wsdl))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/soap"))
            .and(header("SOAPAction", "\"urn:remote#langs\""))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
                "getLanguages",
                "<error>OK</error><languages><item><key>1</key><value>C++</value></item></languages>",
            )))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = SoapJudgeClient::new(SoapClientConfig {
            wsdl_url: Some(format!("{}/service.wsdl", mock_server.uri())),
            endpoint: None,
            namespace: "urn:judgex".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        for _ in 0..2 {
            let list = client.get_languages(&credentials()).await.unwrap();
            assert_eq!(list.languages.get(&LanguageId(1)).map(String::as_str), Some("C++"));
        }

        let received = mock_server.received_requests().await.unwrap();
        let body = String::from_utf8(received[1].body.clone()).unwrap();
        assert!(body.contains("xmlns:tns=\"urn:remote\""));
    }
}
