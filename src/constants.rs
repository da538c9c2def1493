// Remote methods.
pub const TEST_FUNCTION: &str = "testFunction";
pub const CREATE_SUBMISSION: &str = "createSubmission";
pub const GET_SUBMISSION_STATUS: &str = "getSubmissionStatus";
pub const GET_SUBMISSION_DETAILS: &str = "getSubmissionDetails";
pub const GET_LANGUAGES: &str = "getLanguages";

// In-band values of the `error` response field.
pub const OK: &str = "OK";
pub const AUTH_ERROR: &str = "AUTH_ERROR";

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const DEFAULT_NAMESPACE: &str = "urn:judgex";

// Capabilities asked of the host's permission oracle.
pub const CAP_SUBMIT: &str = "mod/onlinejudge:submit";
pub const CAP_MANAGE_TEST_CASES: &str = "mod/onlinejudge:managetestcases";

pub const DEFAULT_CONFIG_FILE: &str = "config/judgex";
pub const ENV_PREFIX: &str = "JUDGEX";
