use std::collections::BTreeMap;

use crate::{
    core::{
        domain::{LanguageId, ResultCode, SubmissionStatus},
        traits::judge::{
            ConnectivityProbe, CreatedSubmission, LanguageList, ServiceStatus, StatusReport,
            SubmissionDetails,
        },
    },
    soap::coerce::{CoerceError, RawResponse, coerce_int},
};

fn service_status(raw: &RawResponse) -> ServiceStatus {
    ServiceStatus::from_code(&raw.text("error"))
}

/// `status` and `result` of a run. An `OK` reply must carry both; after an
/// in-band error they are meaningless and read leniently.
fn run_state(
    raw: &RawResponse,
    error: &ServiceStatus,
) -> Result<(SubmissionStatus, ResultCode), CoerceError> {
    let (status, result) = if *error == ServiceStatus::Ok {
        (raw.required_int("status")?, raw.required_int("result")?)
    } else {
        (raw.int("status")?, raw.int("result")?)
    };
    Ok((SubmissionStatus::from_code(status), ResultCode::from_code(result)))
}

impl TryFrom<RawResponse> for ConnectivityProbe {
    type Error = CoerceError;

    fn try_from(raw: RawResponse) -> Result<Self, CoerceError> {
        Ok(Self {
            error: service_status(&raw),
            help_text: raw.text("moreHelp"),
            float_probe: raw.float("pi")?,
            numeric_probe: raw.int("answerToLifeAndEverything")?,
            bool_probe: raw.bool("oOok"),
        })
    }
}

impl From<RawResponse> for CreatedSubmission {
    fn from(raw: RawResponse) -> Self {
        Self {
            error: service_status(&raw),
            link: raw.text("link"),
        }
    }
}

impl TryFrom<RawResponse> for StatusReport {
    type Error = CoerceError;

    fn try_from(raw: RawResponse) -> Result<Self, CoerceError> {
        let error = service_status(&raw);
        let (status, result) = run_state(&raw, &error)?;
        Ok(Self {
            error,
            status,
            result,
        })
    }
}

impl TryFrom<RawResponse> for SubmissionDetails {
    type Error = CoerceError;

    fn try_from(raw: RawResponse) -> Result<Self, CoerceError> {
        let error = service_status(&raw);
        let (status, result) = run_state(&raw, &error)?;
        let language = raw.int("langId")?;
        Ok(Self {
            error,
            language: LanguageId(language_id("langId", language)?),
            elapsed_time: raw.float("time")?,
            status,
            result,
            memory_used: raw.int("memory")?,
            signal: raw.int("signal")?,
            is_public: raw.bool("public"),
            source: raw.optional_text("source"),
            input: raw.optional_text("input"),
            output: raw.optional_text("output"),
            stderr: raw.optional_text("stderr"),
            compile_info: raw.optional_text("cmpinfo"),
        })
    }
}

impl TryFrom<RawResponse> for LanguageList {
    type Error = CoerceError;

    fn try_from(raw: RawResponse) -> Result<Self, CoerceError> {
        let languages = raw
            .entries
            .iter()
            .map(|(key, name)| {
                let id = language_id("languages", coerce_int("languages", key)?)?;
                Ok((LanguageId(id), name.clone()))
            })
            .collect::<Result<BTreeMap<_, _>, CoerceError>>()?;

        Ok(Self {
            error: service_status(&raw),
            languages,
        })
    }
}

fn language_id(field: &str, value: i64) -> Result<i32, CoerceError> {
    i32::try_from(value).map_err(|_| CoerceError::NotAnInteger {
        field: field.to_string(),
        value: value.to_string(),
    })
}
